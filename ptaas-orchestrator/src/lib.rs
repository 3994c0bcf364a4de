//! PTaaS Orchestrator - scan job orchestration and HTTP API
//!
//! Accepts network, web application and SQL injection scan requests, runs them
//! as background jobs against scanner containers and the ZAP API, stores raw
//! output in S3-compatible storage and imports it into DefectDojo.
//!
//! # Architecture
//!
//! ```text
//! ptaas-orchestrator/
//! ├── presentation/     # HTTP layer
//! │   ├── controllers/  # Request handlers
//! │   ├── middleware.rs # Request logging, error mapping
//! │   ├── models.rs     # DTOs with OpenAPI schemas
//! │   └── routes.rs     # API route definitions
//! ├── application/      # Use cases
//! │   ├── jobs/         # Network, web and injection scan definitions
//! │   ├── registry.rs   # Active/completed scan tracking actor
//! │   └── workflow.rs   # State publishing and progress checkpoints
//! ├── infrastructure/   # External integrations
//! │   ├── job_queue.rs  # Broker-backed job queue
//! │   ├── job_store/    # Published job states
//! │   └── worker_pool.rs
//! └── domain/           # Domain models and ports
//! ```
//!
//! # API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/v1/scans/{scan_type}` | POST | Queue a scan |
//! | `/api/v1/scans/{job_id}` | GET | Job state and progress |
//! | `/api/v1/scans/active` | GET | Submitted scans |
//! | `/api/v1/scans/completed` | GET | Completed scan log |
//! | `/api/v1/results/{job_id}/download` | GET | Raw tool output |
//! | `/api/v1/findings` | GET | DefectDojo findings |
//! | `/health` | GET | Health check |

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
