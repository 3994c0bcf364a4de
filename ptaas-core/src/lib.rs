//! PTaaS Core - Foundation crate for the PTaaS scan orchestrator
//!
//! Shared plumbing used by the API server and the worker processes:
//!
//! - [`config`]: Strongly-typed configuration with file and environment variable support
//! - [`infrastructure`]: Redis-compatible broker (job queue list + JSON state keys)
//! - [`logging`]: Structured logging with tracing
//!
//! # Configuration
//!
//! ```rust,ignore
//! use ptaas_core::Config;
//!
//! let config = Config::load()?;
//! ```
//!
//! Environment variables use the `PTAAS__` prefix with double underscore separators:
//!
//! ```bash
//! PTAAS__SERVER__PORT=8000
//! PTAAS__WORKER__CONCURRENCY=4
//! PTAAS__DEFECTDOJO__API_KEY=...
//! ```

pub mod config;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
