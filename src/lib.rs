//! PTaaS - application library
//!
//! Wires the core and orchestrator crates into the API server and the
//! standalone worker binaries.

mod app;
mod shutdown;

pub use app::{AppError, AppHandle, Backend, artifact_store, create_app, spawn_workers};
pub use ptaas_core::{Config, init_tracing};
pub use ptaas_orchestrator::presentation::controllers::OrchestratorState;
pub use shutdown::wait_for_signal;

// Re-export for convenience
pub use ptaas_core;
pub use ptaas_orchestrator;
