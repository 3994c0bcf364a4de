//! Orchestrator domain layer

pub mod entities;
pub mod errors;
pub mod services;
pub mod state;
pub mod value_objects;

pub use entities::*;
pub use errors::ScanError;
pub use services::*;
pub use state::{JobState, RawJobState};
pub use value_objects::*;
