//! Orchestrator application layer

pub mod classifier;
pub mod jobs;
pub mod poller;
pub mod publisher;
pub mod registry;
pub mod use_cases;
pub mod workflow;

pub use classifier::KeywordInjectionClassifier;
pub use jobs::{ScanJobDefinition, ScanToolkit, ToolkitFactory};
pub use publisher::ResultPublisher;
pub use registry::{RegistryError, ScanRegistryHandle};
pub use use_cases::*;
pub use workflow::{JobContext, JobWorkflow, ProgressReporter};
