//! Orchestrator infrastructure layer

pub mod defectdojo;
pub mod docker;
pub mod job_queue;
pub mod job_store;
pub mod s3;
pub mod toolkit;
pub mod worker_pool;
pub mod zap;

pub use defectdojo::{DefectDojoClient, DefectDojoError};
pub use docker::DockerCliRuntime;
pub use job_queue::*;
pub use job_store::*;
pub use s3::*;
pub use toolkit::DefaultToolkitFactory;
pub use worker_pool::*;
pub use zap::ZapClient;
