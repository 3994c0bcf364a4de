//! Published job state storage

mod snapshot;
mod store;

pub use snapshot::JobSnapshot;
pub use store::{InMemoryJobStore, JobStore, JobStoreError, RedisJobStore};
