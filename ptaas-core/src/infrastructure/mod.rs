//! Infrastructure shared by the API server and the workers

pub mod broker;

pub use broker::{BrokerError, RedisBroker};
