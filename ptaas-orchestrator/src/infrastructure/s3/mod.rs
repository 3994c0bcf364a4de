//! Object storage for raw scan artifacts

mod service;

pub use service::*;
