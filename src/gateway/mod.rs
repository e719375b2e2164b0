//! Worker protocol and payload handling

pub mod payload;
pub mod worker;

pub use payload::PayloadError;
pub use worker::{UpstreamError, WorkerClient, WorkerRequest, WorkerResponse};
