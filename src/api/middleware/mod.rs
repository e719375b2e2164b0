pub mod auth;

pub use auth::{auth_error_response, authenticate, Identity};
