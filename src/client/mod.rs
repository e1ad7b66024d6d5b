//! # Backend Client
//!
//! Contracts for the REST collaborators the realtime layer consumes, and the
//! HTTP implementation used in production.

pub mod http_client;
pub mod traits;

pub use http_client::HttpBackendClient;
pub use traits::{LivenessCheck, NotificationApi};
