//! # Backend Collaborator Traits
//!
//! The narrow request/response contracts the realtime layer needs from the
//! backend. Production code uses [`crate::client::HttpBackendClient`]; tests
//! substitute in-memory implementations.

use async_trait::async_trait;

use crate::error::RealtimeResult;
use crate::models::NotificationRecord;

/// Single liveness request against the backend
#[async_trait]
pub trait LivenessCheck: Send + Sync {
    /// Resolve `Ok` on any 2xx answer; every other outcome is an error
    async fn check_liveness(&self) -> RealtimeResult<()>;
}

/// Notification list and read-state endpoints
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Current notifications for the session user, in no guaranteed order
    async fn list_notifications(&self) -> RealtimeResult<Vec<NotificationRecord>>;

    async fn mark_read(&self, notification_id: i64) -> RealtimeResult<()>;

    async fn mark_all_read(&self) -> RealtimeResult<()>;
}
