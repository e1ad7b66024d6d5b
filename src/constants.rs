//! # System Constants
//!
//! Endpoint paths, protocol identifiers and default timings shared across the
//! status, push and notification components.

/// REST paths, relative to the configured API base URL
pub mod paths {
    pub const HEALTH: &str = "health";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const NOTIFICATIONS_READ_ALL: &str = "notifications/read-all";

    /// `notifications/{id}/read`
    pub fn notification_read(id: i64) -> String {
        format!("notifications/{id}/read")
    }
}

/// Push channel protocol values
pub mod push {
    /// Per-user private destination carrying notification signals
    pub const USER_NOTIFICATION_DESTINATION: &str = "/user/queue/notifications";
    pub const STOMP_ACCEPT_VERSION: &str = "1.2,1.1,1.0";
    pub const AUTHORIZATION_HEADER: &str = "Authorization";
}

/// Default timings and sizes
pub mod defaults {
    pub const API_BASE_URL: &str = "http://localhost:8080/api";
    pub const PUSH_ENDPOINT: &str = "ws://localhost:8080/ws";

    pub const HEALTH_POLL_INTERVAL_MS: u64 = 4_000;
    pub const HEALTH_PROBE_TIMEOUT_MS: u64 = 2_500;

    pub const PUSH_RECONNECT_DELAY_MS: u64 = 5_000;
    pub const PUSH_HEARTBEAT_OUTGOING_MS: u64 = 4_000;
    pub const PUSH_HEARTBEAT_INCOMING_MS: u64 = 4_000;
    pub const PUSH_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
    pub const PUSH_SIGNAL_BUFFER: usize = 64;

    /// Most recent notifications retained in the visible view
    pub const NOTIFICATION_WINDOW: usize = 10;

    pub const HTTP_REQUEST_TIMEOUT_MS: u64 = 30_000;

    /// Emissions buffered per observable before slow readers lag
    pub const OBSERVABLE_BUFFER: usize = 128;
}
