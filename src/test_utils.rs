//! # Test Utilities
//!
//! Helpers shared by unit and integration tests.

use std::env;

use crate::config::RealtimeConfig;

/// Mark the process as a test run unless the environment says otherwise
pub fn setup_test_environment() {
    if env::var("EVENTHUB_ENV").is_err() {
        env::set_var("EVENTHUB_ENV", "test");
    }
}

/// Default configuration pointed at unroutable local endpoints
///
/// Timings stay at their defaults so paused-clock tests exercise the real
/// cadence; heart-beats are disabled because in-process brokers rarely send
/// them.
pub fn test_config() -> RealtimeConfig {
    let mut config = RealtimeConfig::default();
    config.api_base_url = "http://127.0.0.1:9/api".to_string();
    config.push.endpoint = "ws://127.0.0.1:9/ws".to_string();
    config.push.heartbeat_outgoing_ms = 0;
    config.push.heartbeat_incoming_ms = 0;
    config
}
