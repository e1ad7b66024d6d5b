//! # Realtime Configuration
//!
//! Layered configuration for the status, push and notification components.
//!
//! Precedence (highest to lowest):
//! 1. `EVENTHUB_*` environment variables (`__` separates nested keys, e.g.
//!    `EVENTHUB_HEALTH__POLL_INTERVAL_MS=2000`)
//! 2. Optional config file (TOML, YAML or JSON by extension)
//! 3. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants::{defaults, push};
use crate::error::{RealtimeError, RealtimeResult};

/// Whether `Loading` is emitted on every probe cycle or only while not `Active`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlickerPolicy {
    /// Emit `Loading` at the start of every cycle
    #[default]
    EveryCycle,
    /// Skip the `Loading` emission while the backend is already `Active`
    SuppressWhileActive,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// REST base URL; endpoint paths are joined relative to it
    pub api_base_url: String,
    pub health: HealthConfig,
    pub push: PushConfig,
    pub notifications: NotificationConfig,
    pub http: HttpConfig,
    /// Where the authenticated session is cached between runs
    pub session_file: Option<PathBuf>,
}

/// Backend liveness polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub poll_interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub flicker_policy: FlickerPolicy,
}

/// Push channel transport and reconnection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// WebSocket URL of the message broker
    pub endpoint: String,
    pub destination: String,
    pub reconnect_delay_ms: u64,
    pub heartbeat_outgoing_ms: u64,
    pub heartbeat_incoming_ms: u64,
    pub handshake_timeout_ms: u64,
    pub signal_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub window_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_base_url: defaults::API_BASE_URL.to_string(),
            health: HealthConfig::default(),
            push: PushConfig::default(),
            notifications: NotificationConfig::default(),
            http: HttpConfig::default(),
            session_file: None,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::HEALTH_POLL_INTERVAL_MS,
            probe_timeout_ms: defaults::HEALTH_PROBE_TIMEOUT_MS,
            flicker_policy: FlickerPolicy::default(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::PUSH_ENDPOINT.to_string(),
            destination: push::USER_NOTIFICATION_DESTINATION.to_string(),
            reconnect_delay_ms: defaults::PUSH_RECONNECT_DELAY_MS,
            heartbeat_outgoing_ms: defaults::PUSH_HEARTBEAT_OUTGOING_MS,
            heartbeat_incoming_ms: defaults::PUSH_HEARTBEAT_INCOMING_MS,
            handshake_timeout_ms: defaults::PUSH_HANDSHAKE_TIMEOUT_MS,
            signal_buffer: defaults::PUSH_SIGNAL_BUFFER,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            window_size: defaults::NOTIFICATION_WINDOW,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: defaults::HTTP_REQUEST_TIMEOUT_MS,
        }
    }
}

impl HealthConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl PushConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl RealtimeConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> RealtimeResult<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!("Loading realtime config from: {}", path.display());
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
        }

        let loaded: Self = builder
            .add_source(
                config::Environment::with_prefix("EVENTHUB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values the runtime loops cannot operate with
    pub fn validate(&self) -> RealtimeResult<()> {
        reqwest::Url::parse(&self.api_base_url).map_err(|e| {
            RealtimeError::config_error(format!("Invalid api_base_url '{}': {e}", self.api_base_url))
        })?;
        reqwest::Url::parse(&self.push.endpoint).map_err(|e| {
            RealtimeError::config_error(format!("Invalid push endpoint '{}': {e}", self.push.endpoint))
        })?;

        if self.health.poll_interval_ms == 0 {
            return Err(RealtimeError::config_error(
                "health.poll_interval_ms must be greater than zero",
            ));
        }
        if self.health.probe_timeout_ms == 0 {
            return Err(RealtimeError::config_error(
                "health.probe_timeout_ms must be greater than zero",
            ));
        }
        if self.push.reconnect_delay_ms == 0 {
            return Err(RealtimeError::config_error(
                "push.reconnect_delay_ms must be greater than zero",
            ));
        }
        if self.push.handshake_timeout_ms == 0 {
            return Err(RealtimeError::config_error(
                "push.handshake_timeout_ms must be greater than zero",
            ));
        }
        if self.push.signal_buffer == 0 {
            return Err(RealtimeError::config_error(
                "push.signal_buffer must be greater than zero",
            ));
        }
        if !self.push.destination.starts_with('/') {
            return Err(RealtimeError::config_error(format!(
                "push.destination must be an absolute destination, got '{}'",
                self.push.destination
            )));
        }
        if self.notifications.window_size == 0 {
            return Err(RealtimeError::config_error(
                "notifications.window_size must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_recommended_timings() {
        let config = RealtimeConfig::default();
        assert_eq!(config.health.poll_interval(), Duration::from_secs(4));
        assert_eq!(config.health.probe_timeout(), Duration::from_millis(2500));
        assert_eq!(config.push.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.push.heartbeat_outgoing_ms, 4000);
        assert_eq!(config.push.heartbeat_incoming_ms, 4000);
        assert_eq!(config.push.destination, "/user/queue/notifications");
        assert_eq!(config.notifications.window_size, 10);
        assert_eq!(config.health.flicker_policy, FlickerPolicy::EveryCycle);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
api_base_url = "https://events.example.com/api"

[health]
poll_interval_ms = 2000
flicker_policy = "suppress_while_active"

[notifications]
window_size = 5
"#
        )
        .unwrap();

        let config = RealtimeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.api_base_url, "https://events.example.com/api");
        assert_eq!(config.health.poll_interval_ms, 2000);
        assert_eq!(config.health.probe_timeout_ms, 2500);
        assert_eq!(
            config.health.flicker_policy,
            FlickerPolicy::SuppressWhileActive
        );
        assert_eq!(config.notifications.window_size, 5);
        assert_eq!(config.push.reconnect_delay_ms, 5000);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = RealtimeConfig::load(Some(Path::new("/nonexistent/realtime.toml"))).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080/api");
    }

    #[test]
    fn test_validation_rejects_unusable_values() {
        let mut config = RealtimeConfig::default();
        config.health.poll_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(RealtimeError::Configuration(_))
        ));

        let mut config = RealtimeConfig::default();
        config.notifications.window_size = 0;
        assert!(config.validate().is_err());

        let mut config = RealtimeConfig::default();
        config.api_base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = RealtimeConfig::default();
        config.push.destination = "queue/notifications".to_string();
        assert!(config.validate().is_err());
    }
}
