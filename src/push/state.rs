use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the push channel connection
///
/// Owned by [`PushChannel`](super::PushChannel); everyone else only observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushConnectionState {
    #[default]
    Disconnected,
    /// Transport is opening or the broker handshake is in progress
    Connecting,
    /// Handshake done and the notification subscription is live
    Connected,
}

impl PushConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushConnectionState::Disconnected => "disconnected",
            PushConnectionState::Connecting => "connecting",
            PushConnectionState::Connected => "connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, PushConnectionState::Connected)
    }
}

impl fmt::Display for PushConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
