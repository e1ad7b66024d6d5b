//! # Push Channel
//!
//! Broker connection that delivers per-user notification signals.
//!
//! - [`stomp`]: frame encoding and heart-beat negotiation
//! - [`transport`]: socket abstraction with a WebSocket implementation
//! - [`channel`]: the reconnecting session loop and its observable state

pub mod channel;
pub mod state;
pub mod stomp;
pub mod transport;

pub use channel::{PushChannel, PushIdentity, PushSignal};
pub use state::PushConnectionState;
pub use stomp::{HeartBeat, NegotiatedHeartBeat, StompCommand, StompFrame};
pub use transport::{PushConnection, PushTransport, WebSocketTransport};
