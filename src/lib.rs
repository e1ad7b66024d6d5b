#![allow(clippy::doc_markdown)] // Allow technical terms like STOMP, WebSocket in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # EventHub Realtime
//!
//! Real-time status and notification layer for the EventHub client.
//!
//! ## Overview
//!
//! Three independent activities feed a handful of observable values that a UI
//! shell renders:
//!
//! - **Backend status**: a liveness probe raced against a deadline on a fixed
//!   cadence, published as `loading | active | inactive`
//! - **Push channel**: an authenticated STOMP-over-WebSocket subscription to
//!   the user's private notification queue that reconnects on its own
//! - **Notifications**: the ten most recent records and their unread count,
//!   refetched on demand and whenever a push signal arrives
//!
//! Connectivity failures never surface as errors. They are reflected in the
//! status values and healed by retrying. Only user actions (marking
//! notifications read) report failures back to the caller.
//!
//! ## Module Organization
//!
//! - [`health`] - Health prober and backend status monitor
//! - [`push`] - STOMP framing, transports and the reconnecting channel
//! - [`notifications`] - Notification reconciler
//! - [`system`] - Application state container tying it all together
//! - [`client`] - REST contracts and the HTTP implementation
//! - [`config`] - Layered configuration
//! - [`session`] - Credential slot and cached session
//! - [`events`] - Observable values
//! - [`resilience`] - Deadline race utility
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eventhub_realtime::config::RealtimeConfig;
//! use eventhub_realtime::system::RealtimeSystem;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RealtimeConfig::load(None)?;
//! let system = RealtimeSystem::connect(&config)?;
//! system.start().await;
//!
//! let mut status = system.backend_status();
//! status.changed().await?;
//! println!("backend is {}", *status.borrow());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests (paused-clock, no network)
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod health;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod push;
pub mod resilience;
pub mod session;
pub mod system;
pub mod test_utils;

pub use config::{FlickerPolicy, RealtimeConfig};
pub use error::{RealtimeError, RealtimeResult};
pub use health::{BackendStatus, BackendStatusMonitor, HealthProber, LivenessVerdict};
pub use models::{NotificationRecord, NotificationView, Session, UserProfile};
pub use notifications::NotificationReconciler;
pub use push::{PushChannel, PushConnectionState, PushIdentity, PushSignal};
pub use system::{RealtimeParts, RealtimeSystem, UserNotice};
