//! # Resilience Module
//!
//! Time-bounding primitives for calls against a backend that may be asleep.
//!
//! ## Usage
//!
//! ```rust
//! use eventhub_realtime::resilience::{race_with_deadline, Settled};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let outcome = race_with_deadline(
//!     async { "pong" },
//!     Duration::from_millis(2500),
//! )
//! .await;
//!
//! match outcome {
//!     Settled::Completed(reply) => println!("backend answered: {reply}"),
//!     Settled::DeadlineElapsed => println!("backend still waking up"),
//! }
//! # });
//! ```

pub mod deadline;

pub use deadline::{race_with_deadline, Settled};
