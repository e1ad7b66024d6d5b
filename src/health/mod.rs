//! # Backend Health
//!
//! Liveness probing and the process-wide backend status signal.

pub mod monitor;
pub mod prober;

pub use monitor::{BackendStatus, BackendStatusMonitor, CycleOutcome, MonitorHandle};
pub use prober::{HealthProber, LivenessVerdict};
