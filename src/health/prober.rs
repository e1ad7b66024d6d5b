use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::client::LivenessCheck;
use crate::resilience::{race_with_deadline, Settled};

/// Verdict of one liveness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessVerdict {
    Success,
    Failure,
}

/// Issues bounded-latency liveness checks against the backend
///
/// Never returns an error: request failures and elapsed deadlines both
/// collapse into [`LivenessVerdict::Failure`].
#[derive(Clone)]
pub struct HealthProber {
    target: Arc<dyn LivenessCheck>,
}

impl std::fmt::Debug for HealthProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthProber").finish_non_exhaustive()
    }
}

impl HealthProber {
    pub fn new(target: Arc<dyn LivenessCheck>) -> Self {
        Self { target }
    }

    /// Probe once, giving up after `timeout`
    pub async fn probe(&self, timeout: Duration) -> LivenessVerdict {
        let target = Arc::clone(&self.target);
        let outcome = race_with_deadline(async move { target.check_liveness().await }, timeout).await;

        match outcome {
            Settled::Completed(Ok(())) => LivenessVerdict::Success,
            Settled::Completed(Err(e)) => {
                debug!(error = %e, "Liveness check failed");
                LivenessVerdict::Failure
            }
            Settled::DeadlineElapsed => {
                debug!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Liveness check timed out"
                );
                LivenessVerdict::Failure
            }
        }
    }
}
