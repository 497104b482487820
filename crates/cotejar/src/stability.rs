//! Quiet-period readiness watcher.
//!
//! Captures of a page mid-animation compare noisily. The watcher polls
//! an opaque probe of the monitored resource (a DOM serialization, a
//! layout digest, any byte snapshot) and resolves once the probe stops
//! changing for a quiet period, or a hard cap elapses — whichever comes
//! first. Timing out is an expected outcome, not a failure: a partially
//! settled page still yields a valid, if noisier, comparison.

use crate::result::CotejarResult;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Quiet period and cap for the stability wait
#[derive(Debug, Clone)]
pub struct StabilityConfig {
    /// Probe must be unchanged for this long to count as stable (ms)
    pub quiet_period_ms: u64,
    /// Hard cap on the total wait (ms)
    pub max_wait_ms: u64,
    /// Probe cadence (ms)
    pub poll_interval_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 500,
            max_wait_ms: 4000,
            poll_interval_ms: 100,
        }
    }
}

impl StabilityConfig {
    /// Set the quiet period
    #[must_use]
    pub const fn with_quiet_period_ms(mut self, ms: u64) -> Self {
        self.quiet_period_ms = ms;
        self
    }

    /// Set the hard cap
    #[must_use]
    pub const fn with_max_wait_ms(mut self, ms: u64) -> Self {
        self.max_wait_ms = ms;
        self
    }

    /// Set the probe cadence
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

/// How the wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityStatus {
    /// The probe went quiet for the configured period
    Stable,
    /// The hard cap elapsed first; proceed anyway
    TimedOut,
}

impl StabilityStatus {
    /// Whether the resource settled before the cap
    #[must_use]
    pub const fn is_stable(&self) -> bool {
        matches!(self, Self::Stable)
    }
}

/// Watches a probe until it goes quiet
#[derive(Debug, Clone, Default)]
pub struct StabilityWatcher {
    config: StabilityConfig,
}

impl StabilityWatcher {
    /// Create a watcher with the given configuration
    #[must_use]
    pub const fn new(config: StabilityConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &StabilityConfig {
        &self.config
    }

    /// Poll the probe until its fingerprint is unchanged for the quiet
    /// period, or the cap elapses.
    ///
    /// # Errors
    ///
    /// Propagates probe failures; a timeout is NOT an error and resolves
    /// to [`StabilityStatus::TimedOut`].
    pub async fn wait_for_quiet<P, Fut>(&self, mut probe: P) -> CotejarResult<StabilityStatus>
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = CotejarResult<Vec<u8>>>,
    {
        let quiet = Duration::from_millis(self.config.quiet_period_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let deadline = Instant::now() + Duration::from_millis(self.config.max_wait_ms);

        let mut last_digest = fingerprint(&probe().await?);
        let mut quiet_since = Instant::now();

        loop {
            let now = Instant::now();
            if now.duration_since(quiet_since) >= quiet {
                tracing::debug!("probe went quiet");
                return Ok(StabilityStatus::Stable);
            }
            if now >= deadline {
                tracing::warn!(
                    max_wait_ms = self.config.max_wait_ms,
                    "stability wait capped out, proceeding"
                );
                return Ok(StabilityStatus::TimedOut);
            }

            sleep(poll.min(deadline - now)).await;

            let digest = fingerprint(&probe().await?);
            if digest != last_digest {
                last_digest = digest;
                quiet_since = Instant::now();
            }
        }
    }
}

/// SHA-256 fingerprint of a probe snapshot
fn fingerprint(snapshot: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(snapshot);
    hasher.finalize().into()
}
