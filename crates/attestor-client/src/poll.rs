//! Finalization polling with backoff and jitter.
//!
//! Rounds finalize on the oracle network's schedule, not ours. The poller
//! probes until the round reports finalized, backing off between probes.
//! It never gives up on its own; the caller bounds the wait.

use std::{future::Future, sync::Arc, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::Result,
    time::{Clock, RealClock},
};

/// Delay policy between finalization probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay after the first unsuccessful probe.
    pub base_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Jitter percentage (0.0 to 1.0) to add randomness.
    pub jitter_factor: f64,

    /// How the delay grows between probes.
    pub strategy: BackoffStrategy,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.1,
            strategy: BackoffStrategy::Exponential,
        }
    }
}

/// Strategy for calculating poll delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Fixed delay between probes.
    Fixed,
    /// Delay doubles each probe.
    Exponential,
    /// Delay grows by the base amount each probe.
    Linear,
}

impl PollPolicy {
    /// Policy with a constant delay and no jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            max_delay: delay,
            jitter_factor: 0.0,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Delay after the `attempt`-th unsuccessful probe (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt.max(1)),
            BackoffStrategy::Exponential => {
                let exponent = attempt.saturating_sub(1).min(20);
                self.base_delay.saturating_mul(2_u32.saturating_pow(exponent))
            },
        };

        let capped = delay.min(self.max_delay);
        apply_jitter(capped, self.jitter_factor).min(self.max_delay)
    }
}

/// Randomizes a delay by ±`jitter_factor` so many waiting clients do not
/// probe in lockstep.
fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return duration;
    }

    let clamped_jitter = jitter_factor.clamp(0.0, 1.0);

    let mut rng = rand::rng();
    let jitter_range = duration.as_secs_f64() * clamped_jitter;
    let jitter_offset = rng.random_range(-jitter_range..=jitter_range);
    let jittered_secs = duration.as_secs_f64() + jitter_offset;

    Duration::from_secs_f64(jittered_secs.max(0.0))
}

/// Polls a finalization probe until it succeeds.
#[derive(Debug, Clone)]
pub struct FinalizationPoller {
    policy: PollPolicy,
    clock: Arc<dyn Clock>,
}

impl FinalizationPoller {
    /// Poller sleeping on the real clock.
    pub fn new(policy: PollPolicy) -> Self {
        Self::with_clock(policy, Arc::new(RealClock::new()))
    }

    /// Poller sleeping on an injected clock.
    pub fn with_clock(policy: PollPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    /// Active policy.
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Call `probe` until it reports `true`.
    ///
    /// Retryable probe errors are logged and polled through.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable probe error.
    pub async fn wait_until<F, Fut>(&self, round: u64, mut probe: F) -> Result<()>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<bool>> + Send,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);

            match probe().await {
                Ok(true) => {
                    debug!(round, attempts = attempt, "round finalized");
                    return Ok(());
                },
                Ok(false) => {},
                Err(e) if e.is_retryable() => {
                    warn!(round, attempt, error = %e, "finalization probe failed, polling again");
                },
                Err(e) => return Err(e),
            }

            let delay = self.policy.delay_for(attempt);
            debug!(round, attempt, delay_ms = delay.as_millis(), "round not finalized yet");
            self.clock.sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(strategy: BackoffStrategy) -> PollPolicy {
        PollPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.0,
            strategy,
        }
    }

    #[test]
    fn exponential_backoff_doubles_until_cap() {
        let policy = no_jitter(BackoffStrategy::Exponential);
        let delays: Vec<u64> = (1..=6).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, [1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn linear_and_fixed_backoff() {
        let linear = no_jitter(BackoffStrategy::Linear);
        let delays: Vec<u64> = (1..=4).map(|a| linear.delay_for(a).as_secs()).collect();
        assert_eq!(delays, [1, 2, 3, 4]);

        let fixed = PollPolicy::fixed(Duration::from_millis(250));
        assert_eq!(fixed.delay_for(1), Duration::from_millis(250));
        assert_eq!(fixed.delay_for(100), Duration::from_millis(250));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = PollPolicy {
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.25,
            strategy: BackoffStrategy::Fixed,
        };
        for _ in 0..100 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_secs(3) && delay <= Duration::from_secs(5));
        }
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let policy = PollPolicy { max_delay: Duration::MAX, ..no_jitter(BackoffStrategy::Linear) };
        assert!(policy.delay_for(u32::MAX) > Duration::ZERO);

        let policy = no_jitter(BackoffStrategy::Exponential);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(10));
    }
}
