//! Bounded readiness polling.
//!
//! [`wait_until`] drives an async probe with exponential backoff until it
//! reports ready, the attempt budget is spent, or the deadline passes.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Total time budget measured from the first probe.
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    /// A policy that probes at a constant interval.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Grows `current` by the multiplier, capped at `max_interval`. A
    /// product that is not a valid duration also yields the cap.
    pub fn next_interval(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .map(|next| next.min(self.max_interval))
            .unwrap_or(self.max_interval)
    }
}

/// Calls `probe` until it returns `true` and yields the attempt number
/// that succeeded.
///
/// The probe receives the 1-based attempt number. A probe that never
/// succeeds ends in [`Error::Timeout`] once `max_attempts` probes have
/// run or the deadline has elapsed, whichever comes first.
pub async fn wait_until<F, Fut>(policy: &RetryPolicy, what: &str, mut probe: F) -> Result<u32>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();
    let mut interval = policy.initial_interval;
    let mut attempt = 0;

    while attempt < policy.max_attempts {
        attempt += 1;

        if probe(attempt).await {
            info!(attempt, elapsed_ms = started.elapsed().as_millis() as u64, "{} is ready", what);
            return Ok(attempt);
        }

        if attempt == policy.max_attempts {
            break;
        }

        let wait = match policy.deadline {
            Some(deadline) => {
                let elapsed = started.elapsed();
                if elapsed >= deadline {
                    return Err(Error::Timeout {
                        message: format!(
                            "{} not ready after {:?} ({} attempts)",
                            what, deadline, attempt
                        ),
                    });
                }
                interval.min(deadline - elapsed)
            }
            None => interval,
        };

        info!(
            attempt,
            max_attempts = policy.max_attempts,
            retry_in_ms = wait.as_millis() as u64,
            "Waiting for {}...",
            what
        );
        sleep(wait).await;
        interval = policy.next_interval(interval);
        debug!(next_interval_ms = interval.as_millis() as u64, "Backing off");
    }

    Err(Error::Timeout {
        message: format!("{} not ready after {} attempts", what, attempt),
    })
}
