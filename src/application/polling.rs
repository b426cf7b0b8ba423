//! Client-side wait for a terminal job record.

use crate::domain::jobs::JobRecord;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Consecutive failed polls tolerated before giving up
    pub max_consecutive_errors: usize,
    /// Give up once this much time has passed; `None` waits forever
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_consecutive_errors: 5,
            deadline: None,
        }
    }
}

impl PollPolicy {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier.max(1.0)).min(self.max_delay)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PollError {
    #[error("job still pending after {0:?}")]
    DeadlineExceeded(Duration),
    #[error("giving up after {attempts} failed polls: {last}")]
    TooManyErrors { attempts: usize, last: String },
}

/// Call `poll` until it yields a terminal record.
pub async fn poll_until_terminal<F, Fut, E>(
    mut poll: F,
    policy: &PollPolicy,
) -> Result<JobRecord, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobRecord, E>>,
    E: Display,
{
    let started = Instant::now();
    let mut delay = policy.initial_delay;
    let mut errors = 0;

    loop {
        match poll().await {
            Ok(record) if record.is_terminal() => return Ok(record),
            Ok(record) => {
                errors = 0;
                debug!(job_id = %record.id, "job pending");
            }
            Err(e) => {
                errors += 1;
                if errors >= policy.max_consecutive_errors {
                    return Err(PollError::TooManyErrors {
                        attempts: errors,
                        last: e.to_string(),
                    });
                }
                debug!(attempt = errors, error = %e, "poll failed");
            }
        }

        let mut sleep_for = delay;
        if let Some(deadline) = policy.deadline {
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                return Err(PollError::DeadlineExceeded(deadline));
            }
            sleep_for = sleep_for.min(deadline - elapsed);
        }
        tokio::time::sleep(sleep_for).await;
        delay = policy.next_delay(delay);
    }
}
