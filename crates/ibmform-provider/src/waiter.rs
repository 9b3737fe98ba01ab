//! Polling until a remote object reaches a target state

use crate::error::{ProviderError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

const INITIAL_WAIT: Duration = Duration::from_millis(100);
const MAX_WAIT: Duration = Duration::from_secs(10);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(180);

/// Configuration for waiting on a state transition
///
/// The refresh function returns the current object, or `None` when it does
/// not exist, together with its state string. With an empty `target` a
/// missing object counts as reaching the target, which is how deletions
/// are awaited.
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Lower bound for the backoff between refreshes
    pub min_timeout: Duration,
    /// Fixed wait between refreshes, overrides the backoff when non-zero
    pub poll_interval: Duration,
    pub not_found_checks: usize,
    pub continuous_target_occurence: usize,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            timeout,
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            not_found_checks: 20,
            continuous_target_occurence: 1,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_not_found_checks(mut self, checks: usize) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn with_continuous_target_occurence(mut self, occurence: usize) -> Self {
        self.continuous_target_occurence = occurence.max(1);
        self
    }

    /// Poll `refresh` until the target state is observed
    pub async fn wait_for<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(Option<T>, String)>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut wait = INITIAL_WAIT;
        let mut target_hits = 0usize;
        let mut not_found = 0usize;
        let mut last_state = String::new();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        loop {
            let (object, state) = refresh().await?;
            tracing::debug!("Waiting for {:?}, current state: '{}'", self.target, state);

            match object {
                None => {
                    target_hits = 0;
                    if self.target.is_empty() {
                        target_hits = self.continuous_target_occurence;
                    } else {
                        not_found += 1;
                        if not_found > self.not_found_checks {
                            return Err(ProviderError::ResourceNotFound(format!(
                                "object not found after {} checks while waiting for {:?}",
                                self.not_found_checks, self.target
                            )));
                        }
                    }
                    if target_hits >= self.continuous_target_occurence {
                        return Ok(None);
                    }
                }
                Some(object) => {
                    not_found = 0;
                    if self.target.contains(&state) {
                        target_hits += 1;
                        if target_hits >= self.continuous_target_occurence {
                            return Ok(Some(object));
                        }
                    } else if self.pending.contains(&state) {
                        target_hits = 0;
                    } else {
                        return Err(ProviderError::UnexpectedState {
                            state,
                            target: self.target.clone(),
                        });
                    }
                }
            }
            last_state = state;

            // back off, but not while the target state is re-occurring
            if target_hits == 0 {
                wait *= 2;
            }
            if !self.poll_interval.is_zero() && self.poll_interval < MAX_POLL_INTERVAL {
                wait = self.poll_interval;
            } else if wait < self.min_timeout {
                wait = self.min_timeout;
            } else if wait > MAX_WAIT {
                wait = MAX_WAIT;
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(wait.min(deadline - now)).await;
        }

        Err(ProviderError::Timeout {
            last_state,
            target: self.target.clone(),
            timeout: self.timeout,
        })
    }
}
