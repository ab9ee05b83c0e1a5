//! Bounded retry with a fixed delay between attempts.
//!
//! [`RetryPolicy`] describes the bound; [`RetryBudget`] is the mutable counter a
//! loop draws from. The fetcher shares one budget across all pages of a run,
//! while [`RetryPolicy::retry`] wraps a single fallible operation.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// How many attempts an operation gets and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one.
    pub max_attempts: u32,
    /// Fixed wait after a failed attempt before the next one.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Start a fresh budget for one unit of work.
    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            remaining: self.max_attempts,
            delay: self.delay,
        }
    }

    /// Run `op` until it succeeds or the attempts are used up, returning the
    /// last error in the latter case.
    ///
    /// A policy with zero attempts still runs `op` once.
    pub async fn retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut budget = self.budget();
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => match budget.record_failure() {
                    Some(delay) => {
                        warn!(
                            task = label,
                            error = %e,
                            attempts_left = budget.remaining(),
                            delay_secs = delay.as_secs_f64(),
                            "attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                },
            }
        }
    }
}

/// Remaining attempts for one unit of work.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    remaining: u32,
    delay: Duration,
}

impl RetryBudget {
    /// Whether another attempt may be made.
    pub fn has_remaining(&self) -> bool {
        self.remaining > 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Charge one failed attempt. Returns the delay to wait before the next
    /// attempt, or `None` once the budget is spent.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            Some(self.delay)
        } else {
            None
        }
    }
}
