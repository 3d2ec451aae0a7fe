// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Per-unit retry with exponential backoff and jitter.
//!
//! The executor is the only layer that retries; model clients make a single
//! attempt per call. `max_retries` is the attempt budget for one unit: with
//! a budget of 4, attempts 1 to 3 may fail transiently and be retried, and a
//! failure of attempt 4 is terminal.

use crate::error::{Error, Result};
use crate::report::Printer;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempt budget per unit (0 behaves like 1).
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Upper bound for a single delay.
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_factor: f64,
    /// Randomize each delay within `[delay / 2, delay]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and default backoff
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set the initial delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff factor
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Enable or disable jitter
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts a unit may make
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Delay after `failed` failed attempts, before jitter
    pub fn backoff(&self, failed: u32) -> Duration {
        let exp = self.backoff_factor.max(1.0).powi(failed.saturating_sub(1) as i32);
        let secs = (self.initial_delay.as_secs_f64() * exp).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Delay after `failed` failed attempts, jitter applied
    pub fn delay(&self, failed: u32) -> Duration {
        let base = self.backoff(failed);
        if self.jitter && !base.is_zero() {
            base.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            base
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// How a backoff delay is waited out
#[async_trait]
pub trait Wait: Send + Sync {
    /// Wait for `delay`
    async fn wait(&self, delay: Duration);
}

/// Waits with `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait]
impl Wait for TokioSleep {
    async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Returns immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWait;

#[async_trait]
impl Wait for NoWait {
    async fn wait(&self, _delay: Duration) {}
}

/// Retry bookkeeping for one in-flight unit.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts started so far
    pub attempt: u32,
    /// Error of the last failed attempt
    pub last_error: Option<Error>,
    /// Delay before the next attempt
    pub next_delay: Duration,
}

/// Run `op` until it succeeds, fails terminally, or the budget is spent.
///
/// Every retried failure is reported as `Failed attempt <n>: <error>`.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    wait: &dyn Wait,
    printer: &Printer,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut state = RetryState::default();

    loop {
        state.attempt += 1;
        match op(state.attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && state.attempt < policy.attempts() => {
                state.next_delay = policy.delay(state.attempt);
                printer.notice(format!("Failed attempt {}: {}", state.attempt, err));
                tracing::debug!(
                    attempt = state.attempt,
                    category = err.category(),
                    delay_ms = state.next_delay.as_millis() as u64,
                    "retrying"
                );
                state.last_error = Some(err);
                wait.wait(state.next_delay).await;
            }
            Err(err) => {
                if let Some(previous) = state.last_error.take() {
                    tracing::debug!(
                        attempts = state.attempt,
                        previous = %previous,
                        "retry budget exhausted"
                    );
                }
                return Err(err);
            }
        }
    }
}
