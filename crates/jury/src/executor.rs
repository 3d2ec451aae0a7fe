// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Concurrent Executor
//!
//! Runs one async task per work unit with bounded concurrency, per-unit
//! retry and per-unit failure isolation, and returns one [`Outcome`] per
//! unit in input order.
//!
//! ## Architecture
//!
//! - **Semaphore**: a unit's task starts only once it holds a permit
//! - **JoinSet**: every unit is its own tokio task
//! - **Collector**: the loop owned by the run call is the only writer of
//!   output slots
//! - **Scheduler**: `run` blocks the caller on an owned or offloaded runtime
//!
//! ## Usage
//!
//! ```ignore
//! let executor = Executor::new(ExecutorConfig::new().max_concurrency(4))?;
//! let outcomes = executor.run(units, |unit| async move { evaluate(&unit).await })?;
//! ```

use crate::dataset::Record;
use crate::error::{Error, Result};
use crate::report::Printer;
use crate::retry::{retry, RetryPolicy, TokioSleep, Wait};
use crate::scheduler::{self, SchedulerMode};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Position of a unit: dataset row and, for exploded rows, list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId {
    /// Row in the dataset
    pub row: usize,
    /// Item within an exploded list (0 for scalar rows)
    pub item: usize,
}

impl UnitId {
    /// Create a unit id
    pub fn new(row: usize, item: usize) -> Self {
        Self { row, item }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} item {}", self.row, self.item)
    }
}

/// One evaluable unit: a stable id and its template bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    /// Identity, stable across retries
    pub id: UnitId,
    /// Template bindings
    pub bindings: Record,
}

impl WorkUnit {
    /// Create a work unit
    pub fn new(id: UnitId, bindings: Record) -> Self {
        Self { id, bindings }
    }
}

/// Why a unit produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    /// The failed unit
    pub id: UnitId,
    /// Error category (see [`Error::category`])
    pub category: String,
    /// Error message
    pub message: String,
}

impl UnitFailure {
    fn new(id: UnitId, error: &Error) -> Self {
        Self {
            id,
            category: error.category().to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.message)
    }
}

/// Result of one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The task returned a value
    Success(T),
    /// The task failed terminally or panicked
    Failure(UnitFailure),
}

impl<T> Outcome<T> {
    /// Whether the unit succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The value, if any
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// The failure, if any
    pub fn failure(&self) -> Option<&UnitFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// Configuration for the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum units in flight at once
    pub max_concurrency: usize,
    /// Retry policy per unit
    pub retry: RetryPolicy,
    /// Print verbose diagnostics
    pub verbose: bool,
    /// Print progress notices (retries)
    pub show_progress: bool,
    /// Substrate selection
    pub scheduler: SchedulerMode,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 20,
            retry: RetryPolicy::default(),
            verbose: false,
            show_progress: true,
            scheduler: SchedulerMode::Auto,
        }
    }
}

impl ExecutorConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum concurrency.
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set the attempt budget per unit.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Replace the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Enable verbose diagnostics.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Enable progress notices.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Force a substrate.
    pub fn scheduler(mut self, mode: SchedulerMode) -> Self {
        self.scheduler = mode;
        self
    }

    /// Check the configuration before any work is dispatched.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::config("max_concurrency must be greater than 0"));
        }
        Ok(())
    }
}

/// Concurrent executor.
///
/// Holds configuration only; every run creates its own semaphore and
/// task set.
pub struct Executor {
    config: ExecutorConfig,
    printer: Arc<Printer>,
    wait: Arc<dyn Wait>,
}

impl Executor {
    /// Create an executor printing to stdout and sleeping between retries.
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let printer = Arc::new(Printer::new(config.verbose, config.show_progress));
        Ok(Self {
            config,
            printer,
            wait: Arc::new(TokioSleep),
        })
    }

    /// Replace the printer.
    pub fn with_printer(mut self, printer: Arc<Printer>) -> Self {
        self.printer = printer;
        self
    }

    /// Replace the backoff wait.
    pub fn with_wait(mut self, wait: Arc<dyn Wait>) -> Self {
        self.wait = wait;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Get the printer.
    pub fn printer(&self) -> &Arc<Printer> {
        &self.printer
    }

    /// Run all units, blocking the calling thread.
    ///
    /// Works from plain synchronous code and from inside a running tokio
    /// runtime alike. Only substrate failures are returned as errors.
    pub fn run<F, Fut, T>(&self, units: Vec<WorkUnit>, task: F) -> Result<Vec<Outcome<T>>>
    where
        F: Fn(Arc<WorkUnit>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if units.is_empty() {
            return Ok(Vec::new());
        }
        let mode = self.config.scheduler.resolve();
        tracing::debug!(units = units.len(), substrate = ?mode, "dispatching batch");
        scheduler::block_on(mode, self.batch(units, task))
    }

    /// Run all units on the current runtime.
    pub async fn run_async<F, Fut, T>(&self, units: Vec<WorkUnit>, task: F) -> Vec<Outcome<T>>
    where
        F: Fn(Arc<WorkUnit>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.batch(units, task).await
    }

    fn batch<F, Fut, T>(
        &self,
        units: Vec<WorkUnit>,
        task: F,
    ) -> impl Future<Output = Vec<Outcome<T>>> + Send + 'static
    where
        F: Fn(Arc<WorkUnit>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let policy = self.config.retry.clone();
        let printer = Arc::clone(&self.printer);
        let wait = Arc::clone(&self.wait);
        let task = Arc::new(task);

        async move {
            let ids: Vec<UnitId> = units.iter().map(|u| u.id).collect();
            let mut set = JoinSet::new();

            for (index, unit) in units.into_iter().enumerate() {
                let unit = Arc::new(unit);
                let semaphore = Arc::clone(&semaphore);
                let policy = policy.clone();
                let printer = Arc::clone(&printer);
                let wait = Arc::clone(&wait);
                let task = Arc::clone(&task);

                set.spawn(async move {
                    let id = unit.id;
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => {
                            let attempts = retry(&policy, wait.as_ref(), &printer, |_| {
                                (*task)(Arc::clone(&unit))
                            });
                            AssertUnwindSafe(attempts)
                                .catch_unwind()
                                .await
                                .unwrap_or_else(|payload| Err(Error::panic(payload.as_ref())))
                        }
                        Err(_) => Err(Error::runtime("concurrency gate closed")),
                    };

                    let outcome = match result {
                        Ok(value) => Outcome::Success(value),
                        Err(err) => {
                            printer.error(format!("Exception in worker on {}: {}", id, err));
                            Outcome::Failure(UnitFailure::new(id, &err))
                        }
                    };
                    (index, outcome)
                });
            }

            let mut slots: Vec<Option<Outcome<T>>> = ids.iter().map(|_| None).collect();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((index, outcome)) => slots[index] = Some(outcome),
                    Err(err) => tracing::error!(error = %err, "unit task did not complete"),
                }
            }

            let outcomes: Vec<Outcome<T>> = slots
                .into_iter()
                .zip(ids)
                .map(|(slot, id)| {
                    slot.unwrap_or_else(|| {
                        let err = Error::runtime("unit task aborted");
                        printer.error(format!("Exception in worker on {}: {}", id, err));
                        Outcome::Failure(UnitFailure::new(id, &err))
                    })
                })
                .collect();

            let failed = outcomes.iter().filter(|o| !o.is_success()).count();
            tracing::info!(units = outcomes.len(), failed, "batch complete");
            outcomes
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
