// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Where a batch runs.
//!
//! A thread that is not inside a tokio runtime may build one and block on
//! it. A thread that already runs inside a runtime must not: the batch is
//! moved to a dedicated worker thread with its own runtime, and the caller
//! blocks on joining that thread. Both paths return the same output.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Substrate selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    /// Check the calling thread once per run
    #[default]
    Auto,
    /// Always build and drive a runtime on the calling thread; inside a
    /// runtime the run fails with [`Error::Runtime`]
    OwnedRuntime,
    /// Always drive the batch on a separate worker thread
    Offloaded,
}

impl SchedulerMode {
    /// Resolve `Auto` by checking the calling thread.
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto if tokio::runtime::Handle::try_current().is_ok() => Self::Offloaded,
            Self::Auto => Self::OwnedRuntime,
            forced => forced,
        }
    }
}

/// Drives a batch future to completion from synchronous code.
pub trait Scheduler {
    /// Block the calling thread until `future` completes
    fn block_on<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static;
}

/// Builds a multi-thread runtime on the calling thread.
///
/// Returns [`Error::Runtime`] when the calling thread is already inside a
/// runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnedRuntimeScheduler;

impl Scheduler for OwnedRuntimeScheduler {
    fn block_on<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::runtime(
                "cannot build an owned runtime inside a running runtime",
            ));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("jury-unit")
            .build()
            .map_err(|e| Error::runtime(format!("failed to build runtime: {}", e)))?;
        let output = runtime.block_on(future);
        // Tasks still parked on the runtime are aborted here, never written.
        runtime.shutdown_background();
        Ok(output)
    }
}

/// Runs the batch on a named worker thread with its own runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffloadedScheduler;

impl Scheduler for OffloadedScheduler {
    fn block_on<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name("jury-executor".to_string())
            .spawn(move || -> Result<F::Output> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| Error::runtime(format!("failed to build runtime: {}", e)))?;
                tracing::debug!("executor thread started");
                Ok(runtime.block_on(future))
            })
            .map_err(|e| Error::runtime(format!("failed to spawn executor thread: {}", e)))?;

        handle.join().map_err(|payload| Error::panic(payload.as_ref()))?
    }
}

/// Block on `future` with the substrate `mode` resolves to.
pub fn block_on<F>(mode: SchedulerMode, future: F) -> Result<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match mode.resolve() {
        SchedulerMode::Offloaded => OffloadedScheduler.block_on(future),
        _ => OwnedRuntimeScheduler.block_on(future),
    }
}
