// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Scripted model client for tests and offline runs.
//!
//! ```rust
//! use jury_client::mock::ScriptedLM;
//!
//! let lm = ScriptedLM::new("irrelevant")
//!     .on("Paris", "relevant")
//!     .fail_first(2, jury_client::ClientError::internal_server("boom"));
//! assert_eq!(lm.calls(), 0);
//! ```

use crate::error::{ClientError, Result};
use crate::lm::{LMConfig, LM};
use crate::request::LMRequest;
use crate::response::{FunctionCall, LMResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What a scripted client answers.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Free-text completion
    Text(String),
    /// Function call with the given arguments
    Function(Value),
    /// Error for every matching call
    Fail(ClientError),
    /// Panic inside `generate`
    Panic(String),
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

struct Rule {
    needle: String,
    reply: Reply,
}

struct Failures {
    needle: Option<String>,
    remaining: usize,
    error: ClientError,
}

/// Model client answering from a script.
///
/// Rules are checked in insertion order against the rendered request text;
/// the first rule whose needle is contained in the text wins, otherwise the
/// default reply is used. Failure budgets run before the rules.
pub struct ScriptedLM {
    config: LMConfig,
    rules: Vec<Rule>,
    default: Reply,
    failures: Mutex<Vec<Failures>>,
    latency: Option<Duration>,
    function_calling: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLM {
    /// Create a client answering `default` to everything
    pub fn new(default: impl Into<Reply>) -> Self {
        Self {
            config: LMConfig::new("scripted"),
            rules: Vec::new(),
            default: default.into(),
            failures: Mutex::new(Vec::new()),
            latency: None,
            function_calling: false,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer `reply` when the request text contains `needle`
    pub fn on(mut self, needle: impl Into<String>, reply: impl Into<Reply>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: reply.into(),
        });
        self
    }

    /// Fail the first `times` calls with `error`
    pub fn fail_first(self, times: usize, error: ClientError) -> Self {
        self.failures.lock().push(Failures {
            needle: None,
            remaining: times,
            error,
        });
        self
    }

    /// Fail the first `times` calls whose text contains `needle`
    pub fn fail_first_on(self, needle: impl Into<String>, times: usize, error: ClientError) -> Self {
        self.failures.lock().push(Failures {
            needle: Some(needle.into()),
            remaining: times,
            error,
        });
        self
    }

    /// Sleep this long inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Advertise structured function-call support
    pub fn with_function_calling(mut self, enabled: bool) -> Self {
        self.function_calling = enabled;
        self
    }

    /// Replace the config
    pub fn with_config(mut self, config: LMConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of `generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Request texts in the order they were received
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn scripted_failure(&self, text: &str) -> Option<ClientError> {
        let mut failures = self.failures.lock();
        failures
            .iter_mut()
            .filter(|f| f.remaining > 0)
            .find(|f| f.needle.as_deref().map_or(true, |n| text.contains(n)))
            .map(|f| {
                f.remaining -= 1;
                f.error.clone()
            })
    }

    fn reply_for(&self, text: &str) -> &Reply {
        self.rules
            .iter()
            .find(|rule| text.contains(&rule.needle))
            .map_or(&self.default, |rule| &rule.reply)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LM for ScriptedLM {
    async fn generate(&self, request: LMRequest<'_>) -> Result<LMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let text = request.text();
        self.prompts.lock().push(text.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.scripted_failure(&text) {
            return Err(error);
        }

        match self.reply_for(&text) {
            Reply::Text(answer) => Ok(LMResponse::new(answer.clone(), &self.config.model)),
            Reply::Function(args) => {
                let name = request
                    .function
                    .as_ref()
                    .map(|f| f.name.clone())
                    .unwrap_or_default();
                Ok(LMResponse::function(
                    FunctionCall::new(name, args.clone()),
                    &self.config.model,
                ))
            }
            Reply::Fail(error) => Err(error.clone()),
            Reply::Panic(message) => panic!("{}", message),
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn config(&self) -> &LMConfig {
        &self.config
    }

    fn label(&self) -> &str {
        "Scripted"
    }

    fn supports_function_calling(&self) -> bool {
        self.function_calling
    }
}
