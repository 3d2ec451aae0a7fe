// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Language model client abstraction

use crate::error::Result;
use crate::params::InvocationParams;
use crate::provider::Provider;
use crate::request::LMRequest;
use crate::response::LMResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration for LM client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LMConfig {
    /// Model name
    pub model: String,

    /// Temperature
    pub temperature: f32,

    /// Max tokens
    pub max_tokens: u32,

    /// Nucleus sampling
    pub top_p: f32,

    /// Frequency penalty
    pub frequency_penalty: f32,

    /// Presence penalty
    pub presence_penalty: f32,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for LMConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.0,
            max_tokens: 256,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            request_timeout_secs: 60,
        }
    }
}

impl LMConfig {
    /// Create a config for the given model with default sampling settings
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Invocation parameters sent with every request
    pub fn invocation_params(&self) -> InvocationParams {
        InvocationParams::new()
            .with("model", self.model.as_str())
            .with("temperature", self.temperature)
            .with("max_tokens", self.max_tokens)
            .with("frequency_penalty", self.frequency_penalty)
            .with("presence_penalty", self.presence_penalty)
            .with("top_p", self.top_p)
    }
}

/// Language model client trait.
///
/// `generate` makes a single attempt; retrying is the caller's concern.
#[async_trait]
pub trait LM: Send + Sync {
    /// Generate a completion
    async fn generate(&self, request: LMRequest<'_>) -> Result<LMResponse>;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get configuration
    fn config(&self) -> &LMConfig;

    /// Human-readable name used in diagnostics (e.g. "OpenAI")
    fn label(&self) -> &str {
        "Model"
    }

    /// Whether the backend honors [`LMRequest::function`]
    fn supports_function_calling(&self) -> bool {
        false
    }

    /// Invocation parameters, safe to print
    fn invocation_params(&self) -> InvocationParams {
        self.config().invocation_params()
    }
}

/// Concrete LM implementation
pub struct LMClient {
    config: LMConfig,
    provider: Box<dyn Provider>,
}

impl LMClient {
    /// Create a new LM client
    pub fn new(config: LMConfig, provider: Box<dyn Provider>) -> Self {
        Self { config, provider }
    }

    /// Create with default config
    pub fn with_provider(provider: Box<dyn Provider>) -> Self {
        Self::new(LMConfig::default(), provider)
    }

    /// Get the provider
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }
}

impl fmt::Debug for LMClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LMClient")
            .field("config", &self.config)
            .field("provider", &self.provider.provider_type())
            .finish()
    }
}

#[async_trait]
impl LM for LMClient {
    async fn generate(&self, request: LMRequest<'_>) -> Result<LMResponse> {
        self.provider.complete(request, &self.config).await
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn config(&self) -> &LMConfig {
        &self.config
    }

    fn label(&self) -> &str {
        self.provider.provider_type().label()
    }

    fn supports_function_calling(&self) -> bool {
        self.provider.supports_function_calling()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LMConfig::default();
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_invocation_params() {
        let params = LMConfig::new("gpt-4").invocation_params();
        let shown = params.to_string();
        assert!(shown.starts_with("{'model': 'gpt-4', 'temperature': 0.0"));
    }

    #[test]
    fn test_request_timeout_floor() {
        let config = LMConfig::default().request_timeout(Duration::from_millis(10));
        assert_eq!(config.request_timeout_secs, 1);
    }

    #[test]
    fn test_config_yaml_defaults() {
        let config: LMConfig = serde_json::from_str(r#"{"model": "gpt-4o-mini"}"#).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 256);
    }

    #[test]
    fn test_client_debug_hides_credentials() {
        let provider = crate::provider::OpenAIProvider::new("sk-secret-key").unwrap();
        let client = LMClient::new(LMConfig::new("gpt-4o"), Box::new(provider));
        let shown = format!("{:?}", client);
        assert!(shown.contains("gpt-4o"));
        assert!(shown.contains("OpenAI"));
        assert!(!shown.contains("sk-secret-key"));
    }
}
