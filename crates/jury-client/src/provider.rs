// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Provider abstraction for different LM backends

use crate::error::{ClientError, Result};
use crate::lm::LMConfig;
use crate::request::{FunctionSpec, LMRequest, Message};
use crate::response::{FunctionCall, LMResponse, Usage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;

/// Type of LM provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    /// OpenAI (and compatible endpoints)
    OpenAI,
    /// Local model
    Local,
    /// Custom provider
    Custom,
}

impl ProviderType {
    /// Name used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Local => "Local",
            Self::Custom => "Custom",
        }
    }
}

/// Provider trait for LM backends
#[async_trait]
pub trait Provider: Send + Sync {
    /// Complete a request
    async fn complete(&self, request: LMRequest<'_>, config: &LMConfig) -> Result<LMResponse>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Whether structured function calls are supported
    fn supports_function_calling(&self) -> bool {
        false
    }
}

/// OpenAI provider implementation
pub struct OpenAIProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Default endpoint
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    /// Create a new OpenAI provider
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    /// Create from the `OPENAI_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        Self::from_env_var("OPENAI_API_KEY")
    }

    /// Create from the named environment variable.
    ///
    /// An unset or empty variable is an authentication error.
    pub fn from_env_var(name: &str) -> Result<Self> {
        match std::env::var(name) {
            Ok(key) if !key.is_empty() => Self::new(key),
            _ => Err(ClientError::Authentication(format!(
                "environment variable {} is not set",
                name
            ))),
        }
    }

    /// Create with custom base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_payload(request: &LMRequest<'_>, config: &LMConfig) -> Value {
        let mut messages: Vec<Message<'_>> = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(Message::system(system.as_ref()));
        }
        messages.extend(request.messages.iter().cloned());

        let mut payload = serde_json::json!({
            "model": config.model,
            "messages": messages,
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "top_p": config.top_p,
            "frequency_penalty": config.frequency_penalty,
            "presence_penalty": config.presence_penalty,
        });

        if let Some(function) = &request.function {
            payload["functions"] = serde_json::json!([function]);
            payload["function_call"] = serde_json::json!({ "name": function.name });
        }

        payload
    }

    fn parse_response(body: OpenAIResponse, requested: Option<&FunctionSpec>) -> Result<LMResponse> {
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Decode("No choices in response".to_string()))?;

        let model = body.model.unwrap_or_default();
        let mut response = match choice.message.function_call {
            Some(call) => {
                let name = call
                    .name
                    .or_else(|| requested.map(|f| f.name.clone()))
                    .unwrap_or_default();
                let mut response = LMResponse::function(FunctionCall::new(name, call.arguments), model);
                response.text = choice.message.content.unwrap_or_default();
                response
            }
            None => LMResponse::new(choice.message.content.unwrap_or_default(), model),
        };

        if let Some(usage) = body.usage {
            response = response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
        }
        if let Some(reason) = choice.finish_reason {
            response = response.with_finish_reason(reason);
        }

        Ok(response)
    }
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    usage: Option<OpenAIUsage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    function_call: Option<OpenAIFunctionCall>,
}

#[derive(Deserialize)]
struct OpenAIFunctionCall {
    name: Option<String>,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn complete(&self, request: LMRequest<'_>, config: &LMConfig) -> Result<LMResponse> {
        let span = tracing::info_span!("llm_call", provider = "openai", model = %config.model);

        async {
            let payload = Self::build_payload(&request, config);
            let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

            let response = self
                .client
                .post(url)
                .bearer_auth(&self.api_key)
                .timeout(config.timeout())
                .json(&payload)
                .send()
                .await
                .map_err(ClientError::from)?;

            let status = response.status();
            let text = response.text().await.map_err(ClientError::from)?;

            if !status.is_success() {
                tracing::debug!(status = status.as_u16(), "llm call rejected");
                return Err(ClientError::from_status(status.as_u16(), &text));
            }

            let body: OpenAIResponse = serde_json::from_str(&text)?;
            let response = Self::parse_response(body, request.function.as_ref())?;

            if let Some(usage) = response.usage {
                tracing::debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "llm call complete"
                );
            }
            Ok(response)
        }
        .instrument(span)
        .await
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }

    fn supports_function_calling(&self) -> bool {
        true
    }
}
