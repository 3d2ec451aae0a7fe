// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! LM response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response from language model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LMResponse {
    /// Generated text (empty when the model answered with a function call)
    pub text: String,

    /// Structured function call, when one was requested and returned
    pub function_call: Option<FunctionCall>,

    /// Token usage
    pub usage: Option<Usage>,

    /// Model that generated the response
    pub model: String,

    /// Finish reason
    pub finish_reason: Option<String>,
}

/// Function call returned by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the called function
    pub name: String,

    /// Arguments, always decoded to a JSON value
    pub arguments: Value,
}

impl FunctionCall {
    /// Create a function call.
    ///
    /// Backends send arguments either as a JSON object or as a JSON-encoded
    /// string; strings that hold valid JSON are decoded.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            other => other,
        };
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument
    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub prompt_tokens: u32,

    /// Completion tokens
    pub completion_tokens: u32,

    /// Total tokens
    pub total_tokens: u32,
}

impl Usage {
    /// Create new usage stats
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl LMResponse {
    /// Create a new text response
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            function_call: None,
            usage: None,
            model: model.into(),
            finish_reason: None,
        }
    }

    /// Create a response carrying only a function call
    pub fn function(call: FunctionCall, model: impl Into<String>) -> Self {
        Self {
            function_call: Some(call),
            ..Self::new("", model)
        }
    }

    /// Add usage stats
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Set finish reason
    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    /// Raw text for diagnostics: the text, or the function arguments as JSON.
    pub fn raw(&self) -> String {
        match &self.function_call {
            Some(call) if self.text.is_empty() => call.arguments.to_string(),
            _ => self.text.clone(),
        }
    }
}
