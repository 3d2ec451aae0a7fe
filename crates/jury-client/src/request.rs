// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Requests sent to a model client.
//!
//! Sampling settings live in [`LMConfig`](crate::LMConfig), so the
//! invocation parameters reported for a batch are the ones every request
//! actually used.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// Chat role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions
    System,
    /// Rendered prompt
    User,
    /// Model output
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<'a> {
    /// Author
    pub role: Role,
    /// Text
    #[serde(borrow)]
    pub content: Cow<'a, str>,
}

impl<'a> Message<'a> {
    /// System message
    pub fn system(content: impl Into<Cow<'a, str>>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message
    pub fn user(content: impl Into<Cow<'a, str>>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Function the model is forced to call for structured output.
///
/// The backend answers with a `function_call` whose arguments follow
/// `parameters` (a JSON schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Function name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema of the arguments
    pub parameters: Value,
}

impl FunctionSpec {
    /// Create a function spec
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A single model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LMRequest<'a> {
    /// System prompt, sent ahead of the messages
    #[serde(borrow)]
    pub system: Option<Cow<'a, str>>,
    /// Conversation
    #[serde(borrow)]
    pub messages: Vec<Message<'a>>,
    /// Structured-output function the model must call
    pub function: Option<FunctionSpec>,
}

impl<'a> LMRequest<'a> {
    /// Request holding one user message
    pub fn prompt(prompt: impl Into<Cow<'a, str>>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            ..Default::default()
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<Cow<'a, str>>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Require a structured function call
    pub fn with_function(mut self, function: FunctionSpec) -> Self {
        self.function = Some(function);
        self
    }

    /// System prompt and message contents joined by newlines
    pub fn text(&self) -> String {
        self.system
            .iter()
            .chain(self.messages.iter().map(|m| &m.content))
            .map(|c| c.as_ref())
            .collect::<Vec<&str>>()
            .join("\n")
    }
}
