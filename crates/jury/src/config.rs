// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! YAML configuration for a classification run.
//!
//! ```yaml
//! model:
//!   model: gpt-4
//!   temperature: 0.0
//!   api_key_env: OPENAI_API_KEY
//! executor:
//!   max_concurrency: 20
//!   retry:
//!     max_retries: 10
//! evaluator:
//!   template: rag_relevancy
//!   provide_explanation: true
//! ```
//!
//! The API key itself is never part of the file; only the name of the
//! environment variable holding it.

use crate::classify::ClassifyOptions;
use crate::error::{Error, Result};
use crate::executor::ExecutorConfig;
use crate::rails::Rails;
use crate::templates::{Builtin, ClassificationTemplate};
use jury_client::{LMClient, LMConfig, OpenAIProvider};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Model section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Sampling and timeout settings
    #[serde(flatten)]
    pub lm: LMConfig,
    /// Endpoint override
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            lm: LMConfig::default(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl ModelConfig {
    /// Build an OpenAI client, reading the key from the environment
    pub fn client(&self) -> Result<LMClient> {
        let key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                Error::config(format!(
                    "environment variable {} is not set",
                    self.api_key_env
                ))
            })?;
        let provider = OpenAIProvider::new(key)?;
        let provider = match &self.base_url {
            Some(url) => provider.with_base_url(url.as_str()),
            None => provider,
        };
        Ok(LMClient::new(self.lm.clone(), Box::new(provider)))
    }
}

/// Evaluator section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Built-in template name (default `rag_relevancy`)
    pub template: Option<String>,
    /// Custom template text; needs `rails`
    pub template_text: Option<String>,
    /// Rails; overrides a built-in template's rails
    pub rails: Option<Vec<String>>,
    /// Ask for explanations
    pub provide_explanation: bool,
    /// Use function calls when available
    pub use_function_calling_if_available: bool,
    /// Keep prompts in the output
    pub include_prompt: bool,
    /// Keep raw responses in the output
    pub include_response: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            template: None,
            template_text: None,
            rails: None,
            provide_explanation: false,
            use_function_calling_if_available: true,
            include_prompt: false,
            include_response: false,
        }
    }
}

impl EvaluatorConfig {
    /// Resolve the configured template and rails
    pub fn classification_template(&self) -> Result<ClassificationTemplate> {
        match (&self.template, &self.template_text) {
            (Some(_), Some(_)) => Err(Error::config(
                "set either evaluator.template or evaluator.template_text, not both",
            )),
            (_, Some(text)) => {
                let rails = self.rails.clone().ok_or_else(|| {
                    Error::config("evaluator.rails is required with evaluator.template_text")
                })?;
                ClassificationTemplate::new("custom", Rails::new(rails)?, text, text)
            }
            (name, None) => {
                let builtin = match name {
                    Some(name) => name.parse::<Builtin>()?,
                    None => Builtin::RagRelevancy,
                };
                let template = builtin.template()?;
                match &self.rails {
                    Some(rails) => ClassificationTemplate::new(
                        builtin.name(),
                        Rails::new(rails.clone())?,
                        template.prompt(false).text(),
                        template.prompt(true).text(),
                    ),
                    None => Ok(template),
                }
            }
        }
    }

    /// Options for a classification run
    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions::new()
            .provide_explanation(self.provide_explanation)
            .use_function_calling_if_available(self.use_function_calling_if_available)
            .include_prompt(self.include_prompt)
            .include_response(self.include_response)
    }
}

/// Whole run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Model section
    pub model: ModelConfig,
    /// Executor section
    pub executor: ExecutorConfig,
    /// Evaluator section
    pub evaluator: EvaluatorConfig,
}

impl EvalConfig {
    /// Parse and validate YAML
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.executor.validate()?;
        if self.model.lm.model.trim().is_empty() {
            return Err(Error::config("model.model must not be empty"));
        }
        if self.model.api_key_env.trim().is_empty() {
            return Err(Error::config("model.api_key_env must not be empty"));
        }
        self.evaluator.classification_template()?;
        Ok(())
    }
}
