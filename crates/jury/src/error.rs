// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Error types for Jury

use jury_client::ClientError;
use thiserror::Error;

/// Result type alias for Jury operations
pub type Result<T> = core::result::Result<T, Error>;

/// Main error type for Jury
#[derive(Error, Debug)]
pub enum Error {
    /// Model client failure
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Template parsing or rendering errors
    #[error("Template error: {0}")]
    Template(String),

    /// Invalid configuration, raised before any work is dispatched
    #[error("Config error: {0}")]
    Config(String),

    /// Runtime construction or worker thread failures
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// A unit's task panicked
    #[error("Panic: {0}")]
    Panic(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a template error
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a runtime error
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Create a panic error from a caught panic payload.
    pub fn panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::Panic(msg)
    }

    /// Whether another attempt may succeed.
    ///
    /// Only model client errors can be transient.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_transient())
    }

    /// Get the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Client(e) => e.category(),
            Self::Template(_) => "template",
            Self::Config(_) => "config",
            Self::Runtime(_) => "runtime",
            Self::Panic(_) => "panic",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
        }
    }
}
