// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Error types for model clients

use thiserror::Error;

/// Result type alias for model client calls
pub type Result<T> = core::result::Result<T, ClientError>;

/// Failure of a single model call.
///
/// Clients make exactly one attempt per call. Whether a failure is worth
/// another attempt is decided by the caller through [`ClientError::is_transient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The request did not complete within the client timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established or was dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend rejected the request because of rate limiting (HTTP 429)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The backend failed internally (HTTP 5xx)
    #[error("Internal server error ({status}): {message}")]
    InternalServer {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Generic upstream API error without a more specific kind
    #[error("API error: {message}")]
    Api {
        /// HTTP status code, if one was received
        status: Option<u16>,
        /// Response body or reason
        message: String,
    },

    /// Credentials were rejected (HTTP 401/403)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The request itself is invalid (HTTP 4xx other than 401/403/429)
    #[error("Bad request ({status}): {message}")]
    BadRequest {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ClientError {
    /// Create a generic upstream API error
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            status: None,
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create an internal server error with status 500
    pub fn internal_server(message: impl Into<String>) -> Self {
        Self::InternalServer {
            status: 500,
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status and its body to an error kind.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = body.to_string();
        match status {
            401 | 403 => Self::Authentication(message),
            408 => Self::Timeout(message),
            429 => Self::RateLimited(message),
            500..=599 => Self::InternalServer { status, message },
            400..=499 => Self::BadRequest { status, message },
            _ => Self::Api {
                status: Some(status),
                message,
            },
        }
    }

    /// Whether another attempt may succeed.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::Connection(_)
                | Self::RateLimited(_)
                | Self::InternalServer { .. }
                | Self::Api { .. }
        )
    }

    /// Get the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Connection(_) => "connection",
            Self::RateLimited(_) => "rate_limit",
            Self::InternalServer { .. } => "internal_server",
            Self::Api { .. } => "api",
            Self::Authentication(_) => "authentication",
            Self::BadRequest { .. } => "bad_request",
            Self::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), &err.to_string())
        } else {
            Self::api(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
