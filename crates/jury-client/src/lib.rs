// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Model client abstraction for Jury
//!
//! One [`LM::generate`] call is one attempt against the backend. Retrying,
//! concurrency and result ordering belong to the caller.

pub mod error;
pub mod lm;
pub mod mock;
pub mod params;
pub mod provider;
pub mod request;
pub mod response;

pub use error::{ClientError, Result};
pub use lm::{LMClient, LMConfig, LM};
pub use mock::{Reply, ScriptedLM};
pub use params::{InvocationParams, ParamValue};
pub use provider::{OpenAIProvider, Provider, ProviderType};
pub use request::{FunctionSpec, LMRequest, Message, Role};
pub use response::{FunctionCall, LMResponse, Usage};
