// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! # Jury - LLM-as-judge batch classification
//!
//! Renders a prompt per dataset row, asks a model for a label, snaps the
//! answer onto a fixed set of rails and returns a table aligned with the
//! input rows.
//!
//! ## Architecture
//!
//! - [`rails`]: snapping free text onto allowed labels
//! - [`template`]: `{variable}` prompt templates
//! - [`evaluator`]: one model call and its parse
//! - [`executor`]: bounded-concurrency batch runner with retries and
//!   per-unit failure isolation, usable with or without a running runtime
//! - [`classify`]: `llm_classify`, `run_evals` and `run_relevance_eval`
//!
//! ## Quick Start
//!
//! ```ignore
//! use jury::prelude::*;
//! use std::sync::Arc;
//!
//! let model: Arc<dyn LM> = Arc::new(LMClient::new(LMConfig::new("gpt-4"), Box::new(
//!     OpenAIProvider::from_env()?,
//! )));
//! let executor = Executor::new(ExecutorConfig::new().max_concurrency(8))?;
//! let dataset = Dataset::from_path("rows.jsonl")?;
//!
//! let table = classify_with_template(
//!     &executor,
//!     &dataset,
//!     model,
//!     &ClassificationTemplate::rag_relevancy()?,
//!     &ClassifyOptions::new().provide_explanation(true),
//! )?;
//! println!("{:?}", table.labels());
//! ```

#![warn(missing_docs)]
#![allow(clippy::new_without_default)]

pub mod classify;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod rails;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod table;
pub mod template;
pub mod templates;

pub use classify::{
    classify_with_template, llm_classify, run_evals, run_relevance_eval, ClassifyOptions,
    RelevanceOptions,
};
pub use config::{EvalConfig, EvaluatorConfig, ModelConfig};
pub use dataset::{Dataset, Record};
pub use error::{Error, Result};
pub use evaluator::{Evaluator, EvaluatorBuilder, OutputMode, ParsedResult};
pub use executor::{Executor, ExecutorConfig, Outcome, UnitFailure, UnitId, WorkUnit};
pub use rails::{snap, Rails, NOT_PARSABLE};
pub use report::{Printer, Sink};
pub use retry::{retry, NoWait, RetryPolicy, RetryState, TokioSleep, Wait};
pub use scheduler::SchedulerMode;
pub use table::{Columns, ResultRow, ResultTable};
pub use template::{PromptTemplate, VariableMap};
pub use templates::{Builtin, ClassificationTemplate};

/// Everything needed for a typical run
pub mod prelude {
    pub use crate::classify::{
        classify_with_template, llm_classify, run_evals, run_relevance_eval, ClassifyOptions,
        RelevanceOptions,
    };
    pub use crate::dataset::Dataset;
    pub use crate::error::{Error, Result};
    pub use crate::evaluator::Evaluator;
    pub use crate::executor::{Executor, ExecutorConfig};
    pub use crate::rails::{Rails, NOT_PARSABLE};
    pub use crate::template::PromptTemplate;
    pub use crate::templates::ClassificationTemplate;
    pub use jury_client::{LMClient, LMConfig, OpenAIProvider, ScriptedLM, LM};
}
