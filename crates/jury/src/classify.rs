// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Batch orchestration: datasets in, row-aligned tables out.
//!
//! Rows become work units, the executor runs them, and outcomes are put
//! back by position. List-valued references are exploded into one unit per
//! item and regrouped per row in item order.

use crate::dataset::{Dataset, Record};
use crate::error::Result;
use crate::evaluator::{Evaluator, ParsedResult};
use crate::executor::{Executor, Outcome, UnitId, WorkUnit};
use crate::rails::{Rails, NOT_PARSABLE};
use crate::report::Printer;
use crate::table::{Columns, ResultTable};
use crate::template::{PromptTemplate, VariableMap};
use crate::templates::ClassificationTemplate;
use jury_client::LM;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// OpenInference column holding the query
pub const OPENINFERENCE_QUERY_COLUMN: &str = "attributes.input.value";
/// OpenInference column holding retrieved documents
pub const OPENINFERENCE_DOCUMENT_COLUMN: &str = "attributes.retrieval.documents";
/// Key of the document text inside an OpenInference document
pub const OPENINFERENCE_DOCUMENT_CONTENT: &str = "document.content";

/// Options for [`llm_classify`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyOptions {
    /// Ask for explanations
    pub provide_explanation: bool,
    /// Use function calls when the model supports them
    pub use_function_calling_if_available: bool,
    /// Keep the rendered prompt as a column
    pub include_prompt: bool,
    /// Keep the raw response as a column
    pub include_response: bool,
    /// Template variable to column mapping
    #[serde(skip)]
    pub variables: VariableMap,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            provide_explanation: false,
            use_function_calling_if_available: true,
            include_prompt: false,
            include_response: false,
            variables: VariableMap::new(),
        }
    }
}

impl ClassifyOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for explanations
    pub fn provide_explanation(mut self, yes: bool) -> Self {
        self.provide_explanation = yes;
        self
    }

    /// Use function calls when available
    pub fn use_function_calling_if_available(mut self, yes: bool) -> Self {
        self.use_function_calling_if_available = yes;
        self
    }

    /// Keep prompts
    pub fn include_prompt(mut self, yes: bool) -> Self {
        self.include_prompt = yes;
        self
    }

    /// Keep raw responses
    pub fn include_response(mut self, yes: bool) -> Self {
        self.include_response = yes;
        self
    }

    /// Map template variables to columns
    pub fn variables(mut self, variables: VariableMap) -> Self {
        self.variables = variables;
        self
    }
}

/// Options for [`run_relevance_eval`]
#[derive(Debug, Clone)]
pub struct RelevanceOptions {
    /// Template; defaults to the built-in RAG relevance template
    pub template: Option<ClassificationTemplate>,
    /// Query column; detected when unset
    pub query_column: Option<String>,
    /// Reference column; detected when unset
    pub reference_column: Option<String>,
    /// Key taken out of object references; defaults to `document.content`
    /// for OpenInference datasets
    pub document_key: Option<String>,
    /// Use function calls when available
    pub use_function_calling_if_available: bool,
}

impl Default for RelevanceOptions {
    fn default() -> Self {
        Self {
            template: None,
            query_column: None,
            reference_column: None,
            document_key: None,
            use_function_calling_if_available: true,
        }
    }
}

impl RelevanceOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom template
    pub fn template(mut self, template: ClassificationTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Read queries from `column`
    pub fn query_column(mut self, column: impl Into<String>) -> Self {
        self.query_column = Some(column.into());
        self
    }

    /// Read references from `column`
    pub fn reference_column(mut self, column: impl Into<String>) -> Self {
        self.reference_column = Some(column.into());
        self
    }

    /// Take `key` out of object references
    pub fn document_key(mut self, key: impl Into<String>) -> Self {
        self.document_key = Some(key.into());
        self
    }

    /// Use function calls when available
    pub fn use_function_calling_if_available(mut self, yes: bool) -> Self {
        self.use_function_calling_if_available = yes;
        self
    }

    fn variables(&self, dataset: &Dataset) -> VariableMap {
        let query = self.query_column.clone().unwrap_or_else(|| {
            if !dataset.has_column("input") && dataset.has_column(OPENINFERENCE_QUERY_COLUMN) {
                OPENINFERENCE_QUERY_COLUMN.to_string()
            } else {
                "input".to_string()
            }
        });
        let openinference = self.reference_column.is_none()
            && !dataset.has_column("reference")
            && dataset.has_column(OPENINFERENCE_DOCUMENT_COLUMN);
        let reference = self.reference_column.clone().unwrap_or_else(|| {
            if openinference {
                OPENINFERENCE_DOCUMENT_COLUMN.to_string()
            } else {
                "reference".to_string()
            }
        });
        let key = self
            .document_key
            .clone()
            .or_else(|| openinference.then(|| OPENINFERENCE_DOCUMENT_CONTENT.to_string()));

        let map = VariableMap::new().map("input", query);
        match key {
            Some(key) => map.map_key("reference", reference, key),
            None => map.map("reference", reference),
        }
    }
}

/// Classify every row of `dataset` with one template and rail set.
pub fn llm_classify(
    executor: &Executor,
    dataset: &Dataset,
    model: Arc<dyn LM>,
    template: &PromptTemplate,
    rails: &Rails,
    options: &ClassifyOptions,
) -> Result<ResultTable> {
    let evaluator = Evaluator::builder(model, template.clone(), rails.clone())
        .provide_explanation(options.provide_explanation)
        .use_function_calling_if_available(options.use_function_calling_if_available)
        .build()?;
    let columns = Columns {
        explanation: options.provide_explanation,
        prompt: options.include_prompt,
        response: options.include_response,
    };
    classify_rows(executor, dataset, &evaluator, &options.variables, columns)
}

/// Like [`llm_classify`], taking the prompt and rails from a
/// [`ClassificationTemplate`]. Free-text runs that want explanations use
/// the template's explanation variant.
pub fn classify_with_template(
    executor: &Executor,
    dataset: &Dataset,
    model: Arc<dyn LM>,
    template: &ClassificationTemplate,
    options: &ClassifyOptions,
) -> Result<ResultTable> {
    let evaluator = Evaluator::from_template(model, template)
        .provide_explanation(options.provide_explanation)
        .use_function_calling_if_available(options.use_function_calling_if_available)
        .build()?;
    let columns = Columns {
        explanation: options.provide_explanation,
        prompt: options.include_prompt,
        response: options.include_response,
    };
    classify_rows(executor, dataset, &evaluator, &options.variables, columns)
}

/// Run each evaluator over `dataset`, one table per evaluator.
///
/// No evaluators means no tables; the executor is not touched.
pub fn run_evals(
    executor: &Executor,
    dataset: &Dataset,
    evaluators: &[Evaluator],
) -> Result<Vec<ResultTable>> {
    evaluators
        .iter()
        .map(|evaluator| {
            let columns = Columns {
                explanation: evaluator.provides_explanation(),
                ..Default::default()
            };
            classify_rows(executor, dataset, evaluator, &VariableMap::new(), columns)
        })
        .collect()
}

/// Judge every reference of every row for relevance to the row's query.
///
/// Returns one list of labels per row, in reference order. Rows without a
/// query or without references give an empty list.
pub fn run_relevance_eval(
    executor: &Executor,
    dataset: &Dataset,
    model: Arc<dyn LM>,
    options: &RelevanceOptions,
) -> Result<Vec<Vec<String>>> {
    let template = match &options.template {
        Some(template) => template.clone(),
        None => ClassificationTemplate::rag_relevancy()?,
    };
    let evaluator = Evaluator::from_template(model, &template)
        .use_function_calling_if_available(options.use_function_calling_if_available)
        .build()?;
    let variables = options.variables(dataset);

    let units: Vec<WorkUnit> = dataset
        .records()
        .iter()
        .enumerate()
        .flat_map(|(row, record)| {
            evaluator
                .template()
                .expand(record, "reference", &variables)
                .into_iter()
                .enumerate()
                .map(move |(item, bindings)| WorkUnit::new(UnitId::new(row, item), bindings))
        })
        .collect();
    tracing::debug!(rows = dataset.len(), units = units.len(), "exploded references");

    let ids: Vec<UnitId> = units.iter().map(|u| u.id).collect();
    let outcomes = run_units(executor, &evaluator, units)?;

    let mut labels: Vec<Vec<String>> = vec![Vec::new(); dataset.len()];
    for (id, outcome) in ids.into_iter().zip(outcomes) {
        let label = outcome
            .success()
            .map_or_else(|| NOT_PARSABLE.to_string(), |parsed| parsed.label);
        labels[id.row].push(label);
    }
    Ok(labels)
}

fn classify_rows(
    executor: &Executor,
    dataset: &Dataset,
    evaluator: &Evaluator,
    variables: &VariableMap,
    columns: Columns,
) -> Result<ResultTable> {
    let units: Vec<WorkUnit> = dataset
        .records()
        .iter()
        .enumerate()
        .map(|(row, record): (usize, &Record)| {
            WorkUnit::new(UnitId::new(row, 0), evaluator.template().bind(record, variables))
        })
        .collect();

    let outcomes = run_units(executor, evaluator, units)?;
    Ok(ResultTable::from_outcomes(
        dataset.index().to_vec(),
        columns,
        outcomes,
    ))
}

fn run_units(
    executor: &Executor,
    evaluator: &Evaluator,
    units: Vec<WorkUnit>,
) -> Result<Vec<Outcome<ParsedResult>>> {
    let printer: Arc<Printer> = Arc::clone(executor.printer());
    let model = evaluator.model();
    printer.verbose(format!(
        "{} invocation parameters: {}",
        model.label(),
        model.invocation_params()
    ));

    let evaluator = Arc::new(evaluator.clone());
    executor.run(units, move |unit| {
        let evaluator = Arc::clone(&evaluator);
        let printer = Arc::clone(&printer);
        async move { evaluator.evaluate(&unit.bindings, &printer).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorConfig;
    use crate::retry::NoWait;
    use jury_client::ScriptedLM;
    use serde_json::json;

    fn dataset(rows: Vec<serde_json::Value>) -> Dataset {
        rows.into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect()
    }

    fn executor(verbose: bool) -> Executor {
        Executor::new(ExecutorConfig::new().max_concurrency(4).verbose(verbose))
            .unwrap()
            .with_printer(Arc::new(Printer::buffered(verbose, true)))
            .with_wait(Arc::new(NoWait))
    }

    #[test]
    fn test_openinference_detection() {
        let ds = dataset(vec![json!({
            "attributes.input.value": "q",
            "attributes.retrieval.documents": [{"document.content": "d"}],
        })]);
        let map = RelevanceOptions::new().variables(&ds);
        assert_eq!(map.column("input"), OPENINFERENCE_QUERY_COLUMN);
        assert_eq!(map.column("reference"), OPENINFERENCE_DOCUMENT_COLUMN);
        assert_eq!(
            map.resolve("reference", &ds.records()[0].clone()),
            Some(json!([{"document.content": "d"}]))
        );
    }

    #[test]
    fn test_plain_columns_detection() {
        let ds = dataset(vec![json!({"input": "q", "reference": ["r"]})]);
        let map = RelevanceOptions::new().variables(&ds);
        assert_eq!(map.column("input"), "input");
        assert_eq!(map.column("reference"), "reference");
    }

    #[test]
    fn test_run_evals_without_evaluators() {
        let ds = dataset(vec![json!({"input": "q"})]);
        let tables = run_evals(&executor(false), &ds, &[]).unwrap();
        assert!(tables.is_empty());
    }

    #[test]
    fn test_invocation_params_printed_when_verbose() {
        let exec = executor(true);
        let ds = dataset(vec![json!({"input": "q", "reference": "r"})]);
        let lm: Arc<dyn LM> = Arc::new(ScriptedLM::new("relevant"));
        let template = PromptTemplate::parse("{input} {reference}").unwrap();
        let rails = Rails::new(["relevant", "irrelevant"]).unwrap();

        llm_classify(&exec, &ds, lm, &template, &rails, &ClassifyOptions::new()).unwrap();

        let out = exec.printer().output();
        assert!(out.contains("Scripted invocation parameters: {'model': 'scripted'"));
        assert!(out.contains("Snapped 'relevant' to rail: relevant"));
    }

    #[test]
    fn test_missing_variable_is_row_failure() {
        let exec = executor(false);
        let ds = dataset(vec![json!({"input": "q"}), json!({"input": "q", "reference": "r"})]);
        let lm: Arc<dyn LM> = Arc::new(ScriptedLM::new("relevant"));
        let template = PromptTemplate::parse("{input} {reference}").unwrap();
        let rails = Rails::new(["relevant", "irrelevant"]).unwrap();

        let table =
            llm_classify(&exec, &ds, lm, &template, &rails, &ClassifyOptions::new()).unwrap();

        assert_eq!(table.labels(), vec![NOT_PARSABLE, "relevant"]);
        assert!(exec.printer().output().contains("Exception in worker on row 0 item 0"));
    }
}
