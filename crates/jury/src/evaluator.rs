// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Evaluator: one template, one rail set, one model client

use crate::dataset::Record;
use crate::error::{Error, Result};
use crate::rails::{Rails, NOT_PARSABLE};
use crate::report::Printer;
use crate::template::PromptTemplate;
use crate::templates::ClassificationTemplate;
use jury_client::{FunctionSpec, LMRequest, LMResponse, LM};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the function the model is asked to call
pub const FUNCTION_NAME: &str = "record_response";
/// Argument holding the label
pub const RESPONSE: &str = "response";
/// Argument holding the explanation
pub const EXPLANATION: &str = "explanation";

const LABEL_DELIMITER: &str = r"(?i)\W*label\W*";

/// How the model is asked to answer. Chosen once per evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    /// Free text, snapped to a rail
    FreeText,
    /// Structured function call with `response` and `explanation`
    FunctionCall,
}

/// Parsed model answer for one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResult {
    /// A rail or [`NOT_PARSABLE`]
    pub label: String,
    /// Explanation, when requested and present
    pub explanation: Option<String>,
    /// Raw model output
    pub raw_response: String,
    /// Rendered prompt
    pub prompt: String,
}

/// Binds a template, rails and explanation policy to a model client.
#[derive(Clone)]
pub struct Evaluator {
    template: PromptTemplate,
    rails: Rails,
    explanation: bool,
    mode: OutputMode,
    model: Arc<dyn LM>,
    label_delimiter: Regex,
}

/// Builder for [`Evaluator`]
pub struct EvaluatorBuilder {
    model: Arc<dyn LM>,
    template: PromptTemplate,
    explanation_template: Option<PromptTemplate>,
    rails: Rails,
    explanation: bool,
    function_calling: bool,
}

impl EvaluatorBuilder {
    /// Ask for explanations
    pub fn provide_explanation(mut self, explanation: bool) -> Self {
        self.explanation = explanation;
        self
    }

    /// Use structured function calls when the model supports them
    pub fn use_function_calling_if_available(mut self, enabled: bool) -> Self {
        self.function_calling = enabled;
        self
    }

    /// Build the evaluator, fixing its output mode
    pub fn build(self) -> Result<Evaluator> {
        let mode = if self.function_calling && self.model.supports_function_calling() {
            OutputMode::FunctionCall
        } else {
            OutputMode::FreeText
        };

        // Free-text explanations need a prompt that asks for a LABEL line.
        let template = match (mode, self.explanation, self.explanation_template) {
            (OutputMode::FreeText, true, Some(explained)) => explained,
            (_, _, _) => self.template,
        };

        let label_delimiter = Regex::new(LABEL_DELIMITER)
            .map_err(|e| Error::config(format!("invalid label delimiter: {}", e)))?;

        Ok(Evaluator {
            template,
            rails: self.rails,
            explanation: self.explanation,
            mode,
            model: self.model,
            label_delimiter,
        })
    }
}

impl Evaluator {
    /// Start building an evaluator over a custom template
    pub fn builder(model: Arc<dyn LM>, template: PromptTemplate, rails: Rails) -> EvaluatorBuilder {
        EvaluatorBuilder {
            model,
            template,
            explanation_template: None,
            rails,
            explanation: false,
            function_calling: true,
        }
    }

    /// Start building an evaluator over a built-in template
    pub fn from_template(model: Arc<dyn LM>, template: &ClassificationTemplate) -> EvaluatorBuilder {
        EvaluatorBuilder {
            model,
            template: template.prompt(false).clone(),
            explanation_template: Some(template.prompt(true).clone()),
            rails: template.rails().clone(),
            explanation: false,
            function_calling: true,
        }
    }

    /// Output mode
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Rails
    pub fn rails(&self) -> &Rails {
        &self.rails
    }

    /// Prompt template in use
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Whether explanations are requested
    pub fn provides_explanation(&self) -> bool {
        self.explanation
    }

    /// Model client
    pub fn model(&self) -> &Arc<dyn LM> {
        &self.model
    }

    /// Function the model must call in [`OutputMode::FunctionCall`]
    pub fn function_spec(&self) -> FunctionSpec {
        let mut properties = serde_json::json!({
            RESPONSE: {
                "type": "string",
                "description": "The label",
                "enum": self.rails.labels(),
            }
        });
        let mut required = vec![RESPONSE];
        if self.explanation {
            properties[EXPLANATION] = serde_json::json!({
                "type": "string",
                "description": "Explanation of the reasoning behind the label",
            });
            required.insert(0, EXPLANATION);
        }

        FunctionSpec::new(
            FUNCTION_NAME,
            "A function to record your response.",
            serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        )
    }

    /// Render, call the model once, and parse the answer.
    ///
    /// Template and model client errors are returned; an unparsable answer
    /// is a successful result labelled [`NOT_PARSABLE`].
    pub async fn evaluate(&self, bindings: &Record, printer: &Printer) -> Result<ParsedResult> {
        let prompt = self.template.render(bindings)?;

        let mut request = LMRequest::prompt(prompt.as_str());
        if self.mode == OutputMode::FunctionCall {
            request = request.with_function(self.function_spec());
        }

        let response = self.model.generate(request).await?;
        Ok(self.parse(&response, prompt, printer))
    }

    /// Parse a model response according to the output mode
    pub fn parse(&self, response: &LMResponse, prompt: String, printer: &Printer) -> ParsedResult {
        let raw_response = response.raw();

        let (label, explanation) = match self.mode {
            OutputMode::FunctionCall => match &response.function_call {
                Some(call) => {
                    let label = call
                        .argument(RESPONSE)
                        .map(|r| self.rails.snap(r, printer))
                        .unwrap_or_else(|| NOT_PARSABLE.to_string());
                    let explanation = self
                        .explanation
                        .then(|| call.argument(EXPLANATION).map(str::to_string))
                        .flatten();
                    (label, explanation)
                }
                None => {
                    printer.verbose(format!(
                        "No function call in response: '{}'",
                        raw_response.escape_debug()
                    ));
                    (NOT_PARSABLE.to_string(), None)
                }
            },
            OutputMode::FreeText if self.explanation => {
                let label = match self.label_delimiter.find(&response.text) {
                    Some(delimiter) => self.rails.snap(&response.text[delimiter.end()..], printer),
                    None => {
                        printer.verbose(format!(
                            "No LABEL in response: '{}'",
                            response.text.escape_debug()
                        ));
                        NOT_PARSABLE.to_string()
                    }
                };
                (label, Some(response.text.clone()))
            }
            OutputMode::FreeText => (self.rails.snap(&response.text, printer), None),
        };

        ParsedResult {
            label,
            explanation,
            raw_response,
            prompt,
        }
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("rails", &self.rails)
            .field("explanation", &self.explanation)
            .field("mode", &self.mode)
            .field("model", &self.model.model())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jury_client::{FunctionCall, Reply, ScriptedLM};
    use serde_json::json;

    fn rails() -> Rails {
        Rails::new(["relevant", "irrelevant"]).unwrap()
    }

    fn bindings() -> Record {
        json!({"input": "What is Python?", "reference": "Python is a language."})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn quiet() -> Printer {
        Printer::buffered(false, false)
    }

    #[test]
    fn test_mode_selection() {
        let template = PromptTemplate::parse("{input}").unwrap();
        let plain: Arc<dyn LM> = Arc::new(ScriptedLM::new("x"));
        let capable: Arc<dyn LM> = Arc::new(ScriptedLM::new("x").with_function_calling(true));

        let e = Evaluator::builder(plain, template.clone(), rails()).build().unwrap();
        assert_eq!(e.mode(), OutputMode::FreeText);

        let e = Evaluator::builder(Arc::clone(&capable), template.clone(), rails())
            .build()
            .unwrap();
        assert_eq!(e.mode(), OutputMode::FunctionCall);

        let e = Evaluator::builder(capable, template, rails())
            .use_function_calling_if_available(false)
            .build()
            .unwrap();
        assert_eq!(e.mode(), OutputMode::FreeText);
    }

    #[tokio::test]
    async fn test_free_text() {
        let lm: Arc<dyn LM> = Arc::new(ScriptedLM::new("\nrelevant "));
        let template = PromptTemplate::parse("{input} / {reference}").unwrap();
        let e = Evaluator::builder(lm, template, rails()).build().unwrap();

        let result = e.evaluate(&bindings(), &quiet()).await.unwrap();
        assert_eq!(result.label, "relevant");
        assert_eq!(result.explanation, None);
        assert_eq!(result.raw_response, "\nrelevant ");
        assert_eq!(result.prompt, "What is Python? / Python is a language.");
    }

    #[tokio::test]
    async fn test_free_text_with_explanation() {
        let answer = "EXPLANATION: The reference defines Python.\nLABEL: \"relevant\"";
        let lm: Arc<dyn LM> = Arc::new(ScriptedLM::new(answer));
        let template = ClassificationTemplate::rag_relevancy().unwrap();
        let e = Evaluator::from_template(lm, &template)
            .provide_explanation(true)
            .build()
            .unwrap();

        assert!(e.template().text().contains("LABEL"));
        let result = e.evaluate(&bindings(), &quiet()).await.unwrap();
        assert_eq!(result.label, "relevant");
        assert_eq!(result.explanation.as_deref(), Some(answer));
    }

    #[tokio::test]
    async fn test_free_text_explanation_without_label() {
        let lm: Arc<dyn LM> = Arc::new(ScriptedLM::new("it is relevant"));
        let template = PromptTemplate::parse("{input}").unwrap();
        let e = Evaluator::builder(lm, template, rails())
            .provide_explanation(true)
            .build()
            .unwrap();

        let result = e.evaluate(&bindings(), &quiet()).await.unwrap();
        assert_eq!(result.label, NOT_PARSABLE);
        assert_eq!(result.explanation.as_deref(), Some("it is relevant"));
    }

    #[tokio::test]
    async fn test_function_call_mode() {
        let lm = Arc::new(
            ScriptedLM::new(Reply::Function(json!({
                "response": "irrelevant",
                "explanation": "no overlap",
            })))
            .with_function_calling(true),
        );
        let template = PromptTemplate::parse("{input}").unwrap();
        let e = Evaluator::builder(lm.clone(), template, rails())
            .provide_explanation(true)
            .build()
            .unwrap();

        let result = e.evaluate(&bindings(), &quiet()).await.unwrap();
        assert_eq!(result.label, "irrelevant");
        assert_eq!(result.explanation.as_deref(), Some("no overlap"));
    }

    #[test]
    fn test_function_call_string_arguments_and_missing_call() {
        let lm: Arc<dyn LM> = Arc::new(ScriptedLM::new("x").with_function_calling(true));
        let template = PromptTemplate::parse("{input}").unwrap();
        let e = Evaluator::builder(lm, template, rails()).build().unwrap();

        let call = FunctionCall::new(
            FUNCTION_NAME,
            json!("{\n  \"response\": \"relevant\", \"explanation\": \"ignored\"\n}"),
        );
        let parsed = e.parse(&LMResponse::function(call, "m"), String::new(), &quiet());
        assert_eq!(parsed.label, "relevant");
        assert_eq!(parsed.explanation, None);

        let parsed = e.parse(&LMResponse::new("relevant", "m"), String::new(), &quiet());
        assert_eq!(parsed.label, NOT_PARSABLE);
        assert_eq!(parsed.explanation, None);
    }

    #[test]
    fn test_function_spec() {
        let lm: Arc<dyn LM> = Arc::new(ScriptedLM::new("x").with_function_calling(true));
        let template = PromptTemplate::parse("{input}").unwrap();
        let e = Evaluator::builder(lm, template, rails())
            .provide_explanation(true)
            .build()
            .unwrap();

        let spec = e.function_spec();
        assert_eq!(spec.name, FUNCTION_NAME);
        assert_eq!(
            spec.parameters["properties"]["response"]["enum"],
            json!(["relevant", "irrelevant"])
        );
        assert_eq!(spec.parameters["required"], json!(["explanation", "response"]));
    }

    #[tokio::test]
    async fn test_template_error_propagates() {
        let lm: Arc<dyn LM> = Arc::new(ScriptedLM::new("relevant"));
        let template = PromptTemplate::parse("{missing}").unwrap();
        let e = Evaluator::builder(lm, template, rails()).build().unwrap();

        let err = e.evaluate(&bindings(), &quiet()).await.unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }
}
