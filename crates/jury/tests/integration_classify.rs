// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Integration tests for the batch entry points
//!
//! Runs `llm_classify`, `run_evals` and `run_relevance_eval` end to end
//! against scripted models and a mocked OpenAI endpoint.

use jury::prelude::*;
use jury::{Printer, RetryPolicy, VariableMap};
use jury_client::{ClientError, Reply};
use serde_json::{json, Value};
use std::sync::Arc;

fn dataset(rows: Vec<Value>) -> Dataset {
    rows.into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}

fn executor(verbose: bool) -> Executor {
    let config = ExecutorConfig::new()
        .max_concurrency(4)
        .verbose(verbose)
        .retry_policy(RetryPolicy::new(5).jitter(false));
    Executor::new(config)
        .unwrap()
        .with_printer(Arc::new(Printer::buffered(verbose, true)))
        .with_wait(Arc::new(jury::NoWait))
}

fn relevance_rails() -> Rails {
    Rails::new(["relevant", "irrelevant"]).unwrap()
}

#[test]
fn test_llm_classify_snaps_free_text() {
    let ds = dataset(vec![
        json!({"input": "q0"}),
        json!({"input": "q1"}),
        json!({"input": "q2"}),
        json!({"input": "q3"}),
    ])
    .with_index(["a", "b", "c", "d"])
    .unwrap();
    let lm = ScriptedLM::new("unparsable")
        .on("q0", "relevant")
        .on("q1", "irrelevant")
        .on("q2", "\nrelevant ");
    let template = PromptTemplate::parse("Question: {input}").unwrap();

    let table = llm_classify(
        &executor(false),
        &ds,
        Arc::new(lm),
        &template,
        &relevance_rails(),
        &ClassifyOptions::new(),
    )
    .unwrap();

    assert_eq!(table.index(), &["a", "b", "c", "d"]);
    assert_eq!(
        table.labels(),
        vec!["relevant", "irrelevant", "relevant", NOT_PARSABLE]
    );
    assert_eq!(table.column_names(), vec!["label"]);
}

#[test]
fn test_llm_classify_function_calls() {
    let ds = dataset(vec![
        json!({"input": "q0"}),
        json!({"input": "q1"}),
        json!({"input": "q2"}),
    ]);
    let lm = ScriptedLM::new("plain text, no call")
        .with_function_calling(true)
        .on(
            "q0",
            Reply::Function(json!({"response": "relevant", "explanation": "mentions it"})),
        )
        .on(
            "q1",
            Reply::Function(Value::String(
                r#"{"explanation": "off topic", "response": "irrelevant"}"#.into(),
            )),
        );
    let lm = Arc::new(lm);
    let template = PromptTemplate::parse("{input}").unwrap();
    let options = ClassifyOptions::new()
        .provide_explanation(true)
        .include_prompt(true);

    let table = llm_classify(
        &executor(false),
        &ds,
        lm.clone(),
        &template,
        &relevance_rails(),
        &options,
    )
    .unwrap();

    assert_eq!(table.labels(), vec!["relevant", "irrelevant", NOT_PARSABLE]);
    assert_eq!(
        table.explanations(),
        vec![Some("mentions it"), Some("off topic"), None]
    );
    assert_eq!(table.column_names(), vec!["label", "explanation", "prompt"]);
    assert_eq!(table.rows()[2].prompt.as_deref(), Some("q2"));
    assert_eq!(lm.calls(), 3);
}

#[test]
fn test_function_calls_without_explanation_drop_it() {
    let ds = dataset(vec![json!({"input": "q0"})]);
    let lm = ScriptedLM::new(Reply::Function(
        json!({"response": "IRRELEVANT", "explanation": "ignored"}),
    ))
    .with_function_calling(true);
    let template = PromptTemplate::parse("{input}").unwrap();

    let table = llm_classify(
        &executor(false),
        &ds,
        Arc::new(lm),
        &template,
        &relevance_rails(),
        &ClassifyOptions::new(),
    )
    .unwrap();

    assert_eq!(table.labels(), vec!["irrelevant"]);
    assert_eq!(table.rows()[0].explanation, None);
}

#[test]
fn test_free_text_explanations() {
    let ds = dataset(vec![json!({"input": "q0"}), json!({"input": "q1"})]);
    let lm = ScriptedLM::new("I am not sure.")
        .on("q0", "The reference answers the question.\nLABEL: relevant");
    let template = PromptTemplate::parse("{input}").unwrap();

    let table = llm_classify(
        &executor(false),
        &ds,
        Arc::new(lm),
        &template,
        &relevance_rails(),
        &ClassifyOptions::new()
            .provide_explanation(true)
            .use_function_calling_if_available(false),
    )
    .unwrap();

    assert_eq!(table.labels(), vec!["relevant", NOT_PARSABLE]);
    assert_eq!(
        table.explanations(),
        vec![
            Some("The reference answers the question.\nLABEL: relevant"),
            Some("I am not sure.")
        ]
    );
}

#[test]
fn test_builtin_template_uses_explanation_variant() {
    let ds = dataset(vec![json!({"input": "q0", "reference": "doc"})]);
    let lm = Arc::new(ScriptedLM::new("Looks related.\nLABEL: relevant"));
    let template = ClassificationTemplate::rag_relevancy().unwrap();

    let table = classify_with_template(
        &executor(false),
        &ds,
        lm.clone(),
        &template,
        &ClassifyOptions::new().provide_explanation(true),
    )
    .unwrap();

    assert_eq!(table.labels(), vec!["relevant"]);
    let expected = template.prompt(true).render(ds.records().first().unwrap()).unwrap();
    assert_eq!(lm.prompts(), vec![expected]);
}

#[test]
fn test_variable_mapping() {
    let ds = dataset(vec![json!({"question": "q0", "context": "doc"})]);
    let lm = Arc::new(ScriptedLM::new("relevant"));
    let template = PromptTemplate::parse("{input} | {reference}").unwrap();
    let options = ClassifyOptions::new().variables(
        VariableMap::new()
            .map("input", "question")
            .map("reference", "context"),
    );

    let table = llm_classify(
        &executor(false),
        &ds,
        lm.clone(),
        &template,
        &relevance_rails(),
        &options,
    )
    .unwrap();

    assert_eq!(table.labels(), vec!["relevant"]);
    assert_eq!(lm.prompts(), vec!["q0 | doc".to_string()]);
}

#[test]
fn test_run_evals_one_table_per_evaluator() {
    let ds = dataset(vec![
        json!({"input": "q0", "reference": "doc", "output": "a0"}),
        json!({"input": "q1", "reference": "doc", "output": "a1"}),
    ]);
    let toxic_lm: Arc<dyn LM> = Arc::new(ScriptedLM::new("non-toxic").on("q1", "toxic"));
    let hallucination_lm: Arc<dyn LM> =
        Arc::new(ScriptedLM::new("factual").on("a0", "hallucinated"));

    let evaluators = vec![
        Evaluator::from_template(toxic_lm, &ClassificationTemplate::toxicity().unwrap())
            .build()
            .unwrap(),
        Evaluator::from_template(
            hallucination_lm,
            &ClassificationTemplate::hallucination().unwrap(),
        )
        .build()
        .unwrap(),
    ];

    let tables = run_evals(&executor(false), &ds, &evaluators).unwrap();

    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].labels(), vec!["non-toxic", "toxic"]);
    assert_eq!(tables[1].labels(), vec!["hallucinated", "factual"]);
    assert_eq!(tables[0].index(), ds.index());
}

#[test]
fn test_relevance_multiple_references() {
    let ds = dataset(vec![
        json!({"input": "q0", "reference": ["doc-a", "doc-b"]}),
        json!({"input": "q1", "reference": ["doc-c"]}),
        json!({"input": "q2", "reference": ["doc-x", "doc-d"]}),
        json!({"input": "q3", "reference": []}),
        json!({"input": "q4"}),
        json!({"input": null, "reference": ["doc-e"]}),
        json!({"input": "q6", "reference": null}),
        json!({"input": "q7", "reference": "doc-f"}),
    ]);
    let lm = Arc::new(
        ScriptedLM::new("relevant")
            .on("doc-b", "irrelevant")
            .on("doc-x", "gibberish"),
    );

    let labels =
        run_relevance_eval(&executor(false), &ds, lm.clone(), &RelevanceOptions::new()).unwrap();

    let expected: Vec<Vec<&str>> = vec![
        vec!["relevant", "irrelevant"],
        vec!["relevant"],
        vec![NOT_PARSABLE, "relevant"],
        vec![],
        vec![],
        vec![],
        vec![],
        vec!["relevant"],
    ];
    assert_eq!(labels, expected);
    assert_eq!(lm.calls(), 6);
}

#[test]
fn test_relevance_openinference_columns() {
    let ds = dataset(vec![json!({
        "attributes.input.value": "What is the capital of France?",
        "attributes.retrieval.documents": [
            {"document.id": "1", "document.content": "Paris is the capital of France."},
            {"document.id": "2", "document.content": "Berlin is in Germany."},
        ],
    })]);
    let lm = Arc::new(ScriptedLM::new("relevant").on("Berlin", "irrelevant"));

    let labels =
        run_relevance_eval(&executor(false), &ds, lm.clone(), &RelevanceOptions::new()).unwrap();

    assert_eq!(labels, vec![vec!["relevant", "irrelevant"]]);
    let prompts = lm.prompts();
    assert!(prompts
        .iter()
        .any(|p| p.contains("Paris is the capital of France.")));
    assert!(prompts.iter().all(|p| !p.contains("document.id")));
}

#[test]
fn test_relevance_failure_is_not_parsable() {
    let ds = dataset(vec![json!({"input": "q0", "reference": ["doc-a", "doc-b"]})]);
    let exec = executor(false);
    let lm = Arc::new(
        ScriptedLM::new("relevant").on("doc-b", Reply::Fail(ClientError::Authentication("bad key".into()))),
    );

    let labels = run_relevance_eval(&exec, &ds, lm, &RelevanceOptions::new()).unwrap();

    assert_eq!(labels, vec![vec!["relevant", NOT_PARSABLE]]);
    assert!(exec
        .printer()
        .output()
        .contains("Exception in worker on row 0 item 1: Authentication error: bad key"));
}

#[test]
fn test_transient_failures_are_retried() {
    let ds = dataset(vec![json!({"input": "q0"}), json!({"input": "q1"})]);
    let exec = executor(false);
    let lm = Arc::new(
        ScriptedLM::new("relevant").fail_first_on("q1", 4, ClientError::internal_server("busy")),
    );
    let template = PromptTemplate::parse("{input}").unwrap();

    let table = llm_classify(
        &exec,
        &ds,
        lm.clone(),
        &template,
        &relevance_rails(),
        &ClassifyOptions::new(),
    )
    .unwrap();

    assert_eq!(table.labels(), vec!["relevant", "relevant"]);
    assert_eq!(lm.calls(), 6);
    let lines = exec.printer().lines();
    let retries: Vec<&String> = lines
        .iter()
        .filter(|l| l.starts_with("Failed attempt"))
        .collect();
    assert_eq!(retries.len(), 4);
    assert_eq!(
        retries[0],
        "Failed attempt 1: Internal server error (500): busy"
    );
}

#[test]
fn test_repeated_runs_agree() {
    let ds = dataset(
        (0..25)
            .map(|i| json!({"input": format!("row-{:02}", i)}))
            .collect(),
    );
    let lm = Arc::new(
        ScriptedLM::new("relevant")
            .on("row-03", "irrelevant")
            .on("row-17", "???")
            .with_latency(std::time::Duration::from_millis(1)),
    );
    let template = PromptTemplate::parse("{input}").unwrap();
    let exec = executor(false);

    let first = llm_classify(
        &exec,
        &ds,
        lm.clone(),
        &template,
        &relevance_rails(),
        &ClassifyOptions::new(),
    )
    .unwrap();
    let second = llm_classify(
        &exec,
        &ds,
        lm.clone(),
        &template,
        &relevance_rails(),
        &ClassifyOptions::new(),
    )
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.labels()[3], "irrelevant");
    assert_eq!(first.labels()[17], NOT_PARSABLE);
    assert!(lm.peak_concurrency() <= 4);
}

#[test]
fn test_verbose_output() {
    let exec = executor(true);
    let ds = dataset(vec![json!({"input": "q0"}), json!({"input": "q1"})]);
    let lm = Arc::new(ScriptedLM::new("maybe").on("q0", "relevant"));
    let template = PromptTemplate::parse("{input}").unwrap();

    llm_classify(
        &exec,
        &ds,
        lm,
        &template,
        &relevance_rails(),
        &ClassifyOptions::new(),
    )
    .unwrap();

    let out = exec.printer().output();
    assert!(out.contains("Scripted invocation parameters: "));
    assert!(out.contains("Snapped 'relevant' to rail: relevant"));
    assert!(out.contains("Cannot snap 'maybe' to rails"));
}

mod openai {
    use super::*;
    use jury_client::{LMClient, LMConfig, OpenAIProvider};
    use mockito::{Matcher, Server};

    fn completion(content: &str) -> String {
        json!({
            "model": "gpt-4",
            "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
        })
        .to_string()
    }

    #[test]
    fn test_server_errors_fail_only_their_row() {
        let mut server = Server::new();
        let good = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::Regex("row-good".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion("relevant"))
            .expect(2)
            .create();
        let bad = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::Regex("row-bad".into()))
            .with_status(500)
            .with_body("overloaded")
            .expect(3)
            .create();

        let provider = OpenAIProvider::new("sk-test")
            .unwrap()
            .with_base_url(server.url());
        let model: Arc<dyn LM> = Arc::new(LMClient::new(LMConfig::new("gpt-4"), Box::new(provider)));
        let exec = Executor::new(
            ExecutorConfig::new()
                .max_concurrency(2)
                .retry_policy(RetryPolicy::new(3)),
        )
        .unwrap()
        .with_printer(Arc::new(Printer::buffered(false, true)))
        .with_wait(Arc::new(jury::NoWait));

        let ds = dataset(vec![
            json!({"input": "row-good-1"}),
            json!({"input": "row-bad"}),
            json!({"input": "row-good-2"}),
        ]);
        let template = PromptTemplate::parse("{input}").unwrap();

        let table = llm_classify(
            &exec,
            &ds,
            model,
            &template,
            &relevance_rails(),
            &ClassifyOptions::new().use_function_calling_if_available(false),
        )
        .unwrap();

        assert_eq!(table.labels(), vec!["relevant", NOT_PARSABLE, "relevant"]);
        good.assert();
        bad.assert();

        let out = exec.printer().output();
        assert!(out.contains("Failed attempt 1: Internal server error (500): overloaded"));
        assert!(out.contains("Failed attempt 2: Internal server error (500): overloaded"));
        assert!(!out.contains("Failed attempt 3"));
        assert!(out.contains(
            "Exception in worker on row 1 item 0: Internal server error (500): overloaded"
        ));
    }
}
