// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Row-aligned classification results

use crate::error::Result;
use crate::evaluator::ParsedResult;
use crate::executor::Outcome;
use crate::rails::NOT_PARSABLE;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;

/// One result row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    /// A rail or `NOT_PARSABLE`
    pub label: String,
    /// Explanation, if any
    pub explanation: Option<String>,
    /// Rendered prompt, if kept
    pub prompt: Option<String>,
    /// Raw model output, if kept
    pub response: Option<String>,
}

impl ResultRow {
    /// Row for a unit that produced no result
    pub fn failed() -> Self {
        Self {
            label: NOT_PARSABLE.to_string(),
            explanation: None,
            prompt: None,
            response: None,
        }
    }
}

/// Which optional columns a table carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Columns {
    /// `explanation` column
    pub explanation: bool,
    /// `prompt` column
    pub prompt: bool,
    /// `response` column
    pub response: bool,
}

/// Result table with the same index and row order as the input dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTable {
    index: Vec<String>,
    columns: Columns,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Build a table from one outcome per row
    pub fn from_outcomes(
        index: Vec<String>,
        columns: Columns,
        outcomes: Vec<Outcome<ParsedResult>>,
    ) -> Self {
        let rows = outcomes
            .into_iter()
            .map(|outcome| match outcome {
                Outcome::Success(parsed) => ResultRow {
                    label: parsed.label,
                    explanation: parsed.explanation.filter(|_| columns.explanation),
                    prompt: columns.prompt.then_some(parsed.prompt),
                    response: columns.response.then_some(parsed.raw_response),
                },
                Outcome::Failure(_) => ResultRow::failed(),
            })
            .collect();
        Self {
            index,
            columns,
            rows,
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row labels, as in the input dataset
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Optional columns present
    pub fn columns(&self) -> Columns {
        self.columns
    }

    /// Column names in output order
    pub fn column_names(&self) -> Vec<&'static str> {
        let mut names = vec!["label"];
        if self.columns.explanation {
            names.push("explanation");
        }
        if self.columns.prompt {
            names.push("prompt");
        }
        if self.columns.response {
            names.push("response");
        }
        names
    }

    /// Rows
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// The `label` column
    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }

    /// The `explanation` column
    pub fn explanations(&self) -> Vec<Option<&str>> {
        self.rows.iter().map(|r| r.explanation.as_deref()).collect()
    }

    /// One JSON object per row, with an `index` field and present columns
    pub fn to_json_values(&self) -> Vec<Value> {
        self.index
            .iter()
            .zip(&self.rows)
            .map(|(index, row)| {
                let mut object = Map::new();
                object.insert("index".into(), Value::String(index.clone()));
                object.insert("label".into(), Value::String(row.label.clone()));
                let optional = [
                    (self.columns.explanation, "explanation", &row.explanation),
                    (self.columns.prompt, "prompt", &row.prompt),
                    (self.columns.response, "response", &row.response),
                ];
                for (present, name, value) in optional {
                    if present {
                        object.insert(
                            name.into(),
                            value.clone().map_or(Value::Null, Value::String),
                        );
                    }
                }
                Value::Object(object)
            })
            .collect()
    }

    /// Write the table as JSON lines
    pub fn write_json_lines(&self, mut writer: impl Write) -> Result<()> {
        for value in self.to_json_values() {
            serde_json::to_writer(&mut writer, &value)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    /// The table as a JSON lines string
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = Vec::new();
        self.write_json_lines(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{UnitFailure, UnitId};

    fn parsed(label: &str) -> ParsedResult {
        ParsedResult {
            label: label.into(),
            explanation: Some(format!("because {}", label)),
            raw_response: label.into(),
            prompt: "p".into(),
        }
    }

    fn failure() -> Outcome<ParsedResult> {
        Outcome::Failure(UnitFailure {
            id: UnitId::new(1, 0),
            category: "internal_server".into(),
            message: "boom".into(),
        })
    }

    #[test]
    fn test_failed_rows_are_not_parsable() {
        let table = ResultTable::from_outcomes(
            vec!["a".into(), "b".into()],
            Columns {
                explanation: true,
                ..Default::default()
            },
            vec![Outcome::Success(parsed("relevant")), failure()],
        );

        assert_eq!(table.labels(), vec!["relevant", NOT_PARSABLE]);
        assert_eq!(table.explanations(), vec![Some("because relevant"), None]);
        assert_eq!(table.column_names(), vec!["label", "explanation"]);
    }

    #[test]
    fn test_optional_columns_dropped() {
        let table = ResultTable::from_outcomes(
            vec!["0".into()],
            Columns::default(),
            vec![Outcome::Success(parsed("relevant"))],
        );
        assert_eq!(table.rows()[0].explanation, None);
        assert_eq!(table.rows()[0].prompt, None);
        assert_eq!(table.column_names(), vec!["label"]);
    }

    #[test]
    fn test_json_lines() {
        let table = ResultTable::from_outcomes(
            vec!["x".into(), "y".into()],
            Columns {
                explanation: true,
                prompt: false,
                response: true,
            },
            vec![Outcome::Success(parsed("relevant")), failure()],
        );
        let text = table.to_json_lines().unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            r#"{"index":"x","label":"relevant","explanation":"because relevant","response":"relevant"}"#
        );
        assert_eq!(
            lines[1],
            r#"{"index":"y","label":"NOT_PARSABLE","explanation":null,"response":null}"#
        );
    }
}
