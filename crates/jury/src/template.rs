// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Prompt templates with named placeholders.
//!
//! Placeholders are written `{name}`; `{{` and `}}` produce literal braces.
//!
//! ```rust
//! use jury::template::PromptTemplate;
//! use serde_json::json;
//!
//! let template = PromptTemplate::parse("Q: {input}\nDoc: {reference}").unwrap();
//! let bindings = json!({"input": "What is Rust?", "reference": "A language."});
//! let prompt = template.render(bindings.as_object().unwrap()).unwrap();
//! assert_eq!(prompt, "Q: What is Rust?\nDoc: A language.");
//! ```

use crate::dataset::Record;
use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
    segments: Vec<Segment>,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Parse a template string
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let mut segments = Vec::new();
        let mut variables: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(Error::template(format!(
                            "unclosed placeholder at byte {}",
                            pos
                        )));
                    }
                    let name = name.trim().to_string();
                    if !is_identifier(&name) {
                        return Err(Error::template(format!(
                            "invalid placeholder name '{}'",
                            name
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    if !variables.contains(&name) {
                        variables.push(name.clone());
                    }
                    segments.push(Segment::Variable(name));
                }
                '}' => {
                    return Err(Error::template(format!(
                        "unmatched '}}' at byte {}",
                        pos
                    )));
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            text,
            segments,
            variables,
        })
    }

    /// Original template text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder names in order of first appearance
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Fill every placeholder from `bindings`.
    ///
    /// Fails when a placeholder is unbound or bound to null.
    pub fn render(&self, bindings: &Record) -> Result<String> {
        let mut out = String::with_capacity(self.text.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => match bindings.get(name) {
                    None | Some(Value::Null) => {
                        return Err(Error::template(format!(
                            "missing value for template variable '{}'",
                            name
                        )))
                    }
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                },
            }
        }
        Ok(out)
    }

    /// Bindings for a scalar row: every template variable looked up through `map`.
    ///
    /// Unresolvable variables are left out, so rendering reports them.
    pub fn bind(&self, record: &Record, map: &VariableMap) -> Record {
        self.variables
            .iter()
            .filter_map(|var| map.resolve(var, record).map(|v| (var.clone(), v)))
            .collect()
    }

    /// One binding set per element of the list-valued `list_variable`,
    /// all other variables held constant.
    ///
    /// A missing or null scalar variable, or a missing, null or empty list,
    /// yields no binding sets. A non-list value counts as a single element.
    pub fn expand(&self, record: &Record, list_variable: &str, map: &VariableMap) -> Vec<Record> {
        let mut constant = Record::new();
        for var in self.variables.iter().filter(|v| *v != list_variable) {
            match map.resolve(var, record) {
                Some(Value::Null) | None => return Vec::new(),
                Some(value) => {
                    constant.insert(var.clone(), value);
                }
            }
        }

        let items = match map.column_value(list_variable, record) {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(scalar) => vec![scalar.clone()],
        };

        items
            .into_iter()
            .map(|item| {
                let mut bindings = constant.clone();
                bindings.insert(list_variable.to_string(), map.project(list_variable, item));
                bindings
            })
            .collect()
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl std::str::FromStr for PromptTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Mapping {
    variable: String,
    column: String,
    key: Option<String>,
}

/// Renames template variables to dataset columns.
///
/// Unmapped variables read the column of the same name. Column names and
/// projection keys are literal, dots included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableMap {
    mappings: Vec<Mapping>,
}

impl VariableMap {
    /// Identity mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `variable` from `column`
    pub fn map(mut self, variable: impl Into<String>, column: impl Into<String>) -> Self {
        let variable = variable.into();
        let column = column.into();
        match self.mappings.iter_mut().find(|m| m.variable == variable) {
            Some(m) => m.column = column,
            None => self.mappings.push(Mapping {
                variable,
                column,
                key: None,
            }),
        }
        self
    }

    /// Read `variable` from `column`, taking `key` out of object values
    pub fn map_key(
        mut self,
        variable: impl Into<String>,
        column: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        let variable = variable.into();
        self = self.map(variable.clone(), column);
        if let Some(m) = self.mappings.iter_mut().find(|m| m.variable == variable) {
            m.key = Some(key.into());
        }
        self
    }

    /// Column a variable is read from
    pub fn column<'a>(&'a self, variable: &'a str) -> &'a str {
        self.mapping(variable)
            .map_or(variable, |m| m.column.as_str())
    }

    fn mapping(&self, variable: &str) -> Option<&Mapping> {
        self.mappings.iter().find(|m| m.variable == variable)
    }

    fn column_value<'r>(&self, variable: &str, record: &'r Record) -> Option<&'r Value> {
        record.get(self.column(variable))
    }

    /// Resolve a variable against a record, applying the projection
    pub fn resolve(&self, variable: &str, record: &Record) -> Option<Value> {
        self.column_value(variable, record)
            .map(|value| self.project(variable, value.clone()))
    }

    fn project(&self, variable: &str, value: Value) -> Value {
        match (self.mapping(variable).and_then(|m| m.key.as_deref()), value) {
            (Some(key), Value::Object(mut obj)) => obj.remove(key).unwrap_or(Value::Null),
            (_, value) => value,
        }
    }
}
