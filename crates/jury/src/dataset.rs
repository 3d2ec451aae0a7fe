// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Input datasets

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::io::BufRead;
use std::path::Path;

/// One dataset row: column name to value
pub type Record = Map<String, Value>;

/// Ordered rows with a string index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    index: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Create a dataset indexed `0..n`
    pub fn from_records(records: Vec<Record>) -> Self {
        let index = (0..records.len()).map(|i| i.to_string()).collect();
        Self { index, records }
    }

    /// Replace the index; it must have one entry per row
    pub fn with_index<I, S>(mut self, index: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index: Vec<String> = index.into_iter().map(Into::into).collect();
        if index.len() != self.records.len() {
            return Err(Error::config(format!(
                "index has {} entries but the dataset has {} rows",
                index.len(),
                self.records.len()
            )));
        }
        self.index = index;
        Ok(self)
    }

    /// Parse JSON lines: one object per non-blank line
    pub fn from_json_lines(reader: impl BufRead) -> Result<Self> {
        let mut records = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line)? {
                Value::Object(record) => records.push(record),
                _ => {
                    return Err(Error::config(format!(
                        "line {} is not a JSON object",
                        number + 1
                    )))
                }
            }
        }
        Ok(Self::from_records(records))
    }

    /// Read a JSON lines file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_json_lines(std::io::BufReader::new(file))
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Row labels
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Rows
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Whether any row has `column`
    pub fn has_column(&self, column: &str) -> bool {
        self.records.iter().any(|r| r.contains_key(column))
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::from_records(iter.into_iter().collect())
    }
}
