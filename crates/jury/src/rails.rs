// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Snapping free-text model output to a fixed label set.
//!
//! Matching is a case-insensitive substring search over the trimmed text.
//! When several distinct rails occur, the earliest match in the text wins;
//! at an equal start the longer rail wins (so `"irrelevant"` is not read
//! as `"relevant"`), and any remaining tie goes to declared order.

use crate::error::{Error, Result};
use crate::report::Printer;
use serde::{Deserialize, Serialize};

/// Label for output that could not be mapped to any rail
pub const NOT_PARSABLE: &str = "NOT_PARSABLE";

/// Ordered, non-empty set of permitted labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Rails(Vec<String>);

impl Rails {
    /// Create a rail set, rejecting empty sets and blank labels
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(Error::config("rails must not be empty"));
        }
        if labels.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::config("rails must not contain blank labels"));
        }
        Ok(Self(labels))
    }

    /// Labels in declared order
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no labels
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `label` is one of the rails, ignoring case
    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|r| r.eq_ignore_ascii_case(label))
    }

    /// Snap `raw` to one of these rails
    pub fn snap(&self, raw: &str, printer: &Printer) -> String {
        snap(raw, &self.0, printer)
    }
}

impl TryFrom<Vec<String>> for Rails {
    type Error = Error;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<Rails> for Vec<String> {
    fn from(rails: Rails) -> Self {
        rails.0
    }
}

/// Map raw model text to one of `rails`, or [`NOT_PARSABLE`].
///
/// The returned label keeps its declared casing.
pub fn snap<S: AsRef<str>>(raw: &str, rails: &[S], printer: &Printer) -> String {
    match find_rail(raw, rails) {
        Some(label) => {
            printer.verbose(format!(
                "Snapped '{}' to rail: {}",
                raw.escape_debug(),
                label
            ));
            label.to_string()
        }
        None => {
            printer.verbose(format!("Cannot snap '{}' to rails", raw.escape_debug()));
            NOT_PARSABLE.to_string()
        }
    }
}

fn find_rail<'r, S: AsRef<str>>(raw: &str, rails: &'r [S]) -> Option<&'r str> {
    let text = raw.trim().to_lowercase();

    rails
        .iter()
        .enumerate()
        .filter_map(|(order, rail)| {
            let rail = rail.as_ref();
            let needle = rail.trim().to_lowercase();
            if needle.is_empty() {
                return None;
            }
            text.find(&needle)
                .map(|pos| ((pos, std::cmp::Reverse(needle.len()), order), rail))
        })
        .min_by_key(|(key, _)| *key)
        .map(|(_, rail)| rail)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAILS: [&str; 2] = ["relevant", "irrelevant"];

    fn quiet() -> Printer {
        Printer::buffered(false, false)
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(snap("relevant", &RAILS, &quiet()), "relevant");
    }

    #[test]
    fn test_whitespace_insensitive() {
        assert_eq!(snap("\nrelevant ", &RAILS, &quiet()), "relevant");
    }

    #[test]
    fn test_unparsable() {
        assert_eq!(snap("unparsable", &RAILS, &quiet()), NOT_PARSABLE);
        assert_eq!(snap("", &RAILS, &quiet()), NOT_PARSABLE);
    }

    #[test]
    fn test_case_insensitive_keeps_declared_casing() {
        assert_eq!(snap("RELEVANT", &["Relevant", "Irrelevant"], &quiet()), "Relevant");
    }

    #[test]
    fn test_longer_rail_at_same_position_wins() {
        assert_eq!(snap("irrelevant", &RAILS, &quiet()), "irrelevant");
        assert_eq!(snap("non-toxic", &["toxic", "non-toxic"], &quiet()), "non-toxic");
    }

    #[test]
    fn test_earliest_position_wins() {
        assert_eq!(
            snap("relevant, definitely not irrelevant", &RAILS, &quiet()),
            "relevant"
        );
        assert_eq!(
            snap("The answer is incorrect, not correct", &["correct", "incorrect"], &quiet()),
            "incorrect"
        );
    }

    #[test]
    fn test_duplicate_rails_after_normalization() {
        assert_eq!(snap("yes", &["Yes", "yes"], &quiet()), "Yes");
    }

    #[test]
    fn test_verbose_lines() {
        let printer = Printer::buffered(true, false);
        snap("\nrelevant ", &RAILS, &printer);
        snap("nope", &RAILS, &printer);
        assert_eq!(
            printer.lines(),
            vec![
                "Snapped '\\nrelevant ' to rail: relevant",
                "Cannot snap 'nope' to rails",
            ]
        );
    }

    #[test]
    fn test_rails_validation() {
        assert!(Rails::new(Vec::<String>::new()).is_err());
        assert!(Rails::new(["relevant", " "]).is_err());

        let rails = Rails::new(RAILS).unwrap();
        assert_eq!(rails.len(), 2);
        assert!(rails.contains("RELEVANT"));
        assert_eq!(rails.snap("Irrelevant.", &quiet()), "irrelevant");
    }

    #[test]
    fn test_rails_deserialize_rejects_empty() {
        assert!(serde_json::from_str::<Rails>("[]").is_err());
        let rails: Rails = serde_json::from_str(r#"["toxic", "non-toxic"]"#).unwrap();
        assert_eq!(rails.labels(), &["toxic", "non-toxic"]);
    }
}
