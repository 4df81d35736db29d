//! Survey question as supplied by the upstream generation pipeline.
//!
//! Questions are read-only to this crate. Their `labels` are the
//! system-suggested tags that label reconciliation starts from.

use serde::{Deserialize, Serialize};

use crate::labels::{deserialize_labels, normalize_labels};
use crate::types::SubjectId;

/// A question with its system-provided labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: SubjectId,
    #[serde(default)]
    pub text: String,
    /// System/AI-suggested tags. Malformed payloads are coerced to empty.
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Question {
    pub fn new<S: AsRef<str>>(
        id: impl Into<SubjectId>,
        text: impl Into<String>,
        labels: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            labels: normalize_labels(labels),
            options: Vec::new(),
        }
    }

    pub fn with_options<S: Into<String>>(mut self, options: impl IntoIterator<Item = S>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the upstream pipeline suggested `label` for this question.
    pub fn has_label(&self, label: &str) -> bool {
        let label = label.trim();
        self.labels.iter().any(|l| l == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_well_formed_question() {
        let q: Question = serde_json::from_value(json!({
            "id": "Q1",
            "text": "How old are you?",
            "labels": ["demographic", "age"],
            "options": ["18-24", "25-34"]
        }))
        .unwrap();
        assert_eq!(q.id, "Q1");
        assert_eq!(q.labels, vec!["demographic", "age"]);
        assert_eq!(q.options.len(), 2);
    }

    #[test]
    fn missing_labels_default_to_empty() {
        let q: Question = serde_json::from_value(json!({"id": "Q2", "text": "?"})).unwrap();
        assert!(q.labels.is_empty());
    }

    #[test]
    fn non_array_labels_coerced_to_empty() {
        let q: Question =
            serde_json::from_value(json!({"id": "Q3", "labels": "bias-risk"})).unwrap();
        assert!(q.labels.is_empty());

        let q: Question = serde_json::from_value(json!({"id": "Q3", "labels": null})).unwrap();
        assert!(q.labels.is_empty());
    }

    #[test]
    fn non_string_label_entries_skipped() {
        let q: Question = serde_json::from_value(json!({
            "id": "Q4",
            "labels": ["a", 7, null, " b ", "", "a"]
        }))
        .unwrap();
        assert_eq!(q.labels, vec!["a", "b"]);
    }

    #[test]
    fn has_label_ignores_surrounding_whitespace() {
        let q = Question::new("Q5", "text", ["bias-risk"]);
        assert!(q.has_label(" bias-risk "));
        assert!(!q.has_label("demographic"));
    }
}
