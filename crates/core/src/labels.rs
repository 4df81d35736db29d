//! Label reconciliation between system-suggested and user-edited labels.
//!
//! A question carries labels produced upstream; an annotation carries the
//! labels the user settled on plus the set of labels the user explicitly
//! removed. The effective set shown and persisted is
//!
//! ```text
//! (question labels ∪ annotation labels) \ removed labels
//! ```
//!
//! Removal only hides a label from this annotation. It never edits the
//! question, and it survives upstream regeneration of the question labels.
//!
//! Which side wins is a [`LabelPolicy`]: [`MergePolicy`] implements the
//! union above, [`AnnotationOnlyPolicy`] treats a saved annotation as the
//! sole source of truth.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize};

use crate::annotation::Annotation;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Normalization and lenient deserialization
// ---------------------------------------------------------------------------

/// Trim labels, drop blanks and duplicates, keep first-seen order.
pub fn normalize_labels<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set: IndexSet<String> = labels
        .into_iter()
        .map(|l| l.as_ref().trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    set.into_iter().collect()
}

/// Coerce an arbitrary JSON value into a label list.
///
/// Anything that is not an array becomes empty; non-string elements are
/// skipped.
pub fn coerce_labels(value: &serde_json::Value) -> Vec<String> {
    match value.as_array() {
        Some(items) => normalize_labels(items.iter().filter_map(|v| v.as_str())),
        None => Vec::new(),
    }
}

/// `deserialize_with` helper that never fails on a malformed label field.
pub fn deserialize_labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_labels(&value))
}

/// Same as [`deserialize_labels`] but collecting into an ordered set.
pub fn deserialize_label_set<'de, D>(deserializer: D) -> Result<IndexSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_labels(&value).into_iter().collect())
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Effective labels under the merge rule.
///
/// Question labels come first, then annotation-only labels in their saved
/// order. Labels in `removed_labels` are never returned. A missing
/// annotation yields the question labels, deduplicated.
pub fn compute_effective_labels(
    question_labels: &[String],
    annotation: Option<&Annotation>,
) -> Vec<String> {
    let annotation_labels = annotation.map(|a| a.labels.as_slice()).unwrap_or_default();
    let merged = normalize_labels(question_labels.iter().chain(annotation_labels));
    exclude_removed(merged, annotation)
}

/// Apply a user's label edit to an annotation.
///
/// Labels in `previous_effective` but missing from `new_labels` are added
/// to `removed_labels`; labels the user chose are cleared from it. The
/// returned annotation stores `new_labels` (normalized) as its labels.
/// Applying the same `new_labels` twice gives the same result as once.
pub fn apply_label_edit(
    previous: &Annotation,
    previous_effective: &[String],
    new_labels: &[String],
) -> Annotation {
    let chosen: IndexSet<String> = normalize_labels(new_labels).into_iter().collect();

    let mut removed = previous.removed_labels.clone();
    for label in normalize_labels(previous_effective) {
        if !chosen.contains(&label) {
            removed.insert(label);
        }
    }
    removed.retain(|label| !chosen.contains(label));

    let mut next = previous.clone();
    next.labels = chosen.into_iter().collect();
    next.removed_labels = removed;
    next
}

/// New label set after adding one label to the current effective set.
///
/// Adding a label that is already present leaves the set unchanged.
pub fn add_label(effective: &[String], label: &str) -> Result<Vec<String>, CoreError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(CoreError::Validation("label must not be blank".to_string()));
    }
    let mut next = normalize_labels(effective);
    if !next.iter().any(|l| l == label) {
        next.push(label.to_string());
    }
    Ok(next)
}

/// New label set after removing one label from the current effective set.
pub fn remove_label(effective: &[String], label: &str) -> Vec<String> {
    let label = label.trim();
    normalize_labels(effective.iter().filter(|l| l.trim() != label))
}

fn exclude_removed(labels: Vec<String>, annotation: Option<&Annotation>) -> Vec<String> {
    match annotation {
        Some(a) if !a.removed_labels.is_empty() => labels
            .into_iter()
            .filter(|l| !a.removed_labels.contains(l))
            .collect(),
        _ => labels,
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Strategy deciding how question labels and annotation labels combine.
pub trait LabelPolicy: fmt::Debug + Send + Sync {
    fn kind(&self) -> LabelPolicyKind;

    /// Labels to display for a question given its (possibly absent)
    /// annotation.
    fn effective_labels(
        &self,
        question_labels: &[String],
        annotation: Option<&Annotation>,
    ) -> Vec<String>;

    /// Apply an edit, deriving the previous effective set from this policy.
    fn apply_edit(
        &self,
        question_labels: &[String],
        annotation: &Annotation,
        new_labels: &[String],
    ) -> Annotation {
        let previous = self.effective_labels(question_labels, Some(annotation));
        apply_label_edit(annotation, &previous, new_labels)
    }

    /// Labels a newly created annotation starts with. Creating the record
    /// must not change what is displayed.
    fn initial_labels(&self, _question_labels: &[String]) -> Vec<String> {
        Vec::new()
    }
}

/// `(question ∪ annotation) \ removed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergePolicy;

impl LabelPolicy for MergePolicy {
    fn kind(&self) -> LabelPolicyKind {
        LabelPolicyKind::Merge
    }

    fn effective_labels(
        &self,
        question_labels: &[String],
        annotation: Option<&Annotation>,
    ) -> Vec<String> {
        compute_effective_labels(question_labels, annotation)
    }
}

/// A saved annotation's labels replace the question labels entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationOnlyPolicy;

impl LabelPolicy for AnnotationOnlyPolicy {
    fn kind(&self) -> LabelPolicyKind {
        LabelPolicyKind::AnnotationOnly
    }

    fn effective_labels(
        &self,
        question_labels: &[String],
        annotation: Option<&Annotation>,
    ) -> Vec<String> {
        match annotation {
            Some(a) => exclude_removed(normalize_labels(&a.labels), Some(a)),
            None => normalize_labels(question_labels),
        }
    }

    /// The record becomes the only source of labels, so it starts from the
    /// question's.
    fn initial_labels(&self, question_labels: &[String]) -> Vec<String> {
        normalize_labels(question_labels)
    }
}

/// Named policy selector, parsed from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelPolicyKind {
    #[default]
    Merge,
    AnnotationOnly,
}

impl LabelPolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::AnnotationOnly => "annotation-only",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "annotation-only" | "annotation_only" => Ok(Self::AnnotationOnly),
            other => Err(CoreError::Validation(format!(
                "Invalid label policy '{other}'. Must be one of: merge, annotation-only"
            ))),
        }
    }

    /// Instantiate the policy this selector names.
    pub fn policy(self) -> Box<dyn LabelPolicy> {
        match self {
            Self::Merge => Box::new(MergePolicy),
            Self::AnnotationOnly => Box::new(AnnotationOnlyPolicy),
        }
    }
}

impl fmt::Display for LabelPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::SubjectType;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn annotation(saved: &[&str], removed: &[&str]) -> Annotation {
        let mut ann = Annotation::new("Q1", SubjectType::Question);
        ann.labels = labels(saved);
        ann.removed_labels = removed.iter().map(|s| s.to_string()).collect();
        ann
    }

    fn removed(ann: &Annotation) -> Vec<&str> {
        ann.removed_labels.iter().map(String::as_str).collect()
    }

    // -- normalize / coerce -------------------------------------------------

    #[test]
    fn normalize_trims_and_dedupes_in_order() {
        let out = normalize_labels(["b", " a ", "", "b", "c"]);
        assert_eq!(out, labels(&["b", "a", "c"]));
    }

    #[test]
    fn coerce_non_array_to_empty() {
        assert!(coerce_labels(&json!("x")).is_empty());
        assert!(coerce_labels(&json!(42)).is_empty());
        assert!(coerce_labels(&json!(null)).is_empty());
        assert!(coerce_labels(&json!({"labels": ["x"]})).is_empty());
    }

    #[test]
    fn coerce_skips_non_strings() {
        assert_eq!(coerce_labels(&json!(["x", 1, true, "y"])), labels(&["x", "y"]));
    }

    // -- compute_effective_labels --------------------------------------------

    #[test]
    fn scenario_no_annotation_returns_question_labels() {
        let q = labels(&["bias-risk", "demographic"]);
        assert_eq!(compute_effective_labels(&q, None), q);
    }

    #[test]
    fn no_annotation_dedupes_question_labels() {
        let q = labels(&["a", "b", "a"]);
        assert_eq!(compute_effective_labels(&q, None), labels(&["a", "b"]));
    }

    #[test]
    fn empty_inputs_yield_empty() {
        assert!(compute_effective_labels(&[], None).is_empty());
        assert!(compute_effective_labels(&[], Some(&annotation(&[], &[]))).is_empty());
    }

    #[test]
    fn question_labels_first_then_annotation_only() {
        let q = labels(&["a", "b"]);
        let ann = annotation(&["c", "b", "d"], &[]);
        assert_eq!(
            compute_effective_labels(&q, Some(&ann)),
            labels(&["a", "b", "c", "d"])
        );
    }

    #[test]
    fn never_returns_removed_label() {
        let cases: Vec<(Vec<&str>, Vec<&str>, Vec<&str>)> = vec![
            (vec!["a", "b"], vec![], vec!["a"]),
            (vec!["a"], vec!["a", "b"], vec!["b"]),
            (vec![], vec!["x"], vec!["x"]),
            (vec!["a", "b", "c"], vec!["d"], vec!["a", "b", "c", "d"]),
        ];
        for (question, saved, gone) in &cases {
            let ann = annotation(saved, gone);
            let effective = compute_effective_labels(&labels(question), Some(&ann));
            for label in gone {
                assert!(
                    !effective.iter().any(|l| l == label),
                    "{label} leaked into {effective:?}"
                );
            }
        }
    }

    // -- apply_label_edit ----------------------------------------------------

    #[test]
    fn scenario_remove_system_label() {
        let q = labels(&["bias-risk", "demographic"]);
        let ann = Annotation::new("Q1", SubjectType::Question);
        let previous = compute_effective_labels(&q, Some(&ann));

        let edited = apply_label_edit(&ann, &previous, &labels(&["demographic"]));

        assert_eq!(compute_effective_labels(&q, Some(&edited)), labels(&["demographic"]));
        assert_eq!(removed(&edited), vec!["bias-risk"]);
    }

    #[test]
    fn scenario_re_add_restores_original_set() {
        let q = labels(&["bias-risk", "demographic"]);
        let ann = Annotation::new("Q1", SubjectType::Question);
        let original = compute_effective_labels(&q, Some(&ann));

        let removed_once = apply_label_edit(&ann, &original, &labels(&["demographic"]));
        let previous = compute_effective_labels(&q, Some(&removed_once));
        let restored = apply_label_edit(
            &removed_once,
            &previous,
            &labels(&["demographic", "bias-risk"]),
        );

        assert!(restored.removed_labels.is_empty());
        assert_eq!(compute_effective_labels(&q, Some(&restored)), original);
        assert_eq!(restored.labels, labels(&["demographic", "bias-risk"]));
    }

    #[test]
    fn scenario_custom_label_is_kept_and_not_removed() {
        let q = labels(&["bias-risk", "demographic"]);
        let ann = Annotation::new("Q1", SubjectType::Question);
        let previous = compute_effective_labels(&q, Some(&ann));

        let with_custom = apply_label_edit(
            &ann,
            &previous,
            &labels(&["bias-risk", "demographic", "custom-tag"]),
        );
        let effective = compute_effective_labels(&q, Some(&with_custom));
        assert!(effective.contains(&"custom-tag".to_string()));

        // Removing a different label must not touch the custom one.
        let dropped = apply_label_edit(
            &with_custom,
            &effective,
            &labels(&["demographic", "custom-tag"]),
        );
        assert_eq!(removed(&dropped), vec!["bias-risk"]);
        assert!(compute_effective_labels(&q, Some(&dropped)).contains(&"custom-tag".to_string()));
    }

    #[test]
    fn scenario_removal_survives_upstream_regeneration() {
        let q = labels(&["bias-risk", "demographic"]);
        let ann = Annotation::new("Q1", SubjectType::Question);
        let previous = compute_effective_labels(&q, Some(&ann));
        let edited = apply_label_edit(&ann, &previous, &labels(&["demographic"]));

        let regenerated = labels(&["sensitive", "bias-risk", "demographic"]);
        let effective = compute_effective_labels(&regenerated, Some(&edited));

        assert_eq!(effective, labels(&["sensitive", "demographic"]));
    }

    #[test]
    fn apply_edit_is_idempotent() {
        let q = labels(&["a", "b", "c"]);
        let start = annotation(&["x"], &["c"]);
        let previous = compute_effective_labels(&q, Some(&start));
        let target = labels(&["b", "x", "y"]);

        let once = apply_label_edit(&start, &previous, &target);
        let twice = apply_label_edit(&once, &previous, &target);
        assert_eq!(once.removed_labels, twice.removed_labels);
        assert_eq!(once.labels, twice.labels);

        // Re-deriving the previous set from the edited record is also stable.
        let rederived = compute_effective_labels(&q, Some(&once));
        let again = apply_label_edit(&once, &rederived, &target);
        assert_eq!(once.removed_labels, again.removed_labels);
    }

    #[test]
    fn chosen_labels_never_stay_removed() {
        // Inconsistent input: "a" is both previously effective and removed.
        let start = annotation(&[], &["a"]);
        let edited = apply_label_edit(&start, &labels(&["a"]), &labels(&["a"]));
        assert!(edited.removed_labels.is_empty());
    }

    #[test]
    fn apply_edit_preserves_other_fields() {
        let mut start = annotation(&[], &[]);
        start.comment = "keep me".to_string();
        let edited = apply_label_edit(&start, &[], &labels(&["z"]));
        assert_eq!(edited.comment, "keep me");
        assert_eq!(edited.subject_id, "Q1");
    }

    // -- add / remove helpers ------------------------------------------------

    #[test]
    fn add_label_appends_once() {
        let current = labels(&["a"]);
        assert_eq!(add_label(&current, " b ").unwrap(), labels(&["a", "b"]));
        assert_eq!(add_label(&current, "a").unwrap(), labels(&["a"]));
    }

    #[test]
    fn add_blank_label_rejected() {
        assert_matches!(add_label(&[], "   "), Err(CoreError::Validation(_)));
    }

    #[test]
    fn remove_label_filters() {
        assert_eq!(remove_label(&labels(&["a", "b"]), "a"), labels(&["b"]));
        assert_eq!(remove_label(&labels(&["a"]), "missing"), labels(&["a"]));
    }

    // -- policies ------------------------------------------------------------

    #[test]
    fn merge_policy_matches_free_function() {
        let q = labels(&["a", "b"]);
        let ann = annotation(&["c"], &["a"]);
        assert_eq!(
            MergePolicy.effective_labels(&q, Some(&ann)),
            compute_effective_labels(&q, Some(&ann))
        );
    }

    #[test]
    fn annotation_only_ignores_question_once_annotated() {
        let q = labels(&["a", "b"]);
        let ann = annotation(&["c"], &[]);
        assert_eq!(AnnotationOnlyPolicy.effective_labels(&q, Some(&ann)), labels(&["c"]));
        assert_eq!(AnnotationOnlyPolicy.effective_labels(&q, None), q);
    }

    #[test]
    fn annotation_only_still_excludes_removed() {
        let ann = annotation(&["c", "d"], &["d"]);
        assert_eq!(AnnotationOnlyPolicy.effective_labels(&[], Some(&ann)), labels(&["c"]));
    }

    #[test]
    fn creating_annotation_keeps_displayed_labels() {
        let q = labels(&["bias-risk", "demographic", "bias-risk"]);
        let policies: [&dyn LabelPolicy; 2] = [&MergePolicy, &AnnotationOnlyPolicy];
        for policy in policies {
            let mut ann = Annotation::new("Q1", SubjectType::Question);
            ann.labels = policy.initial_labels(&q);
            assert_eq!(
                policy.effective_labels(&q, Some(&ann)),
                policy.effective_labels(&q, None),
                "{}",
                policy.kind()
            );
        }
        assert!(MergePolicy.initial_labels(&q).is_empty());
    }

    #[test]
    fn policy_apply_edit_derives_previous_set() {
        let q = labels(&["bias-risk", "demographic"]);
        let ann = Annotation::new("Q1", SubjectType::Question);
        let edited = MergePolicy.apply_edit(&q, &ann, &labels(&["demographic"]));
        assert_eq!(removed(&edited), vec!["bias-risk"]);
    }

    #[test]
    fn policy_kind_parsing() {
        assert_eq!(LabelPolicyKind::from_str("merge").unwrap(), LabelPolicyKind::Merge);
        assert_eq!(
            LabelPolicyKind::from_str(" Annotation-Only ").unwrap(),
            LabelPolicyKind::AnnotationOnly
        );
        assert!(LabelPolicyKind::from_str("union").is_err());
        assert_eq!(LabelPolicyKind::AnnotationOnly.to_string(), "annotation-only");
        assert_eq!(
            LabelPolicyKind::AnnotationOnly.policy().kind(),
            LabelPolicyKind::AnnotationOnly
        );
    }
}
