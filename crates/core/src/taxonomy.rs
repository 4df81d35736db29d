//! Master label catalog (taxonomy).
//!
//! The catalog only feeds label pickers. Reconciliation never consults it,
//! so a label absent from the taxonomy is still a valid annotation label.

use serde::{Deserialize, Serialize};

/// Default suggestion count for autocomplete.
pub const DEFAULT_SUGGEST_LIMIT: usize = 10;

/// A known label with its classification metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterLabel {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Catalog of master labels, in the order the provider returned them.
///
/// Serialized as a plain array. Deserializing goes through
/// [`Taxonomy::new`], so duplicate names are dropped either way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<MasterLabel>", into = "Vec<MasterLabel>")]
pub struct Taxonomy {
    labels: Vec<MasterLabel>,
}

impl From<Vec<MasterLabel>> for Taxonomy {
    fn from(labels: Vec<MasterLabel>) -> Self {
        Self::new(labels)
    }
}

impl From<Taxonomy> for Vec<MasterLabel> {
    fn from(taxonomy: Taxonomy) -> Self {
        taxonomy.labels
    }
}

impl Taxonomy {
    /// Build a catalog, keeping the first entry for each name.
    pub fn new(labels: Vec<MasterLabel>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let labels = labels
            .into_iter()
            .filter(|l| seen.insert(l.name.clone()))
            .collect();
        Self { labels }
    }

    pub fn labels(&self) -> &[MasterLabel] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MasterLabel> {
        self.labels.iter().find(|l| l.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for label in &self.labels {
            if !out.contains(&label.category.as_str()) {
                out.push(&label.category);
            }
        }
        out
    }

    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a MasterLabel> {
        self.labels.iter().filter(move |l| l.category == category)
    }

    pub fn mandatory(&self) -> impl Iterator<Item = &MasterLabel> {
        self.labels.iter().filter(|l| l.mandatory)
    }

    /// Mandatory labels not present in `labels`.
    pub fn missing_mandatory<'a>(&'a self, labels: &[String]) -> Vec<&'a str> {
        self.mandatory()
            .filter(|m| !labels.iter().any(|l| *l == m.name))
            .map(|m| m.name.as_str())
            .collect()
    }

    /// Case-insensitive prefix match on label names, catalog order.
    pub fn suggest(&self, prefix: &str, limit: Option<usize>) -> Vec<&MasterLabel> {
        let prefix = prefix.trim().to_lowercase();
        let limit = limit.unwrap_or(DEFAULT_SUGGEST_LIMIT);
        self.labels
            .iter()
            .filter(|l| l.name.to_lowercase().starts_with(&prefix))
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> Taxonomy {
        serde_json::from_value(json!([
            {"name": "bias-risk", "category": "quality", "mandatory": true, "type": "flag"},
            {"name": "demographic", "category": "topic"},
            {"name": "double-barreled", "category": "quality"},
            {"name": "Brand", "category": "topic", "mandatory": true}
        ]))
        .unwrap()
    }

    #[test]
    fn deserializes_wire_format() {
        let tax = catalog();
        assert_eq!(tax.len(), 4);
        let bias = tax.get("bias-risk").unwrap();
        assert!(bias.mandatory);
        assert_eq!(bias.label_type.as_deref(), Some("flag"));
    }

    #[test]
    fn categories_in_first_seen_order() {
        assert_eq!(catalog().categories(), vec!["quality", "topic"]);
    }

    #[test]
    fn by_category_filters() {
        let tax = catalog();
        let names: Vec<&str> = tax.by_category("topic").map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["demographic", "Brand"]);
    }

    #[test]
    fn missing_mandatory_reports_unset_labels() {
        let tax = catalog();
        let missing = tax.missing_mandatory(&["bias-risk".to_string()]);
        assert_eq!(missing, vec!["Brand"]);
    }

    #[test]
    fn suggest_is_case_insensitive_and_limited() {
        let tax = catalog();
        let hits: Vec<&str> = tax.suggest("B", None).iter().map(|l| l.name.as_str()).collect();
        assert_eq!(hits, vec!["bias-risk", "Brand"]);
        assert_eq!(tax.suggest("d", Some(1)).len(), 1);
        assert!(tax.suggest("zzz", None).is_empty());
    }

    #[test]
    fn new_drops_duplicate_names() {
        let label = MasterLabel {
            name: "x".to_string(),
            category: "c".to_string(),
            mandatory: false,
            label_type: None,
            description: None,
        };
        let tax = Taxonomy::new(vec![label.clone(), label]);
        assert_eq!(tax.len(), 1);
    }

    #[test]
    fn deserialize_drops_duplicate_names_like_new() {
        let tax: Taxonomy = serde_json::from_value(json!([
            {"name": "bias-risk", "category": "quality"},
            {"name": "bias-risk", "category": "duplicate"},
            {"name": "age", "category": "topic"}
        ]))
        .unwrap();
        assert_eq!(tax.len(), 2);
        assert_eq!(tax.get("bias-risk").unwrap().category, "quality");

        let value = serde_json::to_value(&tax).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }
}
