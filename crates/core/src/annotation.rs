//! Annotation record for a question, section or survey.
//!
//! One record exists per subject and annotator. It is created implicitly on
//! the first save, mutated on every edit and never deleted from here.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::labels::{deserialize_label_set, deserialize_labels};
use crate::rating::{Likert, Pillars};
use crate::types::{SubjectId, Timestamp};

// ---------------------------------------------------------------------------
// Subject types
// ---------------------------------------------------------------------------

/// Kind of survey content an annotation is attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    #[default]
    Question,
    Section,
    Survey,
}

/// All valid subject type strings.
const VALID_SUBJECT_TYPES: &[&str] = &["question", "section", "survey"];

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Section => "section",
            Self::Survey => "survey",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "question" => Ok(Self::Question),
            "section" => Ok(Self::Section),
            "survey" => Ok(Self::Survey),
            _ => Err(CoreError::Validation(format!(
                "Invalid subject type '{s}'. Must be one of: {}",
                VALID_SUBJECT_TYPES.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// A user-entered record of ratings, labels and commentary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Server-assigned id, present once the record has been persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub subject_id: SubjectId,
    #[serde(default)]
    pub subject_type: SubjectType,
    /// Effective label set as last saved.
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub labels: Vec<String>,
    /// Labels the user explicitly took away.
    #[serde(default, deserialize_with = "deserialize_label_set")]
    pub removed_labels: IndexSet<String>,
    #[serde(default)]
    pub quality: Likert,
    #[serde(default)]
    pub relevant: Likert,
    #[serde(default)]
    pub pillars: Pillars,
    #[serde(default)]
    pub comment: String,
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_generated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_verified: Option<bool>,
    /// Monotonic edit counter; a save carrying a lower version than one
    /// already persisted is stale.
    #[serde(default)]
    pub version: u64,
}

impl Annotation {
    /// Empty annotation with neutral scores, stamped now.
    pub fn new(subject_id: impl Into<SubjectId>, subject_type: SubjectType) -> Self {
        Self {
            id: None,
            subject_id: subject_id.into(),
            subject_type,
            labels: Vec::new(),
            removed_labels: IndexSet::new(),
            quality: Likert::default(),
            relevant: Likert::default(),
            pillars: Pillars::default(),
            comment: String::new(),
            timestamp: chrono::Utc::now(),
            ai_generated: None,
            ai_confidence: None,
            human_verified: None,
            version: 0,
        }
    }

    /// Bump the version and restamp the timestamp. Called on every edit.
    pub fn touch(&mut self) {
        self.version += 1;
        self.timestamp = chrono::Utc::now();
    }

    /// Record AI provenance for a machine-generated annotation.
    pub fn set_ai_provenance(&mut self, confidence: f64) -> Result<(), CoreError> {
        validate_confidence(confidence)?;
        self.ai_generated = Some(true);
        self.ai_confidence = Some(confidence);
        Ok(())
    }

    /// True when the annotation came from the generation pipeline and no
    /// human has confirmed it yet.
    pub fn needs_verification(&self) -> bool {
        self.ai_generated == Some(true) && self.human_verified != Some(true)
    }

    /// Check fields that serde cannot constrain on its own.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.subject_id.trim().is_empty() {
            return Err(CoreError::Validation(
                "subjectId must not be empty".to_string(),
            ));
        }
        if let Some(confidence) = self.ai_confidence {
            validate_confidence(confidence)?;
        }
        Ok(())
    }
}

/// Validate that an AI confidence score is a finite number in `[0, 1]`.
pub fn validate_confidence(confidence: f64) -> Result<(), CoreError> {
    if !confidence.is_finite() {
        return Err(CoreError::Validation(
            "aiConfidence must be a finite number".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&confidence) {
        return Err(CoreError::Validation(format!(
            "aiConfidence must be between 0 and 1, got {confidence}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
