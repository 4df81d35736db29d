//! Likert rating scale and the five-pillar quality rubric.
//!
//! Every score on an annotation (`quality`, `relevant` and each pillar) is
//! an integer on the 1-5 Likert scale and defaults to the neutral midpoint.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lowest value on the Likert scale.
pub const LIKERT_MIN: u8 = 1;

/// Highest value on the Likert scale.
pub const LIKERT_MAX: u8 = 5;

/// Neutral midpoint used for unrated scores.
pub const LIKERT_DEFAULT: u8 = 3;

// ---------------------------------------------------------------------------
// Likert
// ---------------------------------------------------------------------------

/// A validated score on the 1-5 Likert scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Likert(u8);

impl Likert {
    /// Build a score, rejecting anything outside 1-5.
    pub fn new(value: i64) -> Result<Self, CoreError> {
        if value < i64::from(LIKERT_MIN) || value > i64::from(LIKERT_MAX) {
            return Err(CoreError::Validation(format!(
                "Likert score must be between {LIKERT_MIN} and {LIKERT_MAX}, got {value}"
            )));
        }
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Likert {
    fn default() -> Self {
        Self(LIKERT_DEFAULT)
    }
}

impl TryFrom<i64> for Likert {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Likert> for u8 {
    fn from(score: Likert) -> Self {
        score.0
    }
}

// ---------------------------------------------------------------------------
// Pillars
// ---------------------------------------------------------------------------

/// One dimension of the five-pillar rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pillar {
    MethodologicalRigor,
    ContentValidity,
    RespondentExperience,
    AnalyticalValue,
    BusinessImpact,
}

/// All pillars in rubric order.
pub const ALL_PILLARS: [Pillar; 5] = [
    Pillar::MethodologicalRigor,
    Pillar::ContentValidity,
    Pillar::RespondentExperience,
    Pillar::AnalyticalValue,
    Pillar::BusinessImpact,
];

impl Pillar {
    /// Return the wire key for this pillar.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MethodologicalRigor => "methodologicalRigor",
            Self::ContentValidity => "contentValidity",
            Self::RespondentExperience => "respondentExperience",
            Self::AnalyticalValue => "analyticalValue",
            Self::BusinessImpact => "businessImpact",
        }
    }

    /// Parse a pillar from its wire key.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        ALL_PILLARS
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = ALL_PILLARS.iter().map(Pillar::as_str).collect();
                CoreError::Validation(format!(
                    "Invalid pillar '{s}'. Must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

/// Scores for the fixed five-pillar rubric. Missing keys default to 3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pillars {
    pub methodological_rigor: Likert,
    pub content_validity: Likert,
    pub respondent_experience: Likert,
    pub analytical_value: Likert,
    pub business_impact: Likert,
}

impl Pillars {
    pub fn get(&self, pillar: Pillar) -> Likert {
        match pillar {
            Pillar::MethodologicalRigor => self.methodological_rigor,
            Pillar::ContentValidity => self.content_validity,
            Pillar::RespondentExperience => self.respondent_experience,
            Pillar::AnalyticalValue => self.analytical_value,
            Pillar::BusinessImpact => self.business_impact,
        }
    }

    pub fn set(&mut self, pillar: Pillar, score: Likert) {
        let slot = match pillar {
            Pillar::MethodologicalRigor => &mut self.methodological_rigor,
            Pillar::ContentValidity => &mut self.content_validity,
            Pillar::RespondentExperience => &mut self.respondent_experience,
            Pillar::AnalyticalValue => &mut self.analytical_value,
            Pillar::BusinessImpact => &mut self.business_impact,
        };
        *slot = score;
    }

    /// Mean score across all five pillars.
    pub fn average(&self) -> f64 {
        let total: u32 = ALL_PILLARS
            .iter()
            .map(|p| u32::from(self.get(*p).value()))
            .sum();
        f64::from(total) / ALL_PILLARS.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
