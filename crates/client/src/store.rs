//! Persistence seam for annotation records.

use async_trait::async_trait;
use surveyqa_core::annotation::{Annotation, SubjectType};

use crate::api::ApiError;

/// Where annotation records are upserted, fetched and verified.
///
/// Upserts are idempotent per `(survey_id, subject_id)`: sending the same
/// record twice leaves the store in the same state as sending it once.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Create or replace the annotation for `annotation.subject_id`,
    /// returning the record as stored (including its server id).
    async fn upsert_annotation(
        &self,
        survey_id: &str,
        annotation: &Annotation,
    ) -> Result<Annotation, ApiError>;

    /// Fetch the annotation for a subject, `None` if none was saved yet.
    async fn fetch_annotation(
        &self,
        survey_id: &str,
        subject_id: &str,
    ) -> Result<Option<Annotation>, ApiError>;

    /// Mark an AI-generated annotation as human-verified.
    async fn verify_annotation(
        &self,
        survey_id: &str,
        annotation_id: &str,
        subject_type: SubjectType,
    ) -> Result<bool, ApiError>;
}
