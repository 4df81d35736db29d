//! Editing session for one annotation subject.

use std::sync::Arc;

use surveyqa_core::annotation::{validate_confidence, Annotation, SubjectType};
use surveyqa_core::error::CoreError;
use surveyqa_core::labels::{self, LabelPolicy, LabelPolicyKind};
use surveyqa_core::question::Question;
use surveyqa_core::rating::{Likert, Pillar};

use crate::error::{SessionError, SessionResult};
use crate::save_queue::SaveQueue;

/// One annotation being edited against its question.
///
/// The annotation is created on the first edit. Every mutating call bumps
/// the record's `version`, restamps its timestamp and schedules a save of
/// the full record on the [`SaveQueue`]. Local state is never rolled back
/// when a save fails.
pub struct AnnotationSession {
    question: Question,
    subject_type: SubjectType,
    annotation: Option<Annotation>,
    /// Version a record created by this session counts on from.
    base_version: u64,
    policy: Arc<dyn LabelPolicy>,
    queue: SaveQueue,
}

impl std::fmt::Debug for AnnotationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationSession")
            .field("question", &self.question)
            .field("subject_type", &self.subject_type)
            .field("annotation", &self.annotation)
            .field("base_version", &self.base_version)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl AnnotationSession {
    /// Start a session for `question`, optionally resuming a saved
    /// annotation for the same subject.
    ///
    /// Versions continue from the newest record the queue has seen for the
    /// subject, so edits from a reopened session are never taken as stale.
    pub fn new(
        question: Question,
        mut annotation: Option<Annotation>,
        policy: Arc<dyn LabelPolicy>,
        queue: SaveQueue,
    ) -> SessionResult<Self> {
        if let Some(existing) = &annotation {
            ensure_same_subject(&question.id, &existing.subject_id)?;
        }
        let base_version = queue.latest_version(&question.id).unwrap_or(0);
        if let Some(existing) = annotation.as_mut() {
            existing.version = existing.version.max(base_version);
        }
        let subject_type = annotation
            .as_ref()
            .map(|a| a.subject_type)
            .unwrap_or_default();

        Ok(Self {
            question,
            subject_type,
            annotation,
            base_version,
            policy,
            queue,
        })
    }

    /// Annotate a section or survey instead of a question.
    ///
    /// Only affects a record that has not been created yet.
    pub fn with_subject_type(mut self, subject_type: SubjectType) -> Self {
        if self.annotation.is_none() {
            self.subject_type = subject_type;
        }
        self
    }

    pub fn subject_id(&self) -> &str {
        &self.question.id
    }

    pub fn subject_type(&self) -> SubjectType {
        self.subject_type
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn annotation(&self) -> Option<&Annotation> {
        self.annotation.as_ref()
    }

    pub fn policy_kind(&self) -> LabelPolicyKind {
        self.policy.kind()
    }

    pub fn needs_verification(&self) -> bool {
        self.annotation
            .as_ref()
            .is_some_and(Annotation::needs_verification)
    }

    /// Labels to display, as decided by the session's policy.
    pub fn effective_labels(&self) -> Vec<String> {
        self.policy
            .effective_labels(&self.question.labels, self.annotation.as_ref())
    }

    // -----------------------------------------------------------------------
    // Labels
    // -----------------------------------------------------------------------

    /// Replace the displayed label set with `new_labels`.
    ///
    /// Labels that were displayed but are no longer chosen are recorded as
    /// removed; chosen labels are cleared from the removed set.
    pub fn set_labels(&mut self, new_labels: &[String]) -> &Annotation {
        let previous = self.effective_labels();
        self.edit(|annotation| {
            *annotation = labels::apply_label_edit(annotation, &previous, new_labels);
        })
    }

    pub fn add_label(&mut self, label: &str) -> SessionResult<&Annotation> {
        let next = labels::add_label(&self.effective_labels(), label)?;
        Ok(self.set_labels(&next))
    }

    pub fn remove_label(&mut self, label: &str) -> &Annotation {
        let next = labels::remove_label(&self.effective_labels(), label);
        self.set_labels(&next)
    }

    // -----------------------------------------------------------------------
    // Ratings and commentary
    // -----------------------------------------------------------------------

    pub fn set_quality(&mut self, score: Likert) -> &Annotation {
        self.edit(|annotation| annotation.quality = score)
    }

    pub fn set_relevant(&mut self, score: Likert) -> &Annotation {
        self.edit(|annotation| annotation.relevant = score)
    }

    pub fn set_pillar(&mut self, pillar: Pillar, score: Likert) -> &Annotation {
        self.edit(|annotation| annotation.pillars.set(pillar, score))
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) -> &Annotation {
        let comment = comment.into();
        self.edit(|annotation| annotation.comment = comment)
    }

    // -----------------------------------------------------------------------
    // Provenance
    // -----------------------------------------------------------------------

    /// Mark the record as machine-generated with the given confidence.
    pub fn set_ai_provenance(&mut self, confidence: f64) -> SessionResult<&Annotation> {
        validate_confidence(confidence)?;
        Ok(self.edit(|annotation| {
            annotation.ai_generated = Some(true);
            annotation.ai_confidence = Some(confidence);
        }))
    }

    /// Record locally that a human confirmed the annotation.
    pub fn mark_human_verified(&mut self) -> &Annotation {
        self.edit(|annotation| annotation.human_verified = Some(true))
    }

    /// Ask the backend to verify the persisted record.
    ///
    /// Uses the server-assigned id of the annotation, falling back to the
    /// id returned by the last successful save. On success the record is
    /// marked human-verified locally. Returns the backend's success flag.
    pub async fn verify(&mut self) -> SessionResult<bool> {
        let local_id = self.annotation.as_ref().and_then(|a| a.id.clone());
        let annotation_id = match local_id {
            Some(id) => id,
            None => self
                .queue
                .last_saved(&self.question.id)
                .await
                .and_then(|saved| saved.id)
                .ok_or_else(|| SessionError::NotPersisted(self.question.id.clone()))?,
        };

        let verified = self
            .queue
            .store()
            .verify_annotation(self.queue.survey_id(), &annotation_id, self.subject_type)
            .await?;

        if verified {
            tracing::info!(
                subject_id = %self.question.id,
                annotation_id = %annotation_id,
                "Annotation verified"
            );
            self.edit(|annotation| {
                annotation.id.get_or_insert(annotation_id);
                annotation.human_verified = Some(true);
            });
        } else {
            tracing::warn!(
                subject_id = %self.question.id,
                annotation_id = %annotation_id,
                "Backend rejected verification"
            );
        }
        Ok(verified)
    }

    /// Swap in a regenerated version of the question.
    ///
    /// The annotation is untouched, so labels the user removed stay
    /// removed even if the new question suggests them again.
    pub fn replace_question(&mut self, question: Question) -> SessionResult<()> {
        ensure_same_subject(&self.question.id, &question.id)?;
        tracing::debug!(subject_id = %question.id, "Question replaced");
        self.question = question;
        Ok(())
    }

    /// Apply `change` to the annotation (creating it if needed), bump its
    /// version and schedule a save.
    ///
    /// A created record starts from the policy's initial labels so the
    /// displayed set does not change under it.
    fn edit<F>(&mut self, change: F) -> &Annotation
    where
        F: FnOnce(&mut Annotation),
    {
        let question = &self.question;
        let policy = &self.policy;
        let subject_type = self.subject_type;
        let base_version = self.base_version;
        let annotation = self.annotation.get_or_insert_with(|| {
            let mut created = Annotation::new(question.id.clone(), subject_type);
            created.labels = policy.initial_labels(&question.labels);
            created.version = base_version;
            created
        });

        change(annotation);
        annotation.touch();
        self.queue.schedule(annotation.clone());
        annotation
    }
}

fn ensure_same_subject(expected: &str, actual: &str) -> Result<(), CoreError> {
    if expected != actual {
        return Err(CoreError::Validation(format!(
            "Subject mismatch: expected '{expected}', got '{actual}'"
        )));
    }
    Ok(())
}
