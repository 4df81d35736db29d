//! Annotation store held in process memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use surveyqa_core::annotation::{Annotation, SubjectType};
use surveyqa_core::types::SubjectId;
use tokio::sync::RwLock;

use crate::api::ApiError;
use crate::store::AnnotationStore;

/// [`AnnotationStore`] backed by a map keyed by `(survey_id, subject_id)`.
///
/// Assigns ids `ann-1`, `ann-2`, ... on first upsert of a subject and keeps
/// them on later upserts, like the REST backend does.
#[derive(Debug, Default)]
pub struct InMemoryAnnotationStore {
    records: RwLock<HashMap<(String, SubjectId), Annotation>>,
    next_id: AtomicU64,
    upserts: AtomicU64,
}

impl InMemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of upsert calls received.
    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Snapshot of the stored record for a subject.
    pub async fn get(&self, survey_id: &str, subject_id: &str) -> Option<Annotation> {
        self.records
            .read()
            .await
            .get(&(survey_id.to_string(), subject_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl AnnotationStore for InMemoryAnnotationStore {
    async fn upsert_annotation(
        &self,
        survey_id: &str,
        annotation: &Annotation,
    ) -> Result<Annotation, ApiError> {
        annotation.validate()?;
        self.upserts.fetch_add(1, Ordering::SeqCst);

        let key = (survey_id.to_string(), annotation.subject_id.clone());
        let mut records = self.records.write().await;

        let mut stored = annotation.clone();
        stored.id = records
            .get(&key)
            .and_then(|existing| existing.id.clone())
            .or_else(|| annotation.id.clone())
            .or_else(|| Some(format!("ann-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)));

        records.insert(key, stored.clone());
        Ok(stored)
    }

    async fn fetch_annotation(
        &self,
        survey_id: &str,
        subject_id: &str,
    ) -> Result<Option<Annotation>, ApiError> {
        Ok(self.get(survey_id, subject_id).await)
    }

    async fn verify_annotation(
        &self,
        survey_id: &str,
        annotation_id: &str,
        subject_type: SubjectType,
    ) -> Result<bool, ApiError> {
        let mut records = self.records.write().await;
        let found = records.iter_mut().find(|((survey, _), ann)| {
            survey == survey_id
                && ann.id.as_deref() == Some(annotation_id)
                && ann.subject_type == subject_type
        });

        match found {
            Some((_, ann)) => {
                ann.human_verified = Some(true);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn upsert_assigns_stable_id() {
        let store = InMemoryAnnotationStore::new();
        let ann = Annotation::new("Q1", SubjectType::Question);

        let first = store.upsert_annotation("s1", &ann).await.unwrap();
        let second = store.upsert_annotation("s1", &ann).await.unwrap();

        assert_eq!(first.id.as_deref(), Some("ann-1"));
        assert_eq!(second.id, first.id);
        assert_eq!(store.upsert_count(), 2);
    }

    #[tokio::test]
    async fn fetch_missing_is_none() {
        let store = InMemoryAnnotationStore::new();
        assert!(store.fetch_annotation("s1", "Q1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_rejects_invalid_record() {
        let store = InMemoryAnnotationStore::new();
        let mut ann = Annotation::new("Q1", SubjectType::Question);
        ann.ai_confidence = Some(4.0);
        assert_matches!(
            store.upsert_annotation("s1", &ann).await,
            Err(ApiError::Core(_))
        );
        assert_eq!(store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn verify_marks_record() {
        let store = InMemoryAnnotationStore::new();
        let saved = store
            .upsert_annotation("s1", &Annotation::new("Q1", SubjectType::Question))
            .await
            .unwrap();
        let id = saved.id.unwrap();

        assert!(store
            .verify_annotation("s1", &id, SubjectType::Question)
            .await
            .unwrap());
        assert_eq!(store.get("s1", "Q1").await.unwrap().human_verified, Some(true));

        assert!(!store
            .verify_annotation("s1", "ann-404", SubjectType::Question)
            .await
            .unwrap());
    }
}
