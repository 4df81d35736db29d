//! Debounced, cancellable annotation saves keyed by subject.
//!
//! Every edit schedules a save of the full annotation record. A save for a
//! subject that already has one pending replaces it: the older delayed task
//! is cancelled and the debounce restarts. When the delay elapses the task
//! upserts through the [`AnnotationStore`] and publishes a [`SaveNotice`].
//!
//! Sends for the same subject are serialized, and a record whose `version`
//! is not newer than the last one persisted for that subject is skipped, so
//! a stale edit can never overwrite a newer one. Failures are logged and
//! published; local state is kept and nothing is retried.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use surveyqa_client::AnnotationStore;
use surveyqa_core::annotation::Annotation;
use surveyqa_core::types::SubjectId;
use tokio_util::sync::CancellationToken;

use crate::error::{SessionError, SessionResult};
use crate::notices::{NoticeBus, SaveNotice};

/// Cheaply cloneable handle to a survey's save queue.
#[derive(Clone)]
pub struct SaveQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SaveQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveQueue")
            .field("survey_id", &self.inner.survey_id)
            .finish_non_exhaustive()
    }
}

struct Inner {
    survey_id: String,
    store: Arc<dyn AnnotationStore>,
    notices: NoticeBus,
    debounce: Duration,
    runtime: tokio::runtime::Handle,
    /// Master cancellation token -- cancelled on shutdown.
    cancel: CancellationToken,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    next_ticket: u64,
    pending: HashMap<SubjectId, PendingSave>,
    /// Newest record scheduled per subject, whatever its save outcome.
    latest: HashMap<SubjectId, Annotation>,
    subjects: HashMap<SubjectId, Arc<tokio::sync::Mutex<SubjectRecord>>>,
}

/// A save waiting for its debounce delay.
struct PendingSave {
    ticket: u64,
    annotation: Annotation,
    cancel: CancellationToken,
}

/// Per-subject send lock plus what was last persisted.
#[derive(Default)]
struct SubjectRecord {
    persisted_version: Option<u64>,
    last_saved: Option<Annotation>,
}

impl SaveQueue {
    /// Create a queue for one survey.
    ///
    /// Must be called from within a tokio runtime; delayed saves are
    /// spawned onto that runtime.
    pub fn new(
        survey_id: impl Into<String>,
        store: Arc<dyn AnnotationStore>,
        notices: NoticeBus,
        debounce: Duration,
    ) -> SessionResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SessionError::Runtime(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                survey_id: survey_id.into(),
                store,
                notices,
                debounce,
                runtime,
                cancel: CancellationToken::new(),
                state: Mutex::new(QueueState::default()),
            }),
        })
    }

    pub fn survey_id(&self) -> &str {
        &self.inner.survey_id
    }

    pub fn store(&self) -> Arc<dyn AnnotationStore> {
        Arc::clone(&self.inner.store)
    }

    pub fn notices(&self) -> &NoticeBus {
        &self.inner.notices
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Number of saves still waiting for their delay.
    pub fn pending_count(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    /// The newest record scheduled for `subject_id`, pending or not.
    ///
    /// A reopened subject resumes from this record so edits made before it
    /// was closed are neither lost nor treated as newer.
    pub fn latest(&self, subject_id: &str) -> Option<Annotation> {
        self.inner.lock_state().latest.get(subject_id).cloned()
    }

    /// Highest version scheduled for `subject_id`.
    pub fn latest_version(&self, subject_id: &str) -> Option<u64> {
        self.inner
            .lock_state()
            .latest
            .get(subject_id)
            .map(|a| a.version)
    }

    /// Schedule a save of `annotation` after the debounce delay, replacing
    /// any save still pending for the same subject.
    pub fn schedule(&self, annotation: Annotation) {
        if self.inner.cancel.is_cancelled() {
            tracing::warn!(
                subject_id = %annotation.subject_id,
                version = annotation.version,
                "Save queue is shut down, dropping save"
            );
            return;
        }

        let subject_id = annotation.subject_id.clone();
        let version = annotation.version;
        let cancel = self.inner.cancel.child_token();

        let ticket = {
            let mut state = self.inner.lock_state();
            state.next_ticket += 1;
            let ticket = state.next_ticket;
            let newer = state
                .latest
                .get(&subject_id)
                .map_or(true, |latest| latest.version <= version);
            if newer {
                state.latest.insert(subject_id.clone(), annotation.clone());
            }
            let replaced = state.pending.insert(
                subject_id.clone(),
                PendingSave {
                    ticket,
                    annotation,
                    cancel: cancel.clone(),
                },
            );
            if let Some(previous) = replaced {
                previous.cancel.cancel();
                tracing::debug!(
                    subject_id = %subject_id,
                    superseded_version = previous.annotation.version,
                    version,
                    "Pending save superseded"
                );
            }
            ticket
        };

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(inner.debounce) => {}
            }
            if let Some(annotation) = inner.take_pending(&subject_id, ticket) {
                inner.persist(annotation).await;
            }
        });
    }

    /// Fire every pending save now instead of waiting for its delay.
    ///
    /// Returns the outcome of each save in subject order.
    pub async fn flush(&self) -> Vec<SaveNotice> {
        let mut drained: Vec<Annotation> = {
            let mut state = self.inner.lock_state();
            state
                .pending
                .drain()
                .map(|(_, pending)| {
                    pending.cancel.cancel();
                    pending.annotation
                })
                .collect()
        };
        drained.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));

        let mut notices = Vec::with_capacity(drained.len());
        for annotation in drained {
            notices.push(self.inner.persist(annotation).await);
        }
        notices
    }

    /// Cancel every pending save and refuse new ones.
    ///
    /// Pending edits are discarded; call [`flush`](Self::flush) first to
    /// keep them.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        let dropped = {
            let mut state = self.inner.lock_state();
            let dropped = state.pending.len();
            state.pending.clear();
            dropped
        };
        tracing::info!(
            survey_id = %self.inner.survey_id,
            dropped,
            "Save queue shut down"
        );
    }

    /// The record as last returned by the store for `subject_id`.
    pub async fn last_saved(&self, subject_id: &str) -> Option<Annotation> {
        let record = self.inner.subject_record(subject_id);
        let record = record.lock().await;
        record.last_saved.clone()
    }

    /// Highest version persisted for `subject_id`.
    pub async fn persisted_version(&self, subject_id: &str) -> Option<u64> {
        let record = self.inner.subject_record(subject_id);
        let record = record.lock().await;
        record.persisted_version
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subject_record(&self, subject_id: &str) -> Arc<tokio::sync::Mutex<SubjectRecord>> {
        let mut state = self.lock_state();
        Arc::clone(state.subjects.entry(subject_id.to_string()).or_default())
    }

    /// Remove the pending save for `subject_id` if it is still `ticket`.
    fn take_pending(&self, subject_id: &str, ticket: u64) -> Option<Annotation> {
        let mut state = self.lock_state();
        match state.pending.get(subject_id) {
            Some(pending) if pending.ticket == ticket => {
                state.pending.remove(subject_id).map(|p| p.annotation)
            }
            _ => None,
        }
    }

    async fn persist(&self, annotation: Annotation) -> SaveNotice {
        let record = self.subject_record(&annotation.subject_id);
        let mut record = record.lock().await;

        let persisted_version = record.persisted_version;
        let notice = match persisted_version {
            Some(persisted) if persisted >= annotation.version => {
                tracing::debug!(
                    subject_id = %annotation.subject_id,
                    version = annotation.version,
                    persisted_version = persisted,
                    "Skipping stale save"
                );
                SaveNotice::Skipped {
                    subject_id: annotation.subject_id.clone(),
                    version: annotation.version,
                    persisted_version: persisted,
                }
            }
            _ => match self
                .store
                .upsert_annotation(&self.survey_id, &annotation)
                .await
            {
                Ok(saved) => {
                    tracing::info!(
                        survey_id = %self.survey_id,
                        subject_id = %annotation.subject_id,
                        version = annotation.version,
                        "Annotation saved"
                    );
                    record.persisted_version = Some(annotation.version);
                    let annotation_id = saved.id.clone();
                    record.last_saved = Some(saved);
                    SaveNotice::Saved {
                        subject_id: annotation.subject_id.clone(),
                        version: annotation.version,
                        annotation_id,
                    }
                }
                Err(e) => {
                    tracing::error!(
                        survey_id = %self.survey_id,
                        subject_id = %annotation.subject_id,
                        version = annotation.version,
                        error = %e,
                        "Failed to save annotation"
                    );
                    SaveNotice::Failed {
                        subject_id: annotation.subject_id.clone(),
                        version: annotation.version,
                        error: e.to_string(),
                    }
                }
            },
        };

        self.notices.publish(notice.clone());
        notice
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
