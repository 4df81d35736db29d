//! Selection state over the open annotation sessions of one survey.
//!
//! [`AnnotationWorkspace`] is the only place that decides which subject is
//! selected. It is owned by a single task and mutated through `&mut self`;
//! the background save tasks never touch it.

use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use surveyqa_client::AnnotationStore;
use surveyqa_core::annotation::Annotation;
use surveyqa_core::error::CoreError;
use surveyqa_core::labels::{LabelPolicy, LabelPolicyKind};
use surveyqa_core::question::Question;
use surveyqa_core::types::SubjectId;

use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::notices::{NoticeBus, SaveNotice};
use crate::save_queue::SaveQueue;
use crate::session::AnnotationSession;

pub struct AnnotationWorkspace {
    sessions: IndexMap<SubjectId, AnnotationSession>,
    selected: Option<SubjectId>,
    policy: Arc<dyn LabelPolicy>,
    queue: SaveQueue,
}

impl AnnotationWorkspace {
    pub fn new(queue: SaveQueue, policy: Arc<dyn LabelPolicy>) -> Self {
        Self {
            sessions: IndexMap::new(),
            selected: None,
            policy,
            queue,
        }
    }

    /// Build a workspace and its save queue from configuration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(
        survey_id: impl Into<String>,
        store: Arc<dyn AnnotationStore>,
        config: &SessionConfig,
    ) -> SessionResult<Self> {
        let queue = SaveQueue::new(survey_id, store, NoticeBus::default(), config.save_debounce)?;
        let policy: Arc<dyn LabelPolicy> = Arc::from(config.label_policy.policy());
        tracing::info!(
            survey_id = %queue.survey_id(),
            label_policy = %config.label_policy,
            debounce_ms = config.save_debounce.as_millis() as u64,
            "Annotation workspace created"
        );
        Ok(Self::new(queue, policy))
    }

    pub fn queue(&self) -> &SaveQueue {
        &self.queue
    }

    pub fn notices(&self) -> &NoticeBus {
        self.queue.notices()
    }

    pub fn policy_kind(&self) -> LabelPolicyKind {
        self.policy.kind()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Subject ids of the open sessions, in the order they were opened.
    pub fn subject_ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    /// Open a session for `question`.
    ///
    /// If the subject is already open its question is replaced and the
    /// local annotation is kept; `annotation` is ignored in that case.
    pub fn open(
        &mut self,
        question: Question,
        annotation: Option<Annotation>,
    ) -> SessionResult<&mut AnnotationSession> {
        match self.sessions.entry(question.id.clone()) {
            Entry::Occupied(entry) => {
                let session = entry.into_mut();
                session.replace_question(question)?;
                Ok(session)
            }
            Entry::Vacant(entry) => {
                let session = AnnotationSession::new(
                    question,
                    annotation,
                    Arc::clone(&self.policy),
                    self.queue.clone(),
                )?;
                tracing::debug!(subject_id = %session.subject_id(), "Session opened");
                Ok(entry.insert(session))
            }
        }
    }

    /// Open a session for `question`, resuming its annotation when the
    /// subject is not open yet.
    ///
    /// A record this workspace already scheduled for the subject wins over
    /// the store, since its save may still be pending or in flight.
    pub async fn open_from_store(
        &mut self,
        question: Question,
    ) -> SessionResult<&mut AnnotationSession> {
        let annotation = if self.sessions.contains_key(&question.id) {
            None
        } else if let Some(latest) = self.queue.latest(&question.id) {
            tracing::debug!(
                subject_id = %question.id,
                version = latest.version,
                "Resuming locally scheduled annotation"
            );
            Some(latest)
        } else {
            self.queue
                .store()
                .fetch_annotation(self.queue.survey_id(), &question.id)
                .await?
        };
        self.open(question, annotation)
    }

    /// Make `subject_id` the selected subject.
    pub fn select(&mut self, subject_id: &str) -> SessionResult<&mut AnnotationSession> {
        let session = self
            .sessions
            .get_mut(subject_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "AnnotationSession",
                id: subject_id.to_string(),
            })?;
        self.selected = Some(subject_id.to_string());
        Ok(session)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&AnnotationSession> {
        self.sessions.get(self.selected.as_deref()?)
    }

    pub fn selected_mut(&mut self) -> Option<&mut AnnotationSession> {
        self.sessions.get_mut(self.selected.as_deref()?)
    }

    pub fn session(&self, subject_id: &str) -> Option<&AnnotationSession> {
        self.sessions.get(subject_id)
    }

    pub fn session_mut(&mut self, subject_id: &str) -> Option<&mut AnnotationSession> {
        self.sessions.get_mut(subject_id)
    }

    /// Close a session, clearing the selection if it pointed at it.
    ///
    /// A save already scheduled for the subject still runs.
    pub fn close(&mut self, subject_id: &str) -> Option<AnnotationSession> {
        let closed = self.sessions.shift_remove(subject_id);
        if self.selected.as_deref() == Some(subject_id) {
            self.selected = None;
        }
        closed
    }

    /// Persist every pending edit now.
    pub async fn flush(&self) -> Vec<SaveNotice> {
        self.queue.flush().await
    }
}
