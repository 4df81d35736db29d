//! Save outcome notices backed by a `tokio::sync::broadcast` channel.
//!
//! Saves are fire-and-forget from the editor's point of view. Their
//! outcome is published here so a UI can show a toast and tests can
//! observe ordering.

use surveyqa_core::types::SubjectId;
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Outcome of one save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveNotice {
    /// The record was upserted.
    Saved {
        subject_id: SubjectId,
        version: u64,
        annotation_id: Option<String>,
    },
    /// The upsert failed. Local state was kept and nothing is retried.
    Failed {
        subject_id: SubjectId,
        version: u64,
        error: String,
    },
    /// A newer version of the record had already been persisted.
    Skipped {
        subject_id: SubjectId,
        version: u64,
        persisted_version: u64,
    },
}

impl SaveNotice {
    pub fn subject_id(&self) -> &str {
        match self {
            Self::Saved { subject_id, .. }
            | Self::Failed { subject_id, .. }
            | Self::Skipped { subject_id, .. } => subject_id,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Self::Saved { version, .. }
            | Self::Failed { version, .. }
            | Self::Skipped { version, .. } => *version,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// In-process fan-out of [`SaveNotice`]s.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    sender: broadcast::Sender<SaveNotice>,
}

impl NoticeBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers that fall behind observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notice to all current subscribers.
    pub fn publish(&self, notice: SaveNotice) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaveNotice> {
        self.sender.subscribe()
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = NoticeBus::default();
        let mut rx = bus.subscribe();

        bus.publish(SaveNotice::Failed {
            subject_id: "Q1".to_string(),
            version: 4,
            error: "timeout".to_string(),
        });

        let notice = rx.recv().await.expect("should receive the notice");
        assert_eq!(notice.subject_id(), "Q1");
        assert_eq!(notice.version(), 4);
        assert!(notice.is_failure());
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = NoticeBus::default();
        bus.publish(SaveNotice::Saved {
            subject_id: "Q1".to_string(),
            version: 1,
            annotation_id: None,
        });
    }

    #[tokio::test]
    async fn clones_share_the_channel() {
        let bus = NoticeBus::default();
        let mut rx = bus.subscribe();
        bus.clone().publish(SaveNotice::Skipped {
            subject_id: "S1".to_string(),
            version: 1,
            persisted_version: 2,
        });
        assert!(!rx.recv().await.unwrap().is_failure());
    }
}
