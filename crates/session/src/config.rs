use std::time::Duration;

use surveyqa_core::labels::LabelPolicyKind;

/// Default debounce before an edit is persisted.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 100;

/// Session configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay between the last edit of a subject and its save.
    pub save_debounce: Duration,
    /// Label reconciliation policy injected into new sessions.
    pub label_policy: LabelPolicyKind,
}

impl SessionConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `SURVEYQA_SAVE_DEBOUNCE_MS` | `100`   |
    /// | `SURVEYQA_LABEL_POLICY`     | `merge` |
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let debounce_ms = match std::env::var("SURVEYQA_SAVE_DEBOUNCE_MS") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %raw,
                    default = DEFAULT_SAVE_DEBOUNCE_MS,
                    "Invalid SURVEYQA_SAVE_DEBOUNCE_MS, using default"
                );
                DEFAULT_SAVE_DEBOUNCE_MS
            }),
            Err(_) => DEFAULT_SAVE_DEBOUNCE_MS,
        };

        let label_policy = match std::env::var("SURVEYQA_LABEL_POLICY") {
            Ok(raw) => LabelPolicyKind::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Invalid SURVEYQA_LABEL_POLICY, using merge");
                LabelPolicyKind::Merge
            }),
            Err(_) => LabelPolicyKind::Merge,
        };

        Self {
            save_debounce: Duration::from_millis(debounce_ms),
            label_policy,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_debounce: Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS),
            label_policy: LabelPolicyKind::Merge,
        }
    }
}
