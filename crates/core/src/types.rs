/// Identifier of an annotated subject (question, section or survey).
///
/// Survey content ids come from the upstream generation pipeline and are
/// opaque strings such as `"Q12"` or `"S3"`.
pub type SubjectId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
