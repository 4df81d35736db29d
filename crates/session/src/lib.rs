//! Annotation editing sessions and debounced persistence.
//!
//! - [`AnnotationSession`]: one annotation being edited against its
//!   question, with an injected label policy.
//! - [`SaveQueue`]: debounced, cancellable save tasks keyed by subject.
//! - [`NoticeBus`]: broadcast of save outcomes for toasts and logs.
//! - [`AnnotationWorkspace`]: single-writer selection state over the open
//!   sessions of a survey.

pub mod config;
pub mod error;
pub mod notices;
pub mod save_queue;
pub mod session;
pub mod workspace;

pub use config::SessionConfig;
pub use error::SessionError;
pub use notices::{NoticeBus, SaveNotice};
pub use save_queue::SaveQueue;
pub use session::AnnotationSession;
pub use workspace::AnnotationWorkspace;
