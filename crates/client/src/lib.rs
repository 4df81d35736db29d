//! Client side of the survey annotation REST contract.
//!
//! - [`HttpAnnotationApi`]: reqwest client for the persistence,
//!   verification, question and taxonomy endpoints.
//! - [`AnnotationStore`]: the seam the session layer saves through.
//! - [`InMemoryAnnotationStore`]: store kept in process memory, for
//!   offline use and tests.

pub mod api;
pub mod config;
pub mod memory;
pub mod store;

pub use api::{ApiError, HttpAnnotationApi};
pub use config::ClientConfig;
pub use memory::InMemoryAnnotationStore;
pub use store::AnnotationStore;
