//! Survey annotation domain logic.
//!
//! Zero internal dependencies: the client and session crates, and any
//! future tooling, share the same label reconciliation rules, rating
//! scales and wire types from here.

pub mod annotation;
pub mod error;
pub mod labels;
pub mod question;
pub mod rating;
pub mod taxonomy;
pub mod types;
