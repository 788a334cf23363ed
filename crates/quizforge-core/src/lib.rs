//! # quizforge-core
//!
//! Core types, traits, and abstractions for quizforge.
//!
//! This crate provides the document/unit/question models, the error type, and
//! the repository and capability traits that the database and worker crates
//! implement.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, ErrorKind, Result};
pub use models::*;
pub use traits::*;

/// Generate a new time-ordered identifier for rows created by the workers.
#[inline]
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
