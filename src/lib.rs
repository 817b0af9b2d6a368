//! Project context assembly and change analysis for AI-assisted coding.
//!
//! [`crate::core::ContextAssembler`] gathers the files an intent refers to, similar
//! files, inferred style and project signals into a [`crate::core::ProjectContextBundle`],
//! memoized by [`crate::core::ContentFingerprintCache`]. [`crate::core::DiffEngine`] compares
//! two versions of a file and flags semantic and breaking changes.

pub mod config;
pub mod core;
pub mod error;

pub use error::{PatchwrightError, Result};
