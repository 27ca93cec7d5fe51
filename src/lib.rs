//! Change-based CI pipeline selection and GitLab CI `extends:` resolution.
//!
//! - [`triggers`] decides which pipelines run for a set of changed files.
//! - [`ci`] merges CI documents and resolves job template inheritance.
//! - [`codec`] loads and dumps CI YAML, keeping `!reference` tags intact and
//!   never emitting anchors or aliases.

pub mod ci;
pub mod codec;
pub mod error;
pub mod triggers;

pub use error::{CiScopeError, Result};
