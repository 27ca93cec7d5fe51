mod extends;
mod merge;

use serde_yaml::Mapping;

pub use extends::{resolve_extends, RESERVED_KEYS};
pub use merge::{deep_merge, extends_merge, merge_documents};

/// A decoded CI document: an ordered mapping of top-level keys.
pub type Document = Mapping;
