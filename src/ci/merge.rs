//! Map merging for CI documents.
//!
//! Both merges recurse into keys whose values are mappings on both sides and
//! let the overriding side win for scalars. They differ only for sequences:
//! - `deep_merge`: sequences concatenate (base items, then override items)
//! - `extends_merge`: sequences are replaced by the overriding side
//!
//! Inputs are never modified; every call returns a new mapping.

use serde_yaml::{Mapping, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListPolicy {
    Concatenate,
    Replace,
}

/// Recursive union where nested sequences concatenate.
pub fn deep_merge(base: &Mapping, overlay: &Mapping) -> Mapping {
    merge_with(base, overlay, ListPolicy::Concatenate)
}

/// Recursive union following GitLab `extends:` rules: nested sequences are
/// replaced wholesale, keys missing from `overlay` are inherited from `base`.
pub fn extends_merge(base: &Mapping, overlay: &Mapping) -> Mapping {
    merge_with(base, overlay, ListPolicy::Replace)
}

/// Folds documents left to right with `deep_merge`.
pub fn merge_documents<'a, I>(documents: I) -> Mapping
where
    I: IntoIterator<Item = &'a Mapping>,
{
    documents
        .into_iter()
        .fold(Mapping::new(), |acc, doc| deep_merge(&acc, doc))
}

fn merge_with(base: &Mapping, overlay: &Mapping, policy: ListPolicy) -> Mapping {
    let mut merged = base.clone();

    for (key, overlay_value) in overlay {
        let value = match (merged.get(key), overlay_value) {
            (Some(Value::Mapping(base_map)), Value::Mapping(overlay_map)) => {
                Value::Mapping(merge_with(base_map, overlay_map, policy))
            }
            (Some(Value::Sequence(base_seq)), Value::Sequence(overlay_seq))
                if policy == ListPolicy::Concatenate =>
            {
                Value::Sequence(base_seq.iter().chain(overlay_seq).cloned().collect())
            }
            _ => overlay_value.clone(),
        };
        // Existing keys keep their position; new keys are appended.
        merged.insert(key.clone(), value);
    }

    merged
}
