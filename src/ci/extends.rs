use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, warn};
use serde_yaml::{Mapping, Value};

use crate::error::{CiScopeError, Result};

use super::merge::extends_merge;

/// Top-level keys that configure the whole document rather than a job.
pub const RESERVED_KEYS: [&str; 3] = ["variables", "stages", "default"];

const EXTENDS_KEY: &str = "extends";

/// Resolves every `extends:` directive in a CI document.
///
/// Each job or template (any non-reserved top-level entry whose value is a
/// mapping) is replaced by the fold of its parents, merged left to right with
/// `extends_merge`, followed by the job's own keys. Parents that are not in
/// the document contribute nothing. Resolved entries never keep `extends`.
/// Reserved keys and non-mapping entries are copied unchanged, and key order
/// is preserved.
///
/// # Errors
///
/// Returns `CiScopeError::CircularExtends` if an entry extends itself directly
/// or transitively.
pub fn resolve_extends(document: &Mapping) -> Result<Mapping> {
    let mut resolver = ExtendsResolver::new(document);
    let mut resolved = Mapping::with_capacity(document.len());

    for (key, value) in document {
        let value = match key.as_str() {
            Some(name) if resolver.entries.contains_key(name) => {
                Value::Mapping(resolver.resolve(name)?)
            }
            _ => value.clone(),
        };
        resolved.insert(key.clone(), value);
    }

    Ok(resolved)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Resolved,
}

/// Memoized depth-first walk over the entry/extends graph.
struct ExtendsResolver<'a> {
    entries: IndexMap<&'a str, &'a Mapping>,
    state: HashMap<&'a str, Visit>,
    resolved: HashMap<&'a str, Mapping>,
    stack: Vec<&'a str>,
}

impl<'a> ExtendsResolver<'a> {
    fn new(document: &'a Mapping) -> Self {
        let entries = document
            .iter()
            .filter_map(|(key, value)| {
                let name = key.as_str()?;
                if RESERVED_KEYS.contains(&name) {
                    return None;
                }
                value.as_mapping().map(|entry| (name, entry))
            })
            .collect();

        Self {
            entries,
            state: HashMap::new(),
            resolved: HashMap::new(),
            stack: Vec::new(),
        }
    }

    fn resolve(&mut self, name: &'a str) -> Result<Mapping> {
        match self.state.get(name) {
            Some(Visit::Resolved) => {
                return Ok(self.resolved.get(name).cloned().unwrap_or_default());
            }
            Some(Visit::InProgress) => return Err(self.cycle_error(name)),
            None => {}
        }

        let Some(entry) = self.entries.get(name).copied() else {
            return Ok(Mapping::new());
        };

        self.state.insert(name, Visit::InProgress);
        self.stack.push(name);

        let mut merged = Mapping::new();
        for parent in extends_names(name, entry) {
            if self.entries.contains_key(parent) {
                let parent_resolved = self.resolve(parent)?;
                merged = extends_merge(&merged, &parent_resolved);
            } else {
                warn!("'{name}' extends unknown template '{parent}', skipping");
            }
        }

        let own: Mapping = entry
            .iter()
            .filter(|(key, _)| key.as_str() != Some(EXTENDS_KEY))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        merged = extends_merge(&merged, &own);

        self.stack.pop();
        self.state.insert(name, Visit::Resolved);
        self.resolved.insert(name, merged.clone());
        debug!("Resolved '{name}'");

        Ok(merged)
    }

    fn cycle_error(&self, name: &str) -> CiScopeError {
        let start = self
            .stack
            .iter()
            .position(|entry| *entry == name)
            .unwrap_or_default();
        let mut cycle: Vec<String> = self.stack[start..]
            .iter()
            .map(|entry| (*entry).to_string())
            .collect();
        cycle.push(name.to_string());
        CiScopeError::CircularExtends { cycle }
    }
}

/// Parent names listed by an entry's `extends` key, in order.
fn extends_names<'a>(name: &str, entry: &'a Mapping) -> Vec<&'a str> {
    match entry.get(EXTENDS_KEY) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(parent)) => vec![parent.as_str()],
        Some(Value::Sequence(parents)) => parents
            .iter()
            .filter_map(|parent| {
                let parent_name = parent.as_str();
                if parent_name.is_none() {
                    warn!("Ignoring non-string extends item in '{name}': {parent:?}");
                }
                parent_name
            })
            .collect(),
        Some(other) => {
            warn!("Ignoring unsupported extends value in '{name}': {other:?}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Mapping {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_single_parent() {
        let resolved = resolve_extends(&doc(
            r"
.base:
  image: alpine
  script: [make]
job:
  extends: .base
  script: [make test]
",
        ))
        .unwrap();

        assert_eq!(resolved["job"], Value::Mapping(doc("image: alpine\nscript: [make test]")));
    }

    #[test]
    fn test_multiple_parents_later_wins_then_job() {
        let resolved = resolve_extends(&doc(
            r"
.t1:
  image: one
  stage: build
  tags: [a]
.t2:
  image: two
  tags: [b]
job:
  extends: [.t1, .t2]
  stage: deploy
",
        ))
        .unwrap();

        assert_eq!(
            resolved["job"],
            Value::Mapping(doc("image: two\nstage: deploy\ntags: [b]"))
        );
    }

    #[test]
    fn test_nested_maps_merge_through_chain() {
        let resolved = resolve_extends(&doc(
            r"
.root:
  variables: {A: '1', B: '2'}
.mid:
  extends: .root
  variables: {B: '3'}
job:
  extends: .mid
  variables: {C: '4'}
",
        ))
        .unwrap();

        assert_eq!(
            resolved["job"],
            Value::Mapping(doc("variables: {A: '1', B: '3', C: '4'}"))
        );
        assert_eq!(
            resolved[".mid"],
            Value::Mapping(doc("variables: {A: '1', B: '3'}"))
        );
    }

    #[test]
    fn test_missing_parent_is_skipped() {
        let resolved = resolve_extends(&doc(
            "job:\n  extends: .nonexistent\n  script: [echo hi]\n",
        ))
        .unwrap();

        assert_eq!(resolved["job"], Value::Mapping(doc("script: [echo hi]")));
    }

    #[test]
    fn test_circular_extends() {
        let err = resolve_extends(&doc("a: {extends: b}\nb: {extends: a}")).unwrap_err();
        match err {
            CiScopeError::CircularExtends { cycle } => {
                assert_eq!(cycle, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_extends_is_circular() {
        let err = resolve_extends(&doc("job: {extends: job, script: [x]}")).unwrap_err();
        assert!(err.to_string().contains("job -> job"));
    }

    #[test]
    fn test_cycle_reported_from_entry_point() {
        let err = resolve_extends(&doc(
            "job: {extends: .a}\n.a: {extends: .b}\n.b: {extends: .a}",
        ))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "circular extends detected: .a -> .b -> .a"
        );
    }

    #[test]
    fn test_reserved_and_scalar_entries_pass_through() {
        let input = doc(
            r"
variables:
  extends: not-a-directive
stages: [build, test]
default:
  image: alpine
include: ci/other.yml
job:
  extends: .t
.t:
  image: debian
",
        );

        let resolved = resolve_extends(&input).unwrap();

        assert_eq!(resolved["variables"], input["variables"]);
        assert_eq!(resolved["stages"], input["stages"]);
        assert_eq!(resolved["default"], input["default"]);
        assert_eq!(resolved["include"], input["include"]);
        let keys: Vec<_> = resolved.keys().filter_map(Value::as_str).collect();
        assert_eq!(
            keys,
            vec!["variables", "stages", "default", "include", "job", ".t"]
        );
    }

    #[test]
    fn test_no_entry_retains_extends() {
        let resolved = resolve_extends(&doc(
            ".a: {script: [a]}\n.b: {extends: .a}\nc: {extends: [.b, .a, .missing]}\nd: {extends: 42}",
        ))
        .unwrap();

        for (_, value) in &resolved {
            let entry = value.as_mapping().unwrap();
            assert!(!entry.contains_key(EXTENDS_KEY));
        }
        assert_eq!(resolved["c"], Value::Mapping(doc("script: [a]")));
        assert_eq!(resolved["d"], Value::Mapping(Mapping::new()));
    }

    #[test]
    fn test_shared_parent_resolved_once() {
        let input = doc(
            r"
.base: {variables: {SHARED: 'yes'}}
one: {extends: .base, script: [one]}
two: {extends: .base, script: [two]}
",
        );
        let resolved = resolve_extends(&input).unwrap();

        assert_eq!(resolved["one"]["variables"], resolved["two"]["variables"]);
        // The input document is left untouched
        assert!(input["one"].as_mapping().unwrap().contains_key(EXTENDS_KEY));
    }
}
