use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde_yaml::{Mapping, Value};

use crate::error::{CiScopeError, Result};

use super::change_trigger::ChangeTrigger;
use super::pipeline::Pipeline;

/// Loads pipelines from a pipelines directory or a legacy single file.
///
/// # Errors
///
/// Returns an error if the path cannot be read, a file is not valid YAML, or a
/// pipeline definition has an unusable shape.
pub fn load_pipelines(path: &Path) -> Result<Vec<Pipeline>> {
    if path.is_dir() {
        load_pipelines_dir(path)
    } else {
        load_pipelines_file(path)
    }
}

/// Loads one pipeline per `.yml`/`.yaml` file in `dir`, ordered by file name.
///
/// The file stem is the pipeline name unless the file sets `name`.
pub fn load_pipelines_dir(dir: &Path) -> Result<Vec<Pipeline>> {
    let mut files: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yml" | "yaml")
                )
        })
        .collect();
    files.sort();

    let mut pipelines = Vec::with_capacity(files.len());
    for file in &files {
        let stem = file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let invalid = |message: String| CiScopeError::InvalidPipeline {
            source_name: file.display().to_string(),
            message,
        };
        let contents = fs::read_to_string(file).map_err(|err| invalid(err.to_string()))?;
        let value: Value =
            serde_yaml::from_str(&contents).map_err(|err| invalid(err.to_string()))?;
        pipelines.push(parse_pipeline(&value, stem)?);
    }

    info!("Loaded {} pipelines from {}", pipelines.len(), dir.display());
    Ok(pipelines)
}

/// Loads pipelines from a legacy file holding a top-level `pipelines:` list.
pub fn load_pipelines_file(path: &Path) -> Result<Vec<Pipeline>> {
    let contents = fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&contents)?;
    let pipelines = parse_pipelines_file(&value, &path.display().to_string())?;

    info!("Loaded {} pipelines from {}", pipelines.len(), path.display());
    Ok(pipelines)
}

/// Parses the decoded contents of a legacy pipelines file.
pub fn parse_pipelines_file(value: &Value, source_name: &str) -> Result<Vec<Pipeline>> {
    let invalid = |message: String| CiScopeError::InvalidPipeline {
        source_name: source_name.to_string(),
        message,
    };

    let entries = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(root) => match root.get("pipelines") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Sequence(entries)) => entries,
            Some(_) => return Err(invalid("`pipelines` must be a list".to_string())),
        },
        _ => return Err(invalid("expected a mapping at the top level".to_string())),
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(format!("pipeline #{index} has no `name`")))?;
            parse_pipeline(entry, name)
        })
        .collect()
}

/// Parses a single pipeline definition.
///
/// Recognized keys are `name`, `entrypoint` and `on`. Each `on` block with a
/// `changes` key yields one trigger.
pub fn parse_pipeline(value: &Value, default_name: &str) -> Result<Pipeline> {
    let empty = Mapping::new();
    let body = match value {
        Value::Mapping(body) => body,
        Value::Null => &empty,
        _ => {
            return Err(CiScopeError::InvalidPipeline {
                source_name: default_name.to_string(),
                message: "pipeline definition must be a mapping".to_string(),
            })
        }
    };

    let name = body
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(default_name);
    let entrypoint = body
        .get("entrypoint")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let triggers = on_blocks(body)
        .into_iter()
        .filter_map(|block| block.get("changes"))
        .map(parse_changes)
        .collect();

    Ok(Pipeline::new(name, entrypoint, triggers))
}

/// Returns the `on` blocks of a pipeline body.
///
/// YAML 1.1 parsers read a bare `on` key as boolean true, so both spellings
/// are accepted.
fn on_blocks(body: &Mapping) -> Vec<&Value> {
    let on = body.get("on").or_else(|| body.get(Value::Bool(true)));

    match on {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(blocks)) => blocks.iter().collect(),
        Some(block @ Value::Mapping(_)) => vec![block],
        Some(other) => {
            warn!("Ignoring unsupported `on` value: {other:?}");
            Vec::new()
        }
    }
}

fn parse_changes(changes: &Value) -> ChangeTrigger {
    let mut trigger = ChangeTrigger::default();

    let items: Vec<&Value> = match changes {
        Value::Sequence(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    };

    for item in items {
        match item {
            Value::String(pattern) => trigger.include.push(pattern.clone()),
            Value::Mapping(block) => {
                if let Some(include) = block.get("include") {
                    trigger.include.extend(string_list(include));
                }
                if let Some(all_except) = block.get("all_except") {
                    trigger.all_except.extend(string_list(all_except));
                }
            }
            other => warn!("Ignoring unsupported `changes` entry: {other:?}"),
        }
    }

    debug!(
        "Parsed trigger with {} include and {} all_except patterns",
        trigger.include.len(),
        trigger.all_except.len()
    );
    trigger
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(pattern) => vec![pattern.clone()],
        Value::Sequence(items) => items
            .iter()
            .filter_map(|item| {
                let pattern = item.as_str();
                if pattern.is_none() {
                    warn!("Ignoring non-string pattern: {item:?}");
                }
                pattern.map(str::to_string)
            })
            .collect(),
        Value::Null => Vec::new(),
        other => {
            warn!("Ignoring unsupported pattern list: {other:?}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_parse_pipeline_accumulates_changes() {
        let value = yaml(
            r"
entrypoint: ci/backend.yml
on:
  - changes:
      - api
      - include: [shared/**/*]
      - all_except: [docs]
      - all_except: ['*.md']
",
        );

        let pipeline = parse_pipeline(&value, "backend").unwrap();
        assert_eq!(pipeline.name, "backend");
        assert_eq!(pipeline.entrypoint, "ci/backend.yml");
        assert_eq!(pipeline.triggers.len(), 1);
        assert_eq!(pipeline.triggers[0].include, vec!["api", "shared/**/*"]);
        assert_eq!(pipeline.triggers[0].all_except, vec!["docs", "*.md"]);
    }

    #[test]
    fn test_parse_pipeline_boolean_on_key() {
        let mut body = Mapping::new();
        body.insert(Value::from("name"), Value::from("web"));
        body.insert(Value::Bool(true), yaml("[{changes: [web]}, {changes: [assets]}]"));

        let pipeline = parse_pipeline(&Value::Mapping(body), "ignored").unwrap();
        assert_eq!(pipeline.name, "web");
        assert_eq!(pipeline.triggers.len(), 2);
        assert_eq!(pipeline.triggers[1].include, vec!["assets"]);
    }

    #[test]
    fn test_parse_pipeline_without_changes_always_runs() {
        let value = yaml("on: [push, {schedule: nightly}]");
        let pipeline = parse_pipeline(&value, "nightly").unwrap();
        assert!(pipeline.triggers.is_empty());
        assert_eq!(pipeline.entrypoint, "");
        assert!(pipeline.should_trigger(&["anything"]));
    }

    #[test]
    fn test_parse_pipeline_single_on_mapping() {
        let value = yaml("on:\n  changes: [lib]\n");
        let pipeline = parse_pipeline(&value, "lib").unwrap();
        assert_eq!(pipeline.triggers[0].include, vec!["lib"]);
    }

    #[test]
    fn test_parse_pipeline_rejects_non_mapping() {
        let result = parse_pipeline(&yaml("[1, 2]"), "broken");
        assert!(matches!(
            result,
            Err(CiScopeError::InvalidPipeline { .. })
        ));
    }

    #[test]
    fn test_parse_legacy_file() {
        let value = yaml(
            r"
pipelines:
  - name: api
    entrypoint: ci/api.yml
    on:
      - changes: [api]
  - name: all
    entrypoint: ci/all.yml
",
        );

        let pipelines = parse_pipelines_file(&value, "pipelines.yml").unwrap();
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0].name, "api");
        assert!(pipelines[1].triggers.is_empty());
    }

    #[test]
    fn test_parse_legacy_file_requires_names() {
        let value = yaml("pipelines:\n  - entrypoint: ci/x.yml\n");
        let err = parse_pipelines_file(&value, "pipelines.yml").unwrap_err();
        assert!(err.to_string().contains("has no `name`"));
    }

    #[test]
    fn test_load_pipelines_dir_sorted_by_file_name() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("web.yml"),
            "entrypoint: ci/web.yml\non:\n  - changes: [web]\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("api.yaml"),
            "name: backend\nentrypoint: ci/api.yml\n",
        )
        .unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "not a pipeline").unwrap();

        let pipelines = load_pipelines(temp_dir.path()).unwrap();
        let names: Vec<_> = pipelines.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["backend", "web"]);
    }

    #[test]
    fn test_load_pipelines_dir_names_broken_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("good.yml"), "entrypoint: ci/good.yml\n").unwrap();
        fs::write(temp_dir.path().join("broken.yml"), "on: [unclosed\n").unwrap();

        let err = load_pipelines(temp_dir.path()).unwrap_err();
        match err {
            CiScopeError::InvalidPipeline { source_name, .. } => {
                assert!(source_name.ends_with("broken.yml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_pipelines_legacy_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pipelines.yml");
        fs::write(&path, "pipelines:\n  - name: only\n    entrypoint: ci/only.yml\n").unwrap();

        let pipelines = load_pipelines(&path).unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].entrypoint, "ci/only.yml");
    }
}
