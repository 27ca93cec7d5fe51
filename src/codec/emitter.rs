use serde_yaml::{Mapping, Value};

use crate::error::{CiScopeError, Result};

use super::{display_path, index_path, key_path, tag_name, YamlCodec};

const INDENT: usize = 2;

/// Block-style writer over an in-memory value tree.
///
/// Mappings indent their values by two spaces, sequences under a key are not
/// indented, and empty collections are written as `{}` / `[]`.
struct Emitter<'c> {
    codec: &'c YamlCodec,
    out: String,
}

pub(super) fn emit(codec: &YamlCodec, value: &Value) -> Result<String> {
    let mut emitter = Emitter::new(codec);
    match value {
        Value::Mapping(map) if !map.is_empty() => emitter.mapping(map, 0, "")?,
        Value::Sequence(seq) if !seq.is_empty() => emitter.sequence(seq, 0, "")?,
        other => {
            let text = emitter.inline(other, "")?;
            emitter.out.push_str(&text);
            emitter.out.push('\n');
        }
    }
    Ok(emitter.out)
}

pub(super) fn emit_mapping(codec: &YamlCodec, map: &Mapping) -> Result<String> {
    if map.is_empty() {
        return Ok("{}\n".to_string());
    }
    let mut emitter = Emitter::new(codec);
    emitter.mapping(map, 0, "")?;
    Ok(emitter.out)
}

impl<'c> Emitter<'c> {
    fn new(codec: &'c YamlCodec) -> Self {
        Self {
            codec,
            out: String::new(),
        }
    }

    fn mapping(&mut self, map: &Mapping, indent: usize, path: &str) -> Result<()> {
        for (key, value) in map {
            let child = key_path(path, key);
            let key_text = self.key(key, &child)?;

            self.pad(indent);
            self.out.push_str(&key_text);
            self.out.push(':');

            match value {
                Value::Mapping(nested) if !nested.is_empty() => {
                    self.out.push('\n');
                    self.mapping(nested, indent + INDENT, &child)?;
                }
                Value::Sequence(items) if !items.is_empty() => {
                    self.out.push('\n');
                    self.sequence(items, indent, &child)?;
                }
                other => {
                    let text = self.inline(other, &child)?;
                    self.out.push(' ');
                    self.out.push_str(&text);
                    self.out.push('\n');
                }
            }
        }
        Ok(())
    }

    fn sequence(&mut self, items: &[Value], indent: usize, path: &str) -> Result<()> {
        for (index, item) in items.iter().enumerate() {
            let child = index_path(path, index);
            self.pad(indent);
            self.out.push_str("- ");

            match item {
                Value::Mapping(nested) if !nested.is_empty() => {
                    let start = self.out.len();
                    self.mapping(nested, indent + INDENT, &child)?;
                    self.unpad_first_line(start, indent + INDENT);
                }
                Value::Sequence(nested) if !nested.is_empty() => {
                    let start = self.out.len();
                    self.sequence(nested, indent + INDENT, &child)?;
                    self.unpad_first_line(start, indent + INDENT);
                }
                other => {
                    let text = self.inline(other, &child)?;
                    self.out.push_str(&text);
                    self.out.push('\n');
                }
            }
        }
        Ok(())
    }

    /// Nested collections in a sequence start on the `- ` line, so the first
    /// line written for them drops its indentation.
    fn unpad_first_line(&mut self, start: usize, width: usize) {
        self.out.replace_range(start..start + width, "");
    }

    fn pad(&mut self, indent: usize) {
        self.out.extend(std::iter::repeat(' ').take(indent));
    }

    fn key(&self, key: &Value, path: &str) -> Result<String> {
        match key {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                scalar(key, path)
            }
            _ => Err(CiScopeError::Serialize {
                path: display_path(path),
                message: "mapping keys must be scalars".to_string(),
            }),
        }
    }

    fn inline(&self, value: &Value, path: &str) -> Result<String> {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                scalar(value, path)
            }
            Value::Mapping(map) if map.is_empty() => Ok("{}".to_string()),
            Value::Sequence(items) if items.is_empty() => Ok("[]".to_string()),
            Value::Tagged(tagged) => {
                let name = tag_name(&tagged.tag);
                let handler = self.codec.handler(&tagged.tag).ok_or_else(|| {
                    CiScopeError::Serialize {
                        path: display_path(path),
                        message: format!("unsupported tag !{name}"),
                    }
                })?;
                let payload = (handler.encode)(&tagged.value).map_err(|message| {
                    CiScopeError::Serialize {
                        path: display_path(path),
                        message,
                    }
                })?;
                Ok(format!("!{name} {payload}"))
            }
            Value::Mapping(_) | Value::Sequence(_) => Err(CiScopeError::Serialize {
                path: display_path(path),
                message: "block collection in inline position".to_string(),
            }),
        }
    }
}

/// Renders a scalar on a single line.
///
/// Quoting follows `serde_yaml`; strings that would need several lines are
/// written as double-quoted scalars instead.
fn scalar(value: &Value, path: &str) -> Result<String> {
    if let Value::String(s) = value {
        if s.contains(['\n', '\r']) {
            return Ok(serde_json::to_string(s)?);
        }
    }

    let rendered = serde_yaml::to_string(value).map_err(|err| CiScopeError::Serialize {
        path: display_path(path),
        message: err.to_string(),
    })?;
    let rendered = rendered.trim_end_matches('\n');

    if rendered.contains('\n') {
        return match value {
            Value::String(s) => Ok(serde_json::to_string(s)?),
            _ => Err(CiScopeError::Serialize {
                path: display_path(path),
                message: format!("cannot render scalar on one line: {rendered}"),
            }),
        };
    }

    Ok(rendered.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(text: &str) -> String {
        let codec = YamlCodec::gitlab();
        codec.dump(&codec.load(text).unwrap()).unwrap()
    }

    #[test]
    fn test_nested_block_layout() {
        let text = "\
stages:
- build
- test
build:
  stage: build
  needs: []
  cache: {}
  rules:
  - when: manual
    allow_failure: true
  - when: never
  matrix:
  - - a
    - b
  - - c
";
        assert_eq!(dump(text), text);
    }

    #[test]
    fn test_key_order_not_sorted() {
        let text = "zeta: 1\nalpha: 2\nmid:\n  z: true\n  a: false\n";
        assert_eq!(dump(text), text);
    }

    #[test]
    fn test_ambiguous_strings_stay_strings() {
        let codec = YamlCodec::gitlab();
        let value = codec.load("a: '1'\nb: 'true'\nc: ''\nd: 'x: y'\n").unwrap();
        let text = codec.dump(&value).unwrap();
        assert_eq!(codec.load(&text).unwrap(), value);
    }

    #[test]
    fn test_multiline_strings_are_quoted_on_one_line() {
        let codec = YamlCodec::gitlab();
        let value = codec.load("script: |\n  echo a\n  echo b\n").unwrap();
        let text = codec.dump(&value).unwrap();
        assert_eq!(text, "script: \"echo a\\necho b\\n\"\n");
        assert_eq!(codec.load(&text).unwrap(), value);
    }

    #[test]
    fn test_non_scalar_key_is_rejected() {
        let mut inner = Mapping::new();
        inner.insert(Value::Sequence(vec![Value::from("k")]), Value::from("v"));
        let mut root = Mapping::new();
        root.insert(Value::from("job"), Value::Mapping(inner));

        let err = YamlCodec::gitlab().dump_document(&root).unwrap_err();
        assert!(err.to_string().contains("mapping keys must be scalars"));
    }

    #[test]
    fn test_scalar_and_empty_roots() {
        let codec = YamlCodec::gitlab();
        assert_eq!(codec.dump(&Value::from("hello")).unwrap(), "hello\n");
        assert_eq!(codec.dump_document(&Mapping::new()).unwrap(), "{}\n");
    }
}
