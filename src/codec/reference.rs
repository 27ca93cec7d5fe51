use std::fmt;

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::Value;

use super::{tag_name, TagHandler};

/// Tag name of GitLab's `!reference [job, key, ...]` construct.
pub const REFERENCE_TAG: &str = "reference";

/// A GitLab `!reference` pointing at another job's field.
///
/// The path is kept verbatim; merging and resolution never interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitLabReference(Vec<String>);

impl GitLabReference {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Extracts a reference from a decoded `!reference` node.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Tagged(tagged) if tag_name(&tagged.tag) == REFERENCE_TAG => {
                Self::from_payload(&tagged.value).ok()
            }
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(REFERENCE_TAG),
            value: self.payload(),
        }))
    }

    fn from_payload(payload: &Value) -> Result<Self, String> {
        let Value::Sequence(items) = payload else {
            return Err(format!(
                "!{REFERENCE_TAG} expects a sequence, found {}",
                kind(payload)
            ));
        };

        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                Value::Null => Ok("null".to_string()),
                other => Err(format!(
                    "!{REFERENCE_TAG} items must be scalars, found {}",
                    kind(other)
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    fn payload(&self) -> Value {
        Value::Sequence(self.0.iter().cloned().map(Value::String).collect())
    }

    /// Flow-style payload text, e.g. `[.setup, script]`.
    fn flow(&self) -> String {
        let items: Vec<String> = self.0.iter().map(String::as_str).map(flow_item).collect();
        format!("[{}]", items.join(", "))
    }
}

impl fmt::Display for GitLabReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{REFERENCE_TAG} {}", self.flow())
    }
}

pub(super) fn handler() -> TagHandler {
    TagHandler {
        tag: REFERENCE_TAG,
        decode: decode_reference,
        encode: encode_reference,
    }
}

fn decode_reference(payload: &Value) -> Result<Value, String> {
    GitLabReference::from_payload(payload).map(|reference| reference.payload())
}

fn encode_reference(payload: &Value) -> Result<String, String> {
    GitLabReference::from_payload(payload).map(|reference| reference.flow())
}

fn flow_item(part: &str) -> String {
    if is_plain_flow_safe(part) && reads_back_as_string(part) {
        part.to_string()
    } else {
        serde_json::Value::String(part.to_string()).to_string()
    }
}

fn is_plain_flow_safe(part: &str) -> bool {
    let Some(first) = part.chars().next() else {
        return false;
    };

    part.trim() == part
        && !"-?:,[]{}#&*!|>'\"%@`".contains(first)
        && !part.contains([',', '[', ']', '{', '}', '\n', '\r', '\t'])
        && !part.contains(": ")
        && !part.contains(" #")
        && !part.ends_with(':')
}

/// Whether `part` written plain loads again as the same string, so items
/// like `1e3`, `0x10`, `true` or `null` stay quoted.
fn reads_back_as_string(part: &str) -> bool {
    matches!(
        serde_yaml::from_str::<Value>(part),
        Ok(Value::String(ref loaded)) if loaded == part
    )
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
