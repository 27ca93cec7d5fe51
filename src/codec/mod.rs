//! YAML loading and alias-free dumping for CI documents.
//!
//! Custom tags are handled through an explicit table of [`TagHandler`]s owned
//! by each [`YamlCodec`] instead of process-wide loader/dumper state. The
//! dumper writes every node out in full, so content shared between jobs after
//! merging never turns into `&anchor`/`*alias` pairs, and mapping key order is
//! kept exactly as in memory.

mod emitter;
mod reference;

use std::fmt;

use log::debug;
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};

use crate::error::{CiScopeError, Result};

pub use reference::{GitLabReference, REFERENCE_TAG};

/// Validates and normalizes a tagged node's payload on load.
pub type DecodeFn = fn(&Value) -> std::result::Result<Value, String>;

/// Renders a tagged node's payload as inline text on dump.
pub type EncodeFn = fn(&Value) -> std::result::Result<String, String>;

/// Load/dump behaviour for one custom tag.
#[derive(Clone, Copy)]
pub struct TagHandler {
    /// Tag name without the leading `!`
    pub tag: &'static str,
    pub decode: DecodeFn,
    pub encode: EncodeFn,
}

impl fmt::Debug for TagHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagHandler").field("tag", &self.tag).finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct YamlCodec {
    handlers: Vec<TagHandler>,
}

impl YamlCodec {
    /// A codec without custom tags.
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec understanding GitLab's `!reference` tag.
    pub fn gitlab() -> Self {
        Self::new().with_handler(reference::handler())
    }

    /// Registers `handler`, replacing any handler for the same tag.
    #[must_use]
    pub fn with_handler(mut self, handler: TagHandler) -> Self {
        self.handlers.retain(|existing| existing.tag != handler.tag);
        self.handlers.push(handler);
        self
    }

    fn handler(&self, tag: &Tag) -> Option<&TagHandler> {
        let name = tag_name(tag);
        self.handlers.iter().find(|handler| handler.tag == name)
    }

    /// Parses YAML text, decoding registered tags.
    ///
    /// Tags without a handler are kept as they are.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML or a registered tag's
    /// payload is malformed.
    pub fn load(&self, text: &str) -> Result<Value> {
        let mut value: Value = serde_yaml::from_str(text)?;
        // `<<` merge keys are folded in before anything reads the document.
        value.apply_merge()?;
        self.decode_node(value, "")
    }

    /// Parses a YAML document whose root must be a mapping.
    ///
    /// An empty document yields an empty mapping.
    pub fn load_document(&self, text: &str) -> Result<Mapping> {
        match self.load(text)? {
            Value::Mapping(document) => Ok(document),
            Value::Null => Ok(Mapping::new()),
            _ => Err(CiScopeError::Parse {
                path: display_path(""),
                message: "document root must be a mapping".to_string(),
            }),
        }
    }

    /// Serializes `value` as block-style YAML without anchors or aliases.
    ///
    /// # Errors
    ///
    /// Returns an error for tags without a registered handler and for mapping
    /// keys that are not scalars.
    pub fn dump(&self, value: &Value) -> Result<String> {
        emitter::emit(self, value)
    }

    pub fn dump_document(&self, document: &Mapping) -> Result<String> {
        emitter::emit_mapping(self, document)
    }

    fn decode_node(&self, value: Value, path: &str) -> Result<Value> {
        match value {
            Value::Sequence(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| self.decode_node(item, &index_path(path, index)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            Value::Mapping(map) => {
                let mut decoded = Mapping::with_capacity(map.len());
                for (key, item) in map {
                    let child = key_path(path, &key);
                    decoded.insert(key, self.decode_node(item, &child)?);
                }
                Ok(Value::Mapping(decoded))
            }
            Value::Tagged(tagged) => {
                let TaggedValue { tag, value } = *tagged;
                let value = match self.handler(&tag) {
                    Some(handler) => {
                        (handler.decode)(&value).map_err(|message| CiScopeError::Parse {
                            path: display_path(path),
                            message,
                        })?
                    }
                    None => {
                        debug!("No handler for tag {tag} at {}", display_path(path));
                        self.decode_node(value, path)?
                    }
                };
                Ok(Value::Tagged(Box::new(TaggedValue { tag, value })))
            }
            scalar => Ok(scalar),
        }
    }
}

/// Tag name without the leading `!`.
pub(crate) fn tag_name(tag: &Tag) -> String {
    tag.to_string().trim_start_matches('!').to_string()
}

fn key_path(parent: &str, key: &Value) -> String {
    let key = match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "~".to_string(),
        _ => "?".to_string(),
    };

    if parent.is_empty() {
        key
    } else {
        format!("{parent}.{key}")
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}
