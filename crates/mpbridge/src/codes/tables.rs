//! Code Table Types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse reply classifier shared by a family of commands
pub type GroupId = i64;

/// Group of replies that matched no table entry
pub const UNKNOWN_GROUP: GroupId = 0;

/// Group of device-reported errors (`NG` replies)
pub const ERROR_GROUP: GroupId = 1;

/// How a command parameter is rendered after the template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamFormat {
    /// Textual form of the parameter as received
    #[default]
    Literal,
    /// Numbers as upper-case hex, at least two digits
    Hex,
}

/// Outgoing command template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeEntry {
    pub template: String,
    pub param: ParamFormat,
}

/// Text placed around a value decoded through a prefix entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fences {
    pub before: String,
    pub after: String,
}

impl Fences {
    /// Fences described by a decode literal.
    ///
    /// A string is the leading fence; an object supplies `a` (before) and `b`
    /// (after). Anything else has no fences.
    pub fn from_literal(literal: &Value) -> Self {
        match literal {
            Value::String(before) => Self {
                before: before.clone(),
                after: String::new(),
            },
            Value::Object(map) => Self {
                before: map.get("a").map(fence_text).unwrap_or_default(),
                after: map.get("b").map(fence_text).unwrap_or_default(),
            },
            _ => Self::default(),
        }
    }

    pub fn wrap(&self, middle: &str) -> String {
        format!("{}{}{}", self.before, middle, self.after)
    }
}

fn fence_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Reply table entry, usable as an exact or a prefix match
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeEntry {
    pub group: GroupId,
    /// Value reported when the whole frame equals the key
    pub literal: Value,
    /// Fences used when only the key's prefix matched
    pub fences: Fences,
}

impl DecodeEntry {
    pub fn new(literal: Value, group: GroupId) -> Self {
        let fences = Fences::from_literal(&literal);
        Self {
            group,
            literal,
            fences,
        }
    }
}

/// The three protocol tables, immutable once built
#[derive(Debug, Clone, Default)]
pub struct CodeTables {
    pub(super) encode: HashMap<String, EncodeEntry>,
    pub(super) decode: HashMap<String, DecodeEntry>,
    pub(super) groups: HashMap<String, GroupId>,
}

impl CodeTables {
    /// Template for a command name
    pub fn encode(&self, name: &str) -> Option<&EncodeEntry> {
        self.encode.get(name)
    }

    /// Entry whose key equals the whole code
    pub fn decode_exact(&self, code: &str) -> Option<&DecodeEntry> {
        self.decode.get(code)
    }

    /// Entry keyed by a code prefix
    pub fn decode_prefix(&self, prefix: &str) -> Option<&DecodeEntry> {
        self.decode.get(prefix)
    }

    /// Group a reply to `name` must carry
    pub fn expected_group(&self, name: &str) -> Option<GroupId> {
        self.groups.get(name).copied()
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.encode.keys().map(String::as_str)
    }

    pub fn encode_len(&self) -> usize {
        self.encode.len()
    }

    pub fn decode_len(&self) -> usize {
        self.decode.len()
    }

    pub fn groups_len(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fences_from_string_literal() {
        let fences = Fences::from_literal(&json!("Serial number: "));
        assert_eq!(fences.before, "Serial number: ");
        assert_eq!(fences.after, "");
        assert_eq!(fences.wrap("ABC"), "Serial number: ABC");
    }

    #[test]
    fn test_fences_from_object_literal() {
        let fences = Fences::from_literal(&json!({"a": "Temperature: ", "b": " C"}));
        assert_eq!(fences.wrap("22"), "Temperature: 22 C");

        let partial = Fences::from_literal(&json!({"a": "Volume: "}));
        assert_eq!(partial.wrap("30"), "Volume: 30");
    }

    #[test]
    fn test_fences_from_other_literals() {
        assert_eq!(Fences::from_literal(&json!(5)), Fences::default());
        assert_eq!(Fences::from_literal(&json!(null)), Fences::default());
    }
}
