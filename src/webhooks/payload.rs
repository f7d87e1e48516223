//! Decoded push payloads.
//!
//! Only the `ref` field matters for deploy decisions. Everything else the
//! sender includes is kept in a pass-through map so a payload survives a
//! decode/encode cycle unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A source-control push notification, decoded from a webhook payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    /// The pushed ref, e.g. `refs/heads/main`.
    ///
    /// Absent when the payload has no `ref` or when it is not a string.
    #[serde(
        rename = "ref",
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub git_ref: Option<String>,

    /// Every other field of the payload, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PushPayload {
    /// Creates a payload carrying only a ref.
    pub fn with_ref(git_ref: impl Into<String>) -> Self {
        PushPayload {
            git_ref: Some(git_ref.into()),
            extra: Map::new(),
        }
    }

    /// Decodes a payload that arrived already parsed.
    ///
    /// Fails if the value is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Decodes a payload from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn git_ref(&self) -> Option<&str> {
        self.git_ref.as_deref()
    }
}

/// Accepts any JSON value, keeping it only if it is a string.
fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}
