//! Newtype wrappers for delivery-service identifiers.
//!
//! These keep message identifiers and pagination cursors from being mixed up
//! with each other or with arbitrary strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The identifier of a message in the delivery service.
///
/// Used only for log correlation; never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(s: impl Into<String>) -> Self {
        MessageId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<no id>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        MessageId(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(s.to_string())
    }
}

/// An opaque pagination token handed out by the polling endpoint.
///
/// A cursor is only ever passed back verbatim on the next fetch. It is never
/// empty: an empty iterator from the server means "no cursor".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wraps a server-provided iterator, returning `None` for the empty string.
    pub fn from_iterator(iterator: impl Into<String>) -> Option<Self> {
        let iterator = iterator.into();
        if iterator.is_empty() {
            None
        } else {
            Some(Cursor(iterator))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
