//! Message envelopes returned by the polling endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::MessageId;

/// A message as delivered by the polling endpoint.
///
/// The envelope is trusted transport: its payload is decoded directly,
/// without signature verification. Envelopes are never modified after they
/// are fetched.
///
/// Decoding an element of the batch never fails, so one bad element cannot
/// sink its siblings. A non-string scalar `id` is kept in its JSON text form.
/// An element that is not an object has no recoverable ID and is carried
/// whole as the payload, where it fails to decode like any other non-object
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct MessageEnvelope {
    /// Delivery-service message ID. Empty if the server omitted it.
    pub id: MessageId,

    /// The embedded webhook payload. Defaults to an empty object.
    pub payload: Value,

    /// Event type label assigned by the sender, if any.
    #[serde(rename = "eventType", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Server-side creation time, kept as sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl MessageEnvelope {
    /// Creates an envelope with just an ID and payload.
    pub fn new(id: impl Into<MessageId>, payload: Value) -> Self {
        MessageEnvelope {
            id: id.into(),
            payload,
            event_type: None,
            timestamp: None,
        }
    }
}

impl From<Value> for MessageEnvelope {
    fn from(element: Value) -> Self {
        let mut fields = match element {
            Value::Object(fields) => fields,
            other => return MessageEnvelope::new(MessageId::default(), other),
        };

        let id = match fields.remove("id") {
            Some(Value::String(s)) => MessageId(s),
            Some(scalar @ (Value::Number(_) | Value::Bool(_))) => MessageId(scalar.to_string()),
            _ => MessageId::default(),
        };
        let payload = fields.remove("payload").unwrap_or_else(empty_object);

        MessageEnvelope {
            id,
            payload,
            event_type: string_field(&fields, "eventType"),
            timestamp: string_field(&fields, "timestamp"),
        }
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
