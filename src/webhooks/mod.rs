//! Webhook payload handling.
//!
//! This module provides:
//! - Decoding of push payloads ([`PushPayload`])
//! - Signature verification for directly delivered webhooks

pub mod payload;
pub mod signature;

pub use payload::PushPayload;
pub use signature::{VerificationError, WebhookVerifier, parse_signature_header};
