//! Webhook signature verification for the message-delivery service.
//!
//! Deliveries are signed with HMAC-SHA256 over `{msg_id}.{timestamp}.{body}`
//! using a shared secret. Three headers carry the signing metadata:
//!
//! - `svix-id`: the message identifier
//! - `svix-timestamp`: seconds since the Unix epoch
//! - `svix-signature`: space-separated `v1,<base64>` entries
//!
//! The unbranded `webhook-id`/`webhook-timestamp`/`webhook-signature` names are
//! accepted as well. Secrets are written as `whsec_<base64 key>`.
//!
//! Verification is the only gate for the direct webhook path. Messages fetched
//! by the poller arrive through the delivery service itself and are not
//! re-verified.

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::payload::PushPayload;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the message identifier.
pub const HEADER_ID: &str = "svix-id";
/// Header carrying the signing timestamp.
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
/// Header carrying one or more signatures.
pub const HEADER_SIGNATURE: &str = "svix-signature";

const UNBRANDED_HEADER_ID: &str = "webhook-id";
const UNBRANDED_HEADER_TIMESTAMP: &str = "webhook-timestamp";
const UNBRANDED_HEADER_SIGNATURE: &str = "webhook-signature";

/// Prefix on secrets as shown in the delivery service dashboard.
const SECRET_PREFIX: &str = "whsec_";

/// Only version 1 signatures are understood.
const SIGNATURE_VERSION: &str = "v1";

/// Maximum allowed clock skew between signer and verifier, in seconds.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

/// Reasons a delivery fails verification.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// A required signing header is absent or not valid UTF-8.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// The timestamp header is not an integer.
    #[error("invalid timestamp header: {0:?}")]
    InvalidTimestamp(String),

    /// The timestamp is further in the past than the tolerance allows.
    #[error("message timestamp too old")]
    TimestampTooOld,

    /// The timestamp is further in the future than the tolerance allows.
    #[error("message timestamp too new")]
    TimestampTooNew,

    /// No `v1` signature in the header matches the payload.
    #[error("no matching signature found")]
    NoMatchingSignature,

    /// The configured secret is not valid base64.
    #[error("invalid webhook secret")]
    InvalidSecret,

    /// The signature matched but the body is not a JSON object.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Verifies signed deliveries against a shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Creates a verifier from a secret in `whsec_<base64>` form.
    ///
    /// The `whsec_` prefix is optional.
    pub fn new(secret: &str) -> Result<Self, VerificationError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = STANDARD
            .decode(encoded)
            .map_err(|_| VerificationError::InvalidSecret)?;
        Ok(Self { key })
    }

    /// Creates a verifier from raw key bytes.
    pub fn from_key(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Verifies a delivery against the current time and decodes its payload.
    pub fn verify(
        &self,
        payload: &[u8],
        headers: &HeaderMap,
    ) -> Result<PushPayload, VerificationError> {
        self.verify_at(payload, headers, Utc::now())
    }

    /// Verifies a delivery as of `now` and decodes its payload.
    ///
    /// Checks run in order: headers present, timestamp within tolerance,
    /// signature match, payload decode. The payload is only parsed after the
    /// signature has been accepted.
    pub fn verify_at(
        &self,
        payload: &[u8],
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<PushPayload, VerificationError> {
        let msg_id = get_header(headers, HEADER_ID, UNBRANDED_HEADER_ID)?;
        let timestamp = get_header(headers, HEADER_TIMESTAMP, UNBRANDED_HEADER_TIMESTAMP)?;
        let signatures = get_header(headers, HEADER_SIGNATURE, UNBRANDED_HEADER_SIGNATURE)?;

        let timestamp: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| VerificationError::InvalidTimestamp(timestamp.to_string()))?;
        check_timestamp(timestamp, now)?;

        let mac = self.mac(msg_id, timestamp, payload)?;

        // verify_slice compares in constant time
        let matched = parse_signature_header(signatures)
            .any(|signature| mac.clone().verify_slice(&signature).is_ok());
        if !matched {
            return Err(VerificationError::NoMatchingSignature);
        }

        Ok(PushPayload::from_slice(payload)?)
    }

    /// Produces a `v1,<base64>` signature for a delivery.
    ///
    /// Mostly useful for tests and for replaying deliveries by hand.
    pub fn sign(
        &self,
        msg_id: &str,
        timestamp: i64,
        payload: &[u8],
    ) -> Result<String, VerificationError> {
        let signature = self.mac(msg_id, timestamp, payload)?.finalize().into_bytes();
        Ok(format!("{SIGNATURE_VERSION},{}", STANDARD.encode(signature)))
    }

    fn mac(
        &self,
        msg_id: &str,
        timestamp: i64,
        payload: &[u8],
    ) -> Result<HmacSha256, VerificationError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| VerificationError::InvalidSecret)?;
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

/// Parses a signature header into the raw bytes of each `v1` entry.
///
/// Entries with another version or undecodable base64 are skipped.
pub fn parse_signature_header(header: &str) -> impl Iterator<Item = Vec<u8>> + '_ {
    header.split_whitespace().filter_map(|entry| {
        let (version, signature) = entry.split_once(',')?;
        if version != SIGNATURE_VERSION {
            return None;
        }
        STANDARD.decode(signature).ok()
    })
}

fn check_timestamp(timestamp: i64, now: DateTime<Utc>) -> Result<(), VerificationError> {
    let now = now.timestamp();
    if now.saturating_sub(timestamp) > TIMESTAMP_TOLERANCE_SECS {
        return Err(VerificationError::TimestampTooOld);
    }
    if timestamp.saturating_sub(now) > TIMESTAMP_TOLERANCE_SECS {
        return Err(VerificationError::TimestampTooNew);
    }
    Ok(())
}

/// Looks up a header by its branded name, falling back to the unbranded one.
fn get_header<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
    fallback: &'static str,
) -> Result<&'a str, VerificationError> {
    headers
        .get(name)
        .or_else(|| headers.get(fallback))
        .and_then(|v| v.to_str().ok())
        .ok_or(VerificationError::MissingHeader(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Published example from the delivery service's manual verification guide.
    const DOC_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const DOC_MSG_ID: &str = "msg_p5jXN8AQM9LWM0D4loKWxJek";
    const DOC_TIMESTAMP: i64 = 1614265330;
    const DOC_PAYLOAD: &[u8] = br#"{"test": 2432232314}"#;
    const DOC_SIGNATURE: &str = "v1,g0hM9SsE+OTPJTGt/tmIKtSyZlE3uFJELVlNIOLJ1OE=";

    fn at(timestamp: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(timestamp, 0).unwrap()
    }

    fn signed_headers(msg_id: &str, timestamp: i64, signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, msg_id.parse().unwrap());
        headers.insert(HEADER_TIMESTAMP, timestamp.to_string().parse().unwrap());
        headers.insert(HEADER_SIGNATURE, signature.parse().unwrap());
        headers
    }

    fn sign_push(verifier: &WebhookVerifier, timestamp: i64, body: &[u8]) -> HeaderMap {
        let signature = verifier.sign("msg_1", timestamp, body).unwrap();
        signed_headers("msg_1", timestamp, &signature)
    }

    #[test]
    fn documented_example_signature_matches() {
        let verifier = WebhookVerifier::new(DOC_SECRET).unwrap();
        let signature = verifier.sign(DOC_MSG_ID, DOC_TIMESTAMP, DOC_PAYLOAD).unwrap();
        assert_eq!(signature, DOC_SIGNATURE);
    }

    #[test]
    fn documented_example_verifies() {
        let verifier = WebhookVerifier::new(DOC_SECRET).unwrap();
        let headers = signed_headers(DOC_MSG_ID, DOC_TIMESTAMP, DOC_SIGNATURE);

        let payload = verifier
            .verify_at(DOC_PAYLOAD, &headers, at(DOC_TIMESTAMP))
            .unwrap();
        assert_eq!(payload.git_ref(), None);
        assert!(payload.extra.contains_key("test"));
    }

    #[test]
    fn secret_prefix_is_optional() {
        let with_prefix = WebhookVerifier::new(DOC_SECRET).unwrap();
        let without_prefix = WebhookVerifier::new(&DOC_SECRET[SECRET_PREFIX.len()..]).unwrap();
        assert_eq!(with_prefix.key, without_prefix.key);
    }

    #[test]
    fn invalid_secret_is_rejected() {
        assert!(matches!(
            WebhookVerifier::new("whsec_not base64!"),
            Err(VerificationError::InvalidSecret)
        ));
    }

    #[test]
    fn push_payload_is_decoded_after_verification() {
        let verifier = WebhookVerifier::from_key(b"secret".to_vec());
        let body = br#"{"ref":"refs/heads/main","after":"abc"}"#;
        let headers = sign_push(&verifier, 1_700_000_000, body);

        let payload = verifier.verify_at(body, &headers, at(1_700_000_000)).unwrap();
        assert_eq!(payload.git_ref(), Some("refs/heads/main"));
    }

    #[test]
    fn unbranded_headers_are_accepted() {
        let verifier = WebhookVerifier::from_key(b"secret".to_vec());
        let body = br#"{"ref":"refs/heads/main"}"#;
        let signature = verifier.sign("msg_1", 1_700_000_000, body).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("webhook-id", "msg_1".parse().unwrap());
        headers.insert("webhook-timestamp", "1700000000".parse().unwrap());
        headers.insert("webhook-signature", signature.parse().unwrap());

        assert!(verifier.verify_at(body, &headers, at(1_700_000_000)).is_ok());
    }

    #[test]
    fn missing_headers_are_reported() {
        let verifier = WebhookVerifier::from_key(b"secret".to_vec());
        let mut headers = sign_push(&verifier, 1_700_000_000, b"{}");

        headers.remove(HEADER_SIGNATURE);
        assert!(matches!(
            verifier.verify_at(b"{}", &headers, at(1_700_000_000)),
            Err(VerificationError::MissingHeader(HEADER_SIGNATURE))
        ));

        assert!(matches!(
            verifier.verify_at(b"{}", &HeaderMap::new(), at(1_700_000_000)),
            Err(VerificationError::MissingHeader(HEADER_ID))
        ));
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        let verifier = WebhookVerifier::from_key(b"secret".to_vec());
        let mut headers = sign_push(&verifier, 1_700_000_000, b"{}");
        headers.insert(HEADER_TIMESTAMP, "yesterday".parse().unwrap());

        assert!(matches!(
            verifier.verify_at(b"{}", &headers, at(1_700_000_000)),
            Err(VerificationError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn timestamp_outside_tolerance_is_rejected() {
        let verifier = WebhookVerifier::from_key(b"secret".to_vec());
        let signed_at = 1_700_000_000;
        let headers = sign_push(&verifier, signed_at, b"{}");

        let too_late = at(signed_at + TIMESTAMP_TOLERANCE_SECS + 1);
        assert!(matches!(
            verifier.verify_at(b"{}", &headers, too_late),
            Err(VerificationError::TimestampTooOld)
        ));

        let too_early = at(signed_at - TIMESTAMP_TOLERANCE_SECS - 1);
        assert!(matches!(
            verifier.verify_at(b"{}", &headers, too_early),
            Err(VerificationError::TimestampTooNew)
        ));
    }

    #[test]
    fn timestamp_at_tolerance_edge_is_accepted() {
        let verifier = WebhookVerifier::from_key(b"secret".to_vec());
        let signed_at = 1_700_000_000;
        let headers = sign_push(&verifier, signed_at, b"{}");

        assert!(
            verifier
                .verify_at(b"{}", &headers, at(signed_at + TIMESTAMP_TOLERANCE_SECS))
                .is_ok()
        );
        assert!(
            verifier
                .verify_at(b"{}", &headers, at(signed_at - TIMESTAMP_TOLERANCE_SECS))
                .is_ok()
        );
    }

    #[test]
    fn any_matching_signature_passes() {
        let verifier = WebhookVerifier::from_key(b"secret".to_vec());
        let body = b"{}";
        let good = verifier.sign("msg_1", 1_700_000_000, body).unwrap();
        let header = format!("v1,Zm9vYmFy v2,ignored {good}");
        let headers = signed_headers("msg_1", 1_700_000_000, &header);

        assert!(verifier.verify_at(body, &headers, at(1_700_000_000)).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let verifier = WebhookVerifier::from_key(b"secret".to_vec());
        let headers = sign_push(&verifier, 1_700_000_000, br#"{"ref":"refs/heads/dev"}"#);

        assert!(matches!(
            verifier.verify_at(br#"{"ref":"refs/heads/main"}"#, &headers, at(1_700_000_000)),
            Err(VerificationError::NoMatchingSignature)
        ));
    }

    #[test]
    fn signed_non_object_body_is_invalid_payload() {
        let verifier = WebhookVerifier::from_key(b"secret".to_vec());
        let headers = sign_push(&verifier, 1_700_000_000, b"[]");

        assert!(matches!(
            verifier.verify_at(b"[]", &headers, at(1_700_000_000)),
            Err(VerificationError::InvalidPayload(_))
        ));
    }

    #[test]
    fn parse_signature_header_skips_unknown_entries() {
        let parsed: Vec<_> = parse_signature_header("v2,AAAA v1 v1,!!!! v1,AQID").collect();
        assert_eq!(parsed, vec![vec![1, 2, 3]]);
    }

    proptest! {
        /// Property: a delivery signed with the verifier's key always verifies.
        #[test]
        fn prop_sign_verify_roundtrip(
            key in any::<Vec<u8>>(),
            body in any::<Vec<u8>>(),
            ts in 0i64..4_000_000_000
        ) {
            let verifier = WebhookVerifier::from_key(key);
            let headers = sign_push(&verifier, ts, &body);
            let result = verifier.verify_at(&body, &headers, at(ts));
            // Arbitrary bytes are rarely a JSON object, so only the signature
            // stage is asserted on.
            prop_assert!(!matches!(result, Err(VerificationError::NoMatchingSignature)));
        }

        /// Property: a different key never verifies.
        #[test]
        fn prop_wrong_key_fails(key1: [u8; 32], key2: [u8; 32], body: Vec<u8>) {
            prop_assume!(key1 != key2);
            let signer = WebhookVerifier::from_key(key1.to_vec());
            let verifier = WebhookVerifier::from_key(key2.to_vec());
            let headers = sign_push(&signer, 1_700_000_000, &body);
            prop_assert!(matches!(
                verifier.verify_at(&body, &headers, at(1_700_000_000)),
                Err(VerificationError::NoMatchingSignature)
            ));
        }

        /// Property: malformed signature headers never panic.
        #[test]
        fn prop_malformed_header_no_panic(header in "[ -~]{0,80}", body in any::<Vec<u8>>()) {
            let verifier = WebhookVerifier::from_key(b"secret".to_vec());
            let _ = parse_signature_header(&header).count();
            let headers = signed_headers("msg_1", 1_700_000_000, &header);
            let _ = verifier.verify_at(&body, &headers, at(1_700_000_000));
        }
    }
}
