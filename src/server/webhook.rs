//! Webhook endpoint handler.
//!
//! Verifies the delivery signature before anything else, then evaluates the
//! payload against the deploy condition inline.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::deploy::{DeployAction, DeployError, MatchResult};
use crate::webhooks::VerificationError;
use crate::webhooks::signature::HEADER_ID;

/// Errors that can occur when handling a direct delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The delivery failed verification.
    #[error("webhook verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// The payload matched but the deploy failed.
    #[error(transparent)]
    Deploy(#[from] DeployError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Verification(VerificationError::InvalidPayload(_)) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::Verification(VerificationError::InvalidSecret) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WebhookError::Verification(_) => StatusCode::UNAUTHORIZED,
            WebhookError::Deploy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Required headers: `svix-id`, `svix-timestamp`, `svix-signature`
///   (or their `webhook-*` equivalents)
/// - Body: JSON push payload
///
/// # Response
///
/// - 200 OK `triggered`: the push matched and the deploy ran
/// - 200 OK `ignored`: the push did not match
/// - 400 Bad Request: signed body is not a JSON object
/// - 401 Unauthorized: missing or invalid signature, or stale timestamp
/// - 500 Internal Server Error: the deploy failed
pub async fn webhook_handler<A>(
    State(app_state): State<AppState<A>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError>
where
    A: DeployAction + Send + Sync + 'static,
{
    let msg_id = headers
        .get(HEADER_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    debug!(msg_id = %msg_id, bytes = body.len(), "Received webhook");

    // Nothing about the payload is trusted until this succeeds.
    let payload = match app_state.verifier().verify(&body, &headers) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(msg_id = %msg_id, error = %e, "Webhook verification failed");
            return Err(e.into());
        }
    };

    match app_state.evaluator().evaluate(&payload).await? {
        MatchResult::Triggered { git_ref } => {
            info!(msg_id = %msg_id, git_ref = %git_ref, "Deploy triggered by webhook");
            Ok((StatusCode::OK, "triggered"))
        }
        MatchResult::Ignored { .. } => Ok((StatusCode::OK, "ignored")),
    }
}
