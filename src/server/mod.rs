//! Direct webhook receiver.
//!
//! Optional companion to the poller for deployments where the delivery
//! service can reach this host. Every delivery is signature-checked before its
//! payload is trusted.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Verifies and evaluates a signed push delivery
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::deploy::{ConditionEvaluator, DeployAction};
use crate::webhooks::WebhookVerifier;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{WebhookError, webhook_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
pub struct AppState<A> {
    inner: Arc<AppStateInner<A>>,
}

struct AppStateInner<A> {
    /// Verifier holding the shared webhook secret.
    verifier: WebhookVerifier,

    /// Condition and deploy action for verified payloads.
    evaluator: ConditionEvaluator<A>,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> AppState<A> {
    pub fn new(verifier: WebhookVerifier, evaluator: ConditionEvaluator<A>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                verifier,
                evaluator,
            }),
        }
    }

    pub fn verifier(&self) -> &WebhookVerifier {
        &self.inner.verifier
    }

    pub fn evaluator(&self) -> &ConditionEvaluator<A> {
        &self.inner.evaluator
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<A>(app_state: AppState<A>) -> axum::Router
where
    A: DeployAction + Send + Sync + 'static,
{
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler::<A>))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

/// Serves the router on `listener` until `shutdown` is cancelled.
pub async fn serve<A>(
    listener: TcpListener,
    app_state: AppState<A>,
    shutdown: CancellationToken,
) -> std::io::Result<()>
where
    A: DeployAction + Send + Sync + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Webhook receiver listening");
    }

    axum::serve(listener, build_router(app_state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Webhook receiver stopped");
    Ok(())
}
