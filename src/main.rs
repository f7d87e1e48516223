use std::process::ExitCode;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intra_deploy::config::Config;
use intra_deploy::deploy::{ConditionEvaluator, NoopDeploy};
use intra_deploy::poller::{HttpBatchFetcher, MessageProcessor, PollLoop};
use intra_deploy::server::{self, AppState};
use intra_deploy::shutdown::ShutdownController;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intra_deploy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) if e.is_missing() => {
            error!(error = %e, "Missing configuration, not starting");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(endpoint = %config.endpoint_url, "Starting poller");

    match run(config).await {
        Ok(()) => {
            info!("Shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

/// Runs the poller (and the webhook receiver, if configured) until a signal
/// arrives. A panic in either task surfaces here as an error.
async fn run(config: Config) -> anyhow::Result<()> {
    let controller = ShutdownController::new();
    let _signals = controller
        .listen_for_signals()
        .context("failed to install signal handlers")?;

    let receiver = match config.webhook {
        Some(webhook) => {
            let listener = TcpListener::bind(webhook.listen_addr)
                .await
                .with_context(|| format!("failed to bind {}", webhook.listen_addr))?;
            let state = AppState::new(webhook.verifier, ConditionEvaluator::new(NoopDeploy));
            let token = controller.token();
            Some(tokio::spawn(async move {
                let result = server::serve(listener, state, token.clone()).await;
                if let Err(e) = &result {
                    error!(error = %e, "Webhook receiver failed, shutting down");
                    token.cancel();
                }
                result
            }))
        }
        None => None,
    };

    let fetcher = HttpBatchFetcher::new(
        config.endpoint_url,
        config.api_key,
        config.poll.request_timeout,
    )
    .context("failed to build HTTP client")?;
    let processor = MessageProcessor::new(ConditionEvaluator::new(NoopDeploy));
    let mut poll_loop = PollLoop::new(fetcher, processor, &config.poll);

    let token = controller.token();
    let poller = tokio::spawn(async move { poll_loop.run(&token).await });
    let poll_result = poller.await;

    // Make sure the receiver follows the poller down.
    controller.shutdown();

    poll_result.context("poll loop terminated unexpectedly")?;
    if let Some(receiver) = receiver {
        receiver
            .await
            .context("webhook receiver terminated unexpectedly")?
            .context("webhook receiver failed")?;
    }

    Ok(())
}
