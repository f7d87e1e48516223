//! The deploy action collaborator.
//!
//! What a deploy actually does lives outside this crate. The watcher only
//! needs something it can invoke when a push lands on the primary branch.

use std::future::Future;

use thiserror::Error;
use tracing::info;

/// Errors a deploy action can report.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The action ran and failed.
    #[error("deploy failed: {0}")]
    Failed(String),
}

/// A side effect triggered by a matching push.
///
/// # Example (recording action for testing)
///
/// ```ignore
/// struct CountingDeploy(AtomicUsize);
///
/// impl DeployAction for CountingDeploy {
///     async fn deploy(&self) -> Result<(), DeployError> {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
pub trait DeployAction {
    /// Runs the deploy.
    fn deploy(&self) -> impl Future<Output = Result<(), DeployError>> + Send;
}

/// Placeholder action that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDeploy;

impl DeployAction for NoopDeploy {
    async fn deploy(&self) -> Result<(), DeployError> {
        info!("Deploy function called (no-op)");
        Ok(())
    }
}
