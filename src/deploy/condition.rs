//! Deploy trigger condition.
//!
//! A push triggers a deploy if and only if its ref is one of the primary
//! branch refs. A payload without a ref never matches.

use tracing::info;

use super::action::{DeployAction, DeployError};
use crate::webhooks::PushPayload;

/// Refs whose pushes trigger a deploy.
pub const DEPLOY_REFS: [&str; 2] = ["refs/heads/master", "refs/heads/main"];

/// Returns true if a push to `git_ref` should trigger a deploy.
pub fn is_deploy_ref(git_ref: Option<&str>) -> bool {
    git_ref.is_some_and(|r| DEPLOY_REFS.contains(&r))
}

/// Outcome of evaluating one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// The ref matched and the deploy action ran.
    Triggered { git_ref: String },

    /// The ref did not match (or was absent); nothing ran.
    Ignored { git_ref: Option<String> },
}

impl MatchResult {
    pub fn is_triggered(&self) -> bool {
        matches!(self, MatchResult::Triggered { .. })
    }
}

/// Decides whether a payload triggers a deploy, and runs it if so.
#[derive(Debug, Clone)]
pub struct ConditionEvaluator<A> {
    action: A,
}

impl<A: DeployAction> ConditionEvaluator<A> {
    pub fn new(action: A) -> Self {
        Self { action }
    }

    /// Evaluates a payload against the deploy condition.
    ///
    /// Missing fields are a non-match, never an error. The only failure is the
    /// deploy action itself failing.
    pub async fn evaluate(&self, payload: &PushPayload) -> Result<MatchResult, DeployError> {
        match payload.git_ref() {
            Some(git_ref) if is_deploy_ref(Some(git_ref)) => {
                info!(git_ref = %git_ref, "Push to primary branch detected, triggering deploy");
                self.action.deploy().await?;
                Ok(MatchResult::Triggered {
                    git_ref: git_ref.to_string(),
                })
            }
            other => {
                info!(git_ref = ?other, "Ignoring push");
                Ok(MatchResult::Ignored {
                    git_ref: other.map(str::to_string),
                })
            }
        }
    }
}
