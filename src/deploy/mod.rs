//! Deploy triggering.
//!
//! - [`action`]: the deploy collaborator and its placeholder implementation
//! - [`condition`]: the branch-ref condition that decides when to call it

pub mod action;
pub mod condition;

pub use action::{DeployAction, DeployError, NoopDeploy};
pub use condition::{ConditionEvaluator, DEPLOY_REFS, MatchResult, is_deploy_ref};
