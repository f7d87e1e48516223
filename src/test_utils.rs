//! Shared test doubles and proptest strategies.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use crate::deploy::{DEPLOY_REFS, DeployAction, DeployError};
use crate::poller::{BatchFetcher, FetchError, FetchResult};
use crate::types::Cursor;

/// Deploy action that counts invocations and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingDeploy {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingDeploy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DeployAction for RecordingDeploy {
    async fn deploy(&self) -> Result<(), DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(DeployError::Failed("simulated failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Fetcher that replays scripted results and records the cursor of each call.
///
/// Once the script runs out every fetch returns an empty, finished batch.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFetcher {
    script: Arc<Mutex<VecDeque<Result<FetchResult, FetchError>>>>,
    cursors: Arc<Mutex<Vec<Option<Cursor>>>>,
}

impl ScriptedFetcher {
    pub fn new(script: impl IntoIterator<Item = Result<FetchResult, FetchError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            cursors: Arc::default(),
        }
    }

    /// Cursors passed to each fetch so far, in call order.
    pub fn cursors(&self) -> Vec<Option<Cursor>> {
        self.cursors.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.cursors.lock().unwrap().len()
    }
}

impl BatchFetcher for ScriptedFetcher {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<FetchResult, FetchError> {
        self.cursors.lock().unwrap().push(cursor.cloned());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FetchResult::empty()))
    }
}

/// Fetcher whose requests never complete.
#[derive(Debug, Clone, Default)]
pub struct HangingFetcher {
    calls: Arc<AtomicUsize>,
}

impl HangingFetcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BatchFetcher for HangingFetcher {
    async fn fetch(&self, _cursor: Option<&Cursor>) -> Result<FetchResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub fn arb_git_ref() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(DEPLOY_REFS.to_vec()).prop_map(String::from),
        "refs/heads/[a-z0-9/_-]{1,20}".prop_map(String::from),
        "refs/tags/v[0-9]\\.[0-9]".prop_map(String::from),
        "[ -~]{0,30}".prop_map(String::from),
    ]
}
