//! Polling configuration.
//!
//! # Pacing
//!
//! - **Poll interval**: fixed pause after every cycle, 30 seconds by default
//!   (`INTRA_DEPLOY_POLL_INTERVAL_SECS`)
//! - **Request timeout**: bound on a single fetch, 30 seconds by default
//!   (`INTRA_DEPLOY_REQUEST_TIMEOUT_SECS`)
//!
//! The interval is a pause, not a schedule: the next fetch starts one interval
//! after the previous cycle finished, so cycles can never overlap.

use std::time::Duration;

/// Default pause between poll cycles (30 seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Default timeout for a single fetch (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration for the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub poll_interval: Duration,

    /// Upper bound on one fetch round-trip, including reading the body.
    pub request_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PollConfig {
    /// Creates a new `PollConfig` with default values.
    pub fn new() -> Self {
        PollConfig {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}
