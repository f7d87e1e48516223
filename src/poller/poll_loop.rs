//! The poll loop state machine.
//!
//! # Cycle
//!
//! Each iteration while `Running`:
//! 1. **Fetch** a batch with the current cursor. A failed fetch is logged and
//!    treated as an empty, finished batch.
//! 2. **Dispatch** the messages to the processor (failures stay per message).
//! 3. **Advance**: keep the server's cursor only if the batch is not done and
//!    the cursor is non-empty; otherwise reset to no cursor.
//! 4. **Wait** one poll interval.
//!
//! # Cancellation
//!
//! The loop watches the shutdown token during the fetch and during the wait,
//! so it stops promptly whether it is blocked on the network or sleeping. A
//! batch that has been fetched is always dispatched to completion first.
//!
//! # Delivery guarantees
//!
//! The cursor lives in memory only. After a restart, or after a finished or
//! failed fetch, polling resumes from the server's head. Messages may be
//! delivered again or skipped across those boundaries.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::fetch::{BatchFetcher, FetchError, FetchResult};
use super::poll::PollConfig;
use super::process::{BatchSummary, MessageProcessor};
use crate::deploy::DeployAction;
use crate::types::Cursor;

/// Lifecycle of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Polling continuously.
    Running,
    /// Terminal; entered only on cancellation.
    Stopped,
}

/// Mutable polling state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    /// Cursor to send on the next fetch.
    pub current_cursor: Option<Cursor>,
    /// Pause after each cycle.
    pub interval: Duration,
}

/// What happened in one fetch/dispatch/advance cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Messages in the fetched batch.
    pub fetched: usize,
    /// Whether the fetch failed and was replaced by an empty batch.
    pub fetch_failed: bool,
    /// Processing counts.
    pub summary: BatchSummary,
    /// Cursor the next fetch will use.
    pub next_cursor: Option<Cursor>,
}

/// Decides the cursor for the next fetch.
///
/// The server's cursor is followed only while it reports more data.
pub fn next_cursor(result: &FetchResult) -> Option<Cursor> {
    if result.done {
        None
    } else {
        result.next_cursor.clone()
    }
}

/// Drives fetching, processing and pacing.
///
/// The loop exclusively owns its fetcher (and the HTTP client inside it), so no
/// synchronization is needed between cycles.
pub struct PollLoop<F, A> {
    fetcher: F,
    processor: MessageProcessor<A>,
    state: PollState,
    lifecycle: LoopState,
}

impl<F, A> PollLoop<F, A>
where
    F: BatchFetcher,
    A: DeployAction,
{
    /// Creates a loop with no cursor.
    pub fn new(fetcher: F, processor: MessageProcessor<A>, config: &PollConfig) -> Self {
        Self {
            fetcher,
            processor,
            state: PollState {
                current_cursor: None,
                interval: config.poll_interval,
            },
            lifecycle: LoopState::Running,
        }
    }

    /// Cursor the next fetch will use.
    pub fn cursor(&self) -> Option<&Cursor> {
        self.state.current_cursor.as_ref()
    }

    pub fn lifecycle(&self) -> LoopState {
        self.lifecycle
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Nothing inside a cycle can end the loop; the only exit is cancellation.
    #[instrument(skip_all, fields(interval_secs = self.state.interval.as_secs()))]
    pub async fn run(&mut self, shutdown: &CancellationToken) {
        info!("Poll loop started");

        loop {
            let fetched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested during fetch");
                    break;
                }
                result = self.fetcher.fetch(self.state.current_cursor.as_ref()) => result,
            };

            self.complete_cycle(fetched).await;

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested during wait");
                    break;
                }
                _ = tokio::time::sleep(self.state.interval) => {}
            }
        }

        self.lifecycle = LoopState::Stopped;
        info!("Poll loop stopped");
    }

    /// Runs a single fetch/dispatch/advance cycle without waiting.
    pub async fn poll_once(&mut self) -> CycleReport {
        let fetched = self.fetcher.fetch(self.state.current_cursor.as_ref()).await;
        self.complete_cycle(fetched).await
    }

    /// Dispatches a fetched batch and advances the cursor.
    async fn complete_cycle(&mut self, fetched: Result<FetchResult, FetchError>) -> CycleReport {
        let (batch, fetch_failed) = match fetched {
            Ok(batch) => (batch, false),
            Err(e) => {
                warn!(
                    error = %e,
                    cursor = ?self.state.current_cursor.as_ref().map(Cursor::as_str),
                    "Error polling messages"
                );
                (FetchResult::empty(), true)
            }
        };

        let summary = if batch.messages.is_empty() {
            BatchSummary::default()
        } else {
            self.processor.process(&batch.messages).await
        };

        self.state.current_cursor = next_cursor(&batch);

        debug!(
            fetched = batch.messages.len(),
            processed = summary.processed,
            triggered = summary.triggered,
            failed = summary.failed,
            cursor = ?self.state.current_cursor.as_ref().map(Cursor::as_str),
            "Poll cycle complete"
        );

        CycleReport {
            fetched: batch.messages.len(),
            fetch_failed,
            summary,
            next_cursor: self.state.current_cursor.clone(),
        }
    }
}

impl<F: std::fmt::Debug, A> std::fmt::Debug for PollLoop<F, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollLoop")
            .field("fetcher", &self.fetcher)
            .field("state", &self.state)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}
