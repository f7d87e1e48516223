//! Polling for queued webhook messages.
//!
//! # Module Structure
//!
//! - [`fetch`]: one round-trip against the polling endpoint
//! - [`message`]: message envelopes
//! - [`process`]: per-message decoding and evaluation with failure isolation
//! - [`poll`]: interval and timeout configuration
//! - [`poll_loop`]: the cursor-tracking loop tying it all together

pub mod fetch;
pub mod message;
pub mod poll;
pub mod poll_loop;
pub mod process;


pub use fetch::{BatchFetcher, FetchError, FetchResult, HttpBatchFetcher, poll_url};
pub use message::MessageEnvelope;
pub use poll::PollConfig;
pub use poll_loop::{CycleReport, LoopState, PollLoop, PollState, next_cursor};
pub use process::{BatchSummary, MessageProcessor, ProcessingError};
