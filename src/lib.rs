//! intra-deploy - watches a webhook message-delivery endpoint and deploys on
//! pushes to the primary branch.
//!
//! This library provides the polling state machine, payload handling and the
//! optional direct webhook receiver. `main.rs` wires them together.

pub mod config;
pub mod deploy;
pub mod poller;
pub mod server;
pub mod shutdown;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
