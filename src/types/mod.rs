//! Core identifier types for the deploy watcher.

pub mod ids;

pub use ids::{Cursor, MessageId};
