//! Per-message processing for a fetched batch.
//!
//! Messages are handled in server order, one at a time. A failure on one
//! message is logged with its ID and never stops its siblings.

use thiserror::Error;
use tracing::{error, info, instrument};

use super::message::MessageEnvelope;
use crate::deploy::{ConditionEvaluator, DeployAction, DeployError, MatchResult};
use crate::webhooks::PushPayload;

/// Why a single message could not be processed.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The payload is not a JSON object.
    #[error("payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    /// The payload matched but the deploy failed.
    #[error(transparent)]
    Deploy(#[from] DeployError),
}

/// Counts for one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Messages that were decoded and evaluated.
    pub processed: usize,
    /// Of those, how many triggered a deploy.
    pub triggered: usize,
    /// Messages that failed to decode or whose deploy failed.
    pub failed: usize,
}

/// Feeds fetched messages through the deploy condition.
#[derive(Debug, Clone)]
pub struct MessageProcessor<A> {
    evaluator: ConditionEvaluator<A>,
}

impl<A: DeployAction> MessageProcessor<A> {
    pub fn new(evaluator: ConditionEvaluator<A>) -> Self {
        Self { evaluator }
    }

    /// Processes a batch sequentially, isolating failures per message.
    pub async fn process(&self, messages: &[MessageEnvelope]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for envelope in messages {
            match self.process_one(envelope).await {
                Ok(result) => {
                    summary.processed += 1;
                    if result.is_triggered() {
                        summary.triggered += 1;
                    }
                }
                Err(e) => {
                    error!(message_id = %envelope.id, error = %e, "Error processing message");
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// Decodes one envelope's payload and evaluates it.
    ///
    /// Payloads from the poller are not signature-checked; the delivery
    /// service is the trusted transport.
    #[instrument(skip(self, envelope), fields(message_id = %envelope.id))]
    pub async fn process_one(
        &self,
        envelope: &MessageEnvelope,
    ) -> Result<MatchResult, ProcessingError> {
        info!(event_type = ?envelope.event_type, "Processing message");
        let payload = PushPayload::from_value(envelope.payload.clone())?;
        Ok(self.evaluator.evaluate(&payload).await?)
    }
}
