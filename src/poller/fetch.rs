//! Message batch fetching from the polling endpoint.
//!
//! One call is one authenticated `GET` against the endpoint, optionally
//! carrying the cursor from the previous batch as `?iterator=<cursor>`.
//! There are no retries here: the next scheduled poll is the retry.
//!
//! The response body has the shape
//!
//! ```json
//! { "data": [{ "id": "...", "payload": { ... } }], "iterator": "...", "done": false }
//! ```
//!
//! with `data` defaulting to empty, `iterator` to empty and `done` to `true`.
//! Only the top-level shape can make a body malformed; individual `data`
//! elements always decode (see [`MessageEnvelope`]).

use std::future::Future;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::message::MessageEnvelope;
use crate::config::ApiKey;
use crate::types::Cursor;

/// Query parameter carrying the cursor.
const ITERATOR_PARAM: &str = "iterator";

/// Errors from a single fetch. All of them are recoverable per cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout, or other transport failure.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    /// The body was not the expected JSON shape.
    #[error("malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),
}

/// One batch of messages and where to continue from.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// Messages in server order.
    pub messages: Vec<MessageEnvelope>,

    /// Cursor for the next page, if the server gave a non-empty one.
    pub next_cursor: Option<Cursor>,

    /// Whether the server has no more messages for now.
    ///
    /// When `true` the cursor is not advanced this cycle.
    pub done: bool,
}

impl FetchResult {
    /// The result used in place of a failed fetch: no messages, no cursor, done.
    pub fn empty() -> Self {
        FetchResult {
            messages: Vec::new(),
            next_cursor: None,
            done: true,
        }
    }

    /// Decodes a response body.
    pub(crate) fn decode(body: &[u8]) -> Result<Self, FetchError> {
        let parsed: PollResponse = serde_json::from_slice(body)?;
        Ok(parsed.into())
    }
}

/// Response body as sent on the wire.
#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(default)]
    data: Option<Vec<MessageEnvelope>>,
    #[serde(default)]
    iterator: Option<String>,
    #[serde(default)]
    done: Option<bool>,
}

impl From<PollResponse> for FetchResult {
    fn from(response: PollResponse) -> Self {
        FetchResult {
            messages: response.data.unwrap_or_default(),
            next_cursor: response.iterator.and_then(Cursor::from_iterator),
            done: response.done.unwrap_or(true),
        }
    }
}

/// Fetches one batch of messages.
///
/// Implementations perform a single round-trip per call and never retry.
pub trait BatchFetcher {
    /// Fetches the batch that follows `cursor`, or the current head if `None`.
    fn fetch(
        &self,
        cursor: Option<&Cursor>,
    ) -> impl Future<Output = Result<FetchResult, FetchError>> + Send;
}

/// Fetches batches over HTTP.
///
/// Owns a single `reqwest::Client` so connections are reused across polls.
#[derive(Clone)]
pub struct HttpBatchFetcher {
    client: reqwest::Client,
    endpoint: Url,
    api_key: ApiKey,
}

impl HttpBatchFetcher {
    /// Creates a fetcher whose requests time out after `request_timeout`.
    pub fn new(endpoint: Url, api_key: ApiKey, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, endpoint, api_key))
    }

    /// Creates a fetcher around a pre-configured client.
    pub fn with_client(client: reqwest::Client, endpoint: Url, api_key: ApiKey) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }
}

impl std::fmt::Debug for HttpBatchFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBatchFetcher")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl BatchFetcher for HttpBatchFetcher {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<FetchResult, FetchError> {
        let url = poll_url(&self.endpoint, cursor);
        debug!(cursor = ?cursor.map(Cursor::as_str), "Polling for messages");

        let response = self
            .client
            .get(url)
            .bearer_auth(self.api_key.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        FetchResult::decode(&body)
    }
}

/// Builds the request URL, appending the cursor when present.
///
/// The cursor is percent-encoded, so the server receives it byte for byte.
pub fn poll_url(endpoint: &Url, cursor: Option<&Cursor>) -> Url {
    let mut url = endpoint.clone();
    if let Some(cursor) = cursor {
        url.query_pairs_mut()
            .append_pair(ITERATOR_PARAM, cursor.as_str());
    }
    url
}
