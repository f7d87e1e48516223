//! Environment configuration.
//!
//! Configuration is read once at startup into a [`Config`] value that is
//! handed to the components that need it.
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `SVIX_ENDPOINT_URL` | yes | |
//! | `SVIX_API_KEY` | yes | |
//! | `INTRA_DEPLOY_POLL_INTERVAL_SECS` | no | 30 |
//! | `INTRA_DEPLOY_REQUEST_TIMEOUT_SECS` | no | 30 |
//! | `SVIX_WEBHOOK_SECRET` | no | receiver disabled |
//! | `INTRA_DEPLOY_LISTEN_ADDR` | no | `0.0.0.0:3000` |

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::poller::PollConfig;
use crate::webhooks::WebhookVerifier;

pub const ENV_ENDPOINT_URL: &str = "SVIX_ENDPOINT_URL";
pub const ENV_API_KEY: &str = "SVIX_API_KEY";
pub const ENV_POLL_INTERVAL_SECS: &str = "INTRA_DEPLOY_POLL_INTERVAL_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "INTRA_DEPLOY_REQUEST_TIMEOUT_SECS";
pub const ENV_WEBHOOK_SECRET: &str = "SVIX_WEBHOOK_SECRET";
pub const ENV_LISTEN_ADDR: &str = "INTRA_DEPLOY_LISTEN_ADDR";

/// Bind address for the webhook receiver when none is configured.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 3000);

/// Configuration problems found at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    /// A variable is set but its value is unusable.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    /// Returns true for an unset required variable.
    pub fn is_missing(&self) -> bool {
        matches!(self, ConfigError::Missing(_))
    }

    fn invalid(name: &'static str, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            name,
            reason: reason.to_string(),
        }
    }
}

/// Bearer token for the polling endpoint. Redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        ApiKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Settings for the direct webhook receiver.
#[derive(Debug, Clone)]
pub struct WebhookServerConfig {
    pub listen_addr: SocketAddr,
    pub verifier: WebhookVerifier,
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Polling endpoint.
    pub endpoint_url: Url,
    /// Bearer token for the polling endpoint.
    pub api_key: ApiKey,
    /// Loop pacing and request timeout.
    pub poll: PollConfig,
    /// Direct webhook receiver, if a secret is configured.
    pub webhook: Option<WebhookServerConfig>,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let endpoint = get(ENV_ENDPOINT_URL).ok_or(ConfigError::Missing(ENV_ENDPOINT_URL))?;
        let api_key = get(ENV_API_KEY).ok_or(ConfigError::Missing(ENV_API_KEY))?;

        let endpoint_url =
            Url::parse(endpoint.trim()).map_err(|e| ConfigError::invalid(ENV_ENDPOINT_URL, e))?;
        if !matches!(endpoint_url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                ENV_ENDPOINT_URL,
                format!("unsupported scheme {:?}", endpoint_url.scheme()),
            ));
        }

        let mut poll = PollConfig::new();
        if let Some(secs) = get(ENV_POLL_INTERVAL_SECS) {
            poll = poll.with_poll_interval(parse_secs(ENV_POLL_INTERVAL_SECS, &secs)?);
        }
        if let Some(secs) = get(ENV_REQUEST_TIMEOUT_SECS) {
            poll = poll.with_request_timeout(parse_secs(ENV_REQUEST_TIMEOUT_SECS, &secs)?);
        }

        let webhook = match get(ENV_WEBHOOK_SECRET) {
            Some(secret) => {
                let verifier = WebhookVerifier::new(secret.trim())
                    .map_err(|e| ConfigError::invalid(ENV_WEBHOOK_SECRET, e))?;
                let listen_addr = match get(ENV_LISTEN_ADDR) {
                    Some(addr) => addr
                        .trim()
                        .parse::<SocketAddr>()
                        .map_err(|e| ConfigError::invalid(ENV_LISTEN_ADDR, e))?,
                    None => DEFAULT_LISTEN_ADDR,
                };
                Some(WebhookServerConfig {
                    listen_addr,
                    verifier,
                })
            }
            None => None,
        };

        Ok(Config {
            endpoint_url,
            api_key: ApiKey::new(api_key),
            poll,
            webhook,
        })
    }
}

/// Parses a positive whole number of seconds.
fn parse_secs(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(name, e))?;
    if secs == 0 {
        return Err(ConfigError::invalid(name, "must be at least 1 second"));
    }
    Ok(Duration::from_secs(secs))
}
