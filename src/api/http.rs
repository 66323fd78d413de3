//! HTTPS transport for the document-search API.
//!
//! Every route is called with a `POST`, the shared token in the
//! `Authorization` header, and bounded retries on transient failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tracing::{debug, info, instrument, warn};

use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error, classify_http_status};
use super::{ApiError, Transport};
use crate::user_agent;

/// Public API host.
pub const DEFAULT_BASE_URL: &str = "https://api.indiankanoon.org";

/// Default HTTP connect timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default HTTP read timeout in seconds (originals can be large PDFs).
pub const READ_TIMEOUT_SECS: u64 = 60;

/// Prefix of the plain-text pages the API's edge returns when overloaded.
const UPSTREAM_ERROR_PREFIX: &str = "error code:";

/// Settings for [`HttpTransport`].
#[derive(Clone)]
pub struct TransportConfig {
    /// Scheme and host, without a trailing route.
    pub base_url: String,
    /// Shared API token.
    pub token: String,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    pub read_timeout_secs: u64,
    /// Retry behaviour for transient failures.
    pub retry_policy: RetryPolicy,
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl TransportConfig {
    /// Config for the public host with default timeouts and retries.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Overrides the host (used by tests and self-hosted mirrors).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

/// Token-authenticated HTTPS transport with retry.
///
/// Created once and shared; the inner `reqwest::Client` pools connections.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    auth_header: String,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] if the HTTP client cannot be built.
    #[instrument(level = "debug", skip(config), fields(base_url = %config.base_url))]
    pub fn new(config: TransportConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(ApiError::ClientBuild)?;

        debug!(
            max_attempts = config.retry_policy.max_attempts(),
            retry_delay_ms = config.retry_policy.base_delay().as_millis(),
            "creating API transport"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: format!("Token {}", config.token),
            retry_policy: config.retry_policy,
        })
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    async fn send_once(&self, url: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::timeout(url)
                } else {
                    ApiError::network(url, e)
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::timeout(url)
            } else {
                ApiError::network(url, e)
            }
        })?;

        if !(200..300).contains(&status) {
            // The API explains most rejections (bad token, bad id) with an
            // `errmsg` body; those go back to the caller to interpret.
            if classify_http_status(status) == FailureType::Transient || body.trim().is_empty() {
                return Err(ApiError::http_status(url, status));
            }
            debug!(status, "non-success status with body");
        }

        if body.trim_start().starts_with(UPSTREAM_ERROR_PREFIX) {
            let message = body.lines().next().unwrap_or_default().trim().to_string();
            return Err(ApiError::UpstreamErrorPage {
                url: url.to_string(),
                message,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self), fields(route = %route))]
    async fn call(&self, route: &str) -> Result<String, ApiError> {
        let url = format!("{}{}", self.base_url, route);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "calling API");

            match self.send_once(&url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    let failure_type = classify_error(&e);
                    match self.retry_policy.should_retry(failure_type, attempt) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next_attempt,
                        } => {
                            info!(
                                url = %url,
                                attempt = next_attempt,
                                max_attempts = self.retry_policy.max_attempts(),
                                delay_ms = delay.as_millis(),
                                error = %e,
                                "retrying API call"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            warn!(url = %url, %reason, error = %e, "API call failed");
                            if failure_type == FailureType::Permanent {
                                return Err(e);
                            }
                            return Err(ApiError::RetriesExhausted {
                                url,
                                attempts: attempt,
                                last: Box::new(e),
                            });
                        }
                    }
                }
            }
        }
    }
}
