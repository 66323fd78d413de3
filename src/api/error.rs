//! Error types for the API module.

use thiserror::Error;

/// Errors that can occur while talking to the document-search API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error calling {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout calling {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response the API did not explain with a body.
    #[error("HTTP {status} calling {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The edge in front of the API answered with an `error code:` page.
    #[error("upstream error page from {url}: {message}")]
    UpstreamErrorPage {
        /// The URL that returned the page.
        url: String,
        /// First line of the page.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Every attempt failed; carries the last failure.
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// The URL that kept failing.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// The final error.
        #[source]
        last: Box<ApiError>,
    },

    /// The response body is not the JSON shape we expected.
    #[error("malformed response from {route}: {source}")]
    Parse {
        /// Route that produced the body.
        route: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The API answered with an `errmsg` field instead of data.
    #[error("API error from {route}: {message}")]
    Remote {
        /// Route that produced the error.
        route: String,
        /// The `errmsg` value.
        message: String,
    },
}

impl ApiError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a parse error for the given route.
    pub fn parse(route: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            route: route.into(),
            source,
        }
    }

    /// Creates a remote (`errmsg`) error for the given route.
    pub fn remote(route: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            route: route.into(),
            message: message.into(),
        }
    }

    /// Returns true when the request never produced a usable body.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Parse { .. } | Self::Remote { .. })
    }
}
