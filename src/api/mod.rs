//! Client for the document-search API.
//!
//! The API is a family of path-based routes that all answer a `POST` with a
//! JSON payload:
//!
//! - `/doc/<id>/` - full document (HTML body plus metadata)
//! - `/docmeta/<id>/` - metadata only
//! - `/origdoc/<id>/` - original court copy, base64-encoded
//! - `/docfragment/<id>/?formInput=<q>` - fragments matching a query
//! - `/search/?formInput=<q>&pagenum=<n>&maxpages=<m>` - one result page
//!
//! [`ApiClient`] builds those routes and hands them to a [`Transport`]. The
//! production transport is [`HttpTransport`]; tests substitute an in-memory
//! one.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ikfetch_core::api::{ApiClient, HttpTransport, TransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(TransportConfig::new("my-token"))?;
//! let client = ApiClient::new(Arc::new(transport));
//! let page = client.search("right to privacy", 0, 1).await?;
//! println!("{} results on the first page", page.docs.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod http;
mod response;
mod retry;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

pub use error::ApiError;
pub use http::{
    CONNECT_TIMEOUT_SECS, DEFAULT_BASE_URL, HttpTransport, READ_TIMEOUT_SECS, TransportConfig,
};
pub use response::{
    ApiPayload, DocId, DocumentBody, OpaquePayload, OriginalPayload, ResultEntry, SearchPage,
    parse_payload,
};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, FailureType, RetryDecision, RetryPolicy,
    classify_error,
};

/// One request/response exchange with the API.
///
/// `route` is the path plus query string (e.g. `/doc/42/`). Implementations
/// own retrying: an `Err` means the call is finished failing.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Performs the call and returns the raw body text.
    async fn call(&self, route: &str) -> Result<String, ApiError>;
}

/// Route builder and typed entry point over a [`Transport`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    max_cites: u32,
    max_cited_by: u32,
}

impl ApiClient {
    /// Creates a client without citation limits.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            max_cites: 0,
            max_cited_by: 0,
        }
    }

    /// Sets how many cites / cited-by entries the API embeds per document.
    /// Zero leaves the API default.
    #[must_use]
    pub fn with_citation_limits(mut self, max_cites: u32, max_cited_by: u32) -> Self {
        self.max_cites = max_cites;
        self.max_cited_by = max_cited_by;
        self
    }

    /// `/doc/<id>/` with citation limits.
    #[must_use]
    pub fn doc_route(&self, id: DocId) -> String {
        self.with_limits(format!("/doc/{id}/"))
    }

    /// `/docmeta/<id>/` with citation limits.
    #[must_use]
    pub fn docmeta_route(&self, id: DocId) -> String {
        self.with_limits(format!("/docmeta/{id}/"))
    }

    /// `/origdoc/<id>/`.
    #[must_use]
    pub fn original_route(id: DocId) -> String {
        format!("/origdoc/{id}/")
    }

    /// `/docfragment/<id>/?formInput=<q>`.
    #[must_use]
    pub fn fragment_route(id: DocId, query: &str) -> String {
        format!("/docfragment/{id}/?formInput={}", encode_form_value(query))
    }

    /// `/search/?formInput=<q>&pagenum=<n>&maxpages=<m>`.
    #[must_use]
    pub fn search_route(query: &str, pagenum: u32, maxpages: u32) -> String {
        format!(
            "/search/?formInput={}&pagenum={pagenum}&maxpages={maxpages}",
            encode_form_value(query)
        )
    }

    fn with_limits(&self, mut route: String) -> String {
        let mut args = Vec::new();
        if self.max_cites > 0 {
            args.push(format!("maxcites={}", self.max_cites));
        }
        if self.max_cited_by > 0 {
            args.push(format!("maxcitedby={}", self.max_cited_by));
        }
        if !args.is_empty() {
            route.push('?');
            route.push_str(&args.join("&"));
        }
        route
    }

    /// Raw body of `/doc/<id>/`.
    ///
    /// # Errors
    ///
    /// Transport failures only; the body is not inspected.
    #[instrument(skip(self))]
    pub async fn fetch_doc(&self, id: DocId) -> Result<String, ApiError> {
        self.transport.call(&self.doc_route(id)).await
    }

    /// Raw body of `/docmeta/<id>/`.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    #[instrument(skip(self))]
    pub async fn fetch_docmeta(&self, id: DocId) -> Result<String, ApiError> {
        self.transport.call(&self.docmeta_route(id)).await
    }

    /// Raw body of `/origdoc/<id>/`.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    #[instrument(skip(self))]
    pub async fn fetch_original(&self, id: DocId) -> Result<String, ApiError> {
        self.transport.call(&Self::original_route(id)).await
    }

    /// Raw body of `/docfragment/<id>/`.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    #[instrument(skip(self))]
    pub async fn fetch_fragment(&self, id: DocId, query: &str) -> Result<String, ApiError> {
        self.transport.call(&Self::fragment_route(id, query)).await
    }

    /// Fetches and parses one search page.
    ///
    /// # Errors
    ///
    /// Transport failures, malformed JSON, or an `errmsg` response.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        pagenum: u32,
        maxpages: u32,
    ) -> Result<SearchPage, ApiError> {
        let route = Self::search_route(query, pagenum, maxpages);
        let body = self.transport.call(&route).await?;
        parse_payload(&route, &body)
    }
}

/// `application/x-www-form-urlencoded` encoding (spaces become `+`).
fn encode_form_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
