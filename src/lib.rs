//! ikfetch Core Library
//!
//! This library retrieves search results, documents and citation
//! relationships from a legal document-search API and keeps them in a local
//! directory tree that can be re-run without re-downloading.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`api`] - Routes, payloads and the retrying HTTP transport
//! - [`storage`] - Directory layout, TOC files and existence checks
//! - [`fetcher`] - Single-document download with skip-on-rerun
//! - [`search`] - Paginated search with deduplication
//! - [`dispatch`] - Bounded worker pool for query batches
//! - [`citation`] - Cited-by accumulation with one-hop expansion
//! - [`query`] - Query modifier composition

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod citation;
pub mod dispatch;
pub mod fetcher;
pub mod query;
pub mod search;
pub mod storage;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use api::{
    ApiClient, ApiError, DocId, FailureType, HttpTransport, RetryDecision, RetryPolicy,
    Transport, TransportConfig, classify_error,
};
pub use citation::{CitationError, CitationWalker, extract_cited_ids};
pub use dispatch::{DEFAULT_WORKERS, DispatchError, DispatchStats, TaskDispatcher, WorkItem};
pub use fetcher::{DocumentFetcher, FetchError};
pub use query::QueryModifiers;
pub use search::{MAX_PAGE_SIZE, SearchEngine, SearchError, SearchMode};
pub use storage::{FileStorage, OriginalKind, StorageError};
