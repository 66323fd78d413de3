//! Single-document retrieval with skip-on-rerun.
//!
//! A document is fetched only when its `<id>.json` file is missing, so
//! repeated runs over the same result set cost no API calls for documents
//! already on disk. Original renditions follow the same rule keyed on any
//! `<id>_original.*` file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::{Instrument, Span, debug, info, info_span, instrument, warn};

use crate::api::{
    ApiClient, ApiError, DocId, DocumentBody, OpaquePayload, OriginalPayload, parse_payload,
};
use crate::storage::{FileStorage, OriginalKind, StorageError};

/// Errors from fetching a single document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The API call failed or returned an error payload.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Writing to the data directory failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The original payload had no `doc` field.
    #[error("original for document {id} has no content")]
    EmptyOriginal {
        /// Document id.
        id: DocId,
    },

    /// The original payload was not valid base64.
    #[error("original for document {id} is not valid base64: {source}")]
    Decode {
        /// Document id.
        id: DocId,
        /// The decoder error.
        #[source]
        source: base64::DecodeError,
    },
}

/// Fetches documents, originals, fragments and metadata into storage.
#[derive(Debug, Clone)]
pub struct DocumentFetcher {
    client: ApiClient,
    storage: Arc<FileStorage>,
    originals: bool,
    span: Span,
}

impl DocumentFetcher {
    /// Creates a fetcher. With `originals` set, court copies are fetched
    /// alongside each document that has one.
    pub fn new(client: ApiClient, storage: Arc<FileStorage>, originals: bool) -> Self {
        Self {
            client,
            storage,
            originals,
            span: info_span!("fetcher"),
        }
    }

    /// Runs this fetcher's work inside `span` instead of its default one.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The API client used for requests.
    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// The storage documents are written to.
    #[must_use]
    pub fn storage(&self) -> &Arc<FileStorage> {
        &self.storage
    }

    /// Fetches document `id` into `dir` unless it is already there.
    ///
    /// Returns `true` when a new JSON file was written. Original-rendition
    /// failures are logged and do not fail the call.
    ///
    /// # Errors
    ///
    /// [`FetchError::Api`] if the document request fails, is malformed or
    /// carries `errmsg` (nothing is written in that case);
    /// [`FetchError::Storage`] if the file cannot be written.
    pub async fn download_doc(&self, id: DocId, dir: &Path) -> Result<bool, FetchError> {
        self.download_doc_inner(id, dir)
            .instrument(self.span.clone())
            .await
    }

    #[instrument(level = "debug", skip(self, dir), fields(dir = %dir.display()))]
    async fn download_doc_inner(&self, id: DocId, dir: &Path) -> Result<bool, FetchError> {
        let paths = FileStorage::doc_paths(dir, id);
        let mut wants_original = self.originals;
        let mut written = false;

        if FileStorage::exists(&paths.json).await {
            debug!(id, path = %paths.json.display(), "document already stored");
        } else {
            let route = self.client.doc_route(id);
            let body = self.client.fetch_doc(id).await?;
            let doc: DocumentBody = parse_payload(&route, &body)?;
            FileStorage::save_json(&paths.json, &body).await?;
            written = true;
            wants_original = wants_original && doc.has_original();
            info!(
                id,
                title = doc.title.as_deref().unwrap_or_default(),
                path = %paths.json.display(),
                "document saved"
            );
        }

        if wants_original {
            match self.download_original(id, &paths.original_prefix).await {
                Ok(Some(path)) => info!(id, path = %path.display(), "original saved"),
                Ok(None) => {}
                Err(e) => warn!(id, error = %e, "could not fetch original"),
            }
        }

        Ok(written)
    }

    async fn download_original(
        &self,
        id: DocId,
        prefix: &Path,
    ) -> Result<Option<PathBuf>, FetchError> {
        if FileStorage::original_exists(prefix) {
            debug!(id, "original already stored");
            return Ok(None);
        }

        let route = ApiClient::original_route(id);
        let body = self.client.fetch_original(id).await?;
        let payload: OriginalPayload = parse_payload(&route, &body)?;
        let encoded = payload.doc.ok_or(FetchError::EmptyOriginal { id })?;
        // Line-wrapped base64 is accepted.
        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = STANDARD
            .decode(compact)
            .map_err(|source| FetchError::Decode { id, source })?;

        let kind = OriginalKind::from_content_type(payload.content_type.as_deref());
        let path = FileStorage::save_original(prefix, kind, &bytes).await?;
        Ok(Some(path))
    }

    /// Fetches the fragments of `id` matching `query` and stores them as
    /// `<root>/<id> q: <query>.json`.
    ///
    /// # Errors
    ///
    /// [`FetchError::Api`] on request failure or `errmsg`;
    /// [`FetchError::Storage`] on write failure.
    pub async fn save_fragment(&self, id: DocId, query: &str) -> Result<PathBuf, FetchError> {
        async {
            let route = ApiClient::fragment_route(id, query);
            let body = self.client.fetch_fragment(id, query).await?;
            let _: OpaquePayload = parse_payload(&route, &body)?;
            let path = self.storage.fragment_path(id, query);
            FileStorage::save_json(&path, &body).await?;
            info!(id, query, path = %path.display(), "fragment saved");
            Ok::<_, FetchError>(path)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Stores the metadata of `id` as `<root>/<id>_meta.json` unless present.
    ///
    /// Returns `true` when a new file was written.
    ///
    /// # Errors
    ///
    /// [`FetchError::Api`] on request failure or `errmsg`;
    /// [`FetchError::Storage`] on write failure.
    pub async fn save_meta(&self, id: DocId) -> Result<bool, FetchError> {
        async {
            let path = self.storage.meta_path(id);
            if FileStorage::exists(&path).await {
                debug!(id, "metadata already stored");
                return Ok(false);
            }
            let route = self.client.docmeta_route(id);
            let body = self.client.fetch_docmeta(id).await?;
            let _: OpaquePayload = parse_payload(&route, &body)?;
            FileStorage::save_json(&path, &body).await?;
            info!(id, path = %path.display(), "metadata saved");
            Ok::<_, FetchError>(true)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Fetches and parses document `id` without storing it.
    ///
    /// # Errors
    ///
    /// [`FetchError::Api`] on request failure, malformed JSON or `errmsg`.
    pub async fn fetch_body(&self, id: DocId) -> Result<DocumentBody, FetchError> {
        async {
            let route = self.client.doc_route(id);
            let body = self.client.fetch_doc(id).await?;
            Ok::<DocumentBody, FetchError>(parse_payload(&route, &body)?)
        }
        .instrument(self.span.clone())
        .await
    }
}
