//! Paginated search with optional persistence.
//!
//! [`SearchEngine::run`] walks one query's result pages from offset zero
//! until the API returns an empty page or fails, numbering entries in
//! discovery order across pages. Depending on the [`SearchMode`] it writes
//! a `toc.csv`, downloads each document, or only counts.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::api::{ApiClient, DocId, ResultEntry};
use crate::fetcher::DocumentFetcher;
use crate::storage::{FileStorage, StorageError, TocWriter};

/// Largest page-size bound the API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Errors that abort a whole query.
///
/// Page and document failures are logged and do not surface here.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The query directory or its table of contents could not be written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What a search run does with the results it finds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMode {
    /// Only count matches; nothing touches the filesystem.
    pub count_only: bool,
    /// Write `toc.csv` in the query directory.
    pub csv: bool,
    /// Store documents under `<source>/<year>/<date>` instead of
    /// `<query>/<position>`.
    pub by_source: bool,
}

impl SearchMode {
    /// Count matches without side effects.
    #[must_use]
    pub fn count_only() -> Self {
        Self {
            count_only: true,
            csv: false,
            by_source: false,
        }
    }

    /// Download every result.
    #[must_use]
    pub fn persist(csv: bool, by_source: bool) -> Self {
        Self {
            count_only: false,
            csv,
            by_source,
        }
    }

    fn needs_search_dir(self) -> bool {
        !self.count_only && (!self.by_source || self.csv)
    }
}

/// Drives the page loop for one query at a time.
#[derive(Debug)]
pub struct SearchEngine {
    fetcher: DocumentFetcher,
    page_size: u32,
    span: Span,
}

impl SearchEngine {
    /// Creates an engine requesting `page_size` pages per call, clamped to
    /// `1..=100`.
    pub fn new(fetcher: DocumentFetcher, page_size: u32) -> Self {
        let clamped = page_size.clamp(1, MAX_PAGE_SIZE);
        if clamped != page_size {
            debug!(requested = page_size, used = clamped, "page size clamped");
        }
        Self {
            fetcher,
            page_size: clamped,
            span: info_span!("search"),
        }
    }

    /// Runs this engine's work inside `span` instead of its default one.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Effective page-size bound.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The fetcher used for downloads.
    #[must_use]
    pub fn fetcher(&self) -> &DocumentFetcher {
        &self.fetcher
    }

    fn client(&self) -> &ApiClient {
        self.fetcher.client()
    }

    fn storage(&self) -> &FileStorage {
        self.fetcher.storage()
    }

    /// Pages through `query` and returns every distinct document id found.
    ///
    /// # Errors
    ///
    /// [`SearchError::Storage`] if the query directory or `toc.csv` cannot be
    /// written. A failed page ends pagination with the ids gathered so far.
    pub async fn run(&self, query: &str, mode: SearchMode) -> Result<HashSet<DocId>, SearchError> {
        self.run_inner(query, mode)
            .instrument(self.span.clone())
            .await
    }

    async fn run_inner(
        &self,
        query: &str,
        mode: SearchMode,
    ) -> Result<HashSet<DocId>, SearchError> {
        let search_dir = if mode.needs_search_dir() {
            Some(self.storage().search_dir(query).await?)
        } else {
            None
        };
        let mut toc = match &search_dir {
            Some(dir) if mode.csv => Some(FileStorage::toc_writer(dir)?),
            _ => None,
        };

        let mut ids = HashSet::new();
        let mut position: u64 = 0;
        let mut pagenum: u32 = 0;

        loop {
            let page = match self.client().search(query, pagenum, self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(query, pagenum, error = %e, "search page failed, stopping");
                    break;
                }
            };
            if page.docs.is_empty() {
                debug!(query, pagenum, "no more results");
                break;
            }
            debug!(
                query,
                pagenum,
                results = page.docs.len(),
                found = %page.found_label(),
                "page received"
            );

            for entry in &page.docs {
                position += 1;
                if let Some(toc) = toc.as_mut() {
                    toc.append(position, entry)?;
                }
                ids.insert(entry.tid);
                // Repeated ids still get their own position; the fetcher
                // skips the request when the file is already on disk.
                if !mode.count_only {
                    self.store(entry, position, mode, search_dir.as_deref())
                        .await;
                }
            }

            if let Some(toc) = toc.as_mut() {
                toc.flush()?;
            }
            pagenum = pagenum.saturating_add(self.page_size);
        }

        if let Some(toc) = toc {
            let rows = toc.finish()?;
            debug!(query, rows, "table of contents closed");
        }

        if mode.count_only {
            info!(query, count = ids.len(), "documents matched");
        } else {
            info!(query, count = ids.len(), positions = position, "search complete");
        }
        Ok(ids)
    }

    /// Downloads one entry. Failures are logged and swallowed.
    async fn store(
        &self,
        entry: &ResultEntry,
        position: u64,
        mode: SearchMode,
        search_dir: Option<&Path>,
    ) {
        let dir = match self.doc_dir(entry, position, mode, search_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(id = entry.tid, position, error = %e, "no directory for document");
                return;
            }
        };
        if let Err(e) = self.fetcher.download_doc(entry.tid, &dir).await {
            warn!(id = entry.tid, position, error = %e, "document fetch failed");
        }
    }

    async fn doc_dir(
        &self,
        entry: &ResultEntry,
        position: u64,
        mode: SearchMode,
        search_dir: Option<&Path>,
    ) -> Result<PathBuf, StorageError> {
        match search_dir {
            Some(dir) if !mode.by_source => {
                self.storage().doc_dir_by_position(dir, position).await
            }
            _ => {
                self.storage()
                    .doc_dir_by_source(&entry.docsource, &entry.publishdate)
                    .await
            }
        }
    }
}
