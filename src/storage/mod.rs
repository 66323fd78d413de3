//! Local directory layout for fetched documents.
//!
//! Documents are stored under one root, either grouped by the query that
//! discovered them or by their source court and publish date:
//!
//! ```text
//! <root>/<query>/toc.csv
//! <root>/<query>/<position>/<id>.json
//! <root>/<query>/<position>/<id>_original.<ext>
//! <root>/<docsource>/<year>/<YYYY-MM-DD>/<id>.json
//! ```
//!
//! Directories are created on demand and re-creating them is a no-op. A
//! document counts as fetched when its JSON file exists; contents are never
//! verified, so a truncated write from a killed run is not detected.

mod original;
mod toc;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::api::DocId;

pub use original::OriginalKind;
pub use toc::{TOC_FILE_NAME, TocWriter};

#[allow(clippy::expect_used)]
static DATE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("date digit regex is valid")); // Static pattern, safe to panic

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File system error.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path being created, read or written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// CSV serialization error while writing a table of contents.
    #[error("CSV error writing {path}: {source}")]
    Csv {
        /// The TOC file.
        path: PathBuf,
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// Publish date that does not contain a valid year, month and day.
    #[error("invalid publish date '{value}'")]
    InvalidPublishDate {
        /// The date string as received.
        value: String,
    },
}

impl StorageError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a CSV error.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

/// JSON path and original-file prefix for one document in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPaths {
    /// `<dir>/<id>.json`
    pub json: PathBuf,
    /// `<dir>/<id>_original`; the extension is added on write.
    pub original_prefix: PathBuf,
}

/// Filesystem storage rooted at one data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Creates storage rooted at `root`. Nothing is created yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a query's results, created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    #[instrument(skip(self))]
    pub async fn search_dir(&self, query: &str) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(path_component(query));
        ensure_dir(&dir).await?;
        Ok(dir)
    }

    /// `<root>/<source>/<year>/<YYYY-MM-DD>`, created if missing.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidPublishDate`] if the date cannot be read,
    /// [`StorageError::Io`] if the directory cannot be created.
    #[instrument(skip(self))]
    pub async fn doc_dir_by_source(
        &self,
        source: &str,
        publish_date: &str,
    ) -> Result<PathBuf, StorageError> {
        let date = parse_publish_date(publish_date)?;
        let dir = self
            .root
            .join(path_component(source))
            .join(date.year().to_string())
            .join(date.format("%Y-%m-%d").to_string());
        ensure_dir(&dir).await?;
        Ok(dir)
    }

    /// `<search_dir>/<position>`, created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub async fn doc_dir_by_position(
        &self,
        search_dir: &Path,
        position: u64,
    ) -> Result<PathBuf, StorageError> {
        let dir = search_dir.join(position.to_string());
        ensure_dir(&dir).await?;
        Ok(dir)
    }

    /// Paths of a document's files inside `dir`.
    #[must_use]
    pub fn doc_paths(dir: &Path, id: DocId) -> DocPaths {
        DocPaths {
            json: dir.join(format!("{id}.json")),
            original_prefix: dir.join(format!("{id}_original")),
        }
    }

    /// `<root>/<id> q: <query>.json`
    #[must_use]
    pub fn fragment_path(&self, id: DocId, query: &str) -> PathBuf {
        self.root
            .join(path_component(&format!("{id} q: {query}.json")))
    }

    /// `<root>/<id>_meta.json`
    #[must_use]
    pub fn meta_path(&self, id: DocId) -> PathBuf {
        self.root.join(format!("{id}_meta.json"))
    }

    /// True if `path` exists. Unreadable parents count as absent.
    pub async fn exists(path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// True if any `<prefix>.*` file exists.
    #[must_use]
    pub fn original_exists(prefix: &Path) -> bool {
        let pattern = format!("{}.*", glob::Pattern::escape(&prefix.to_string_lossy()));
        match glob::glob(&pattern) {
            Ok(mut paths) => paths.any(|p| p.is_ok()),
            Err(e) => {
                debug!(pattern, error = %e, "invalid original glob pattern");
                false
            }
        }
    }

    /// Writes an API response verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] on write failure.
    pub async fn save_json(path: &Path, body: &str) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent).await?;
        }
        tokio::fs::write(path, body)
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    /// Writes decoded original bytes to `<prefix>.<ext>` and returns the path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] on write failure.
    pub async fn save_original(
        prefix: &Path,
        kind: OriginalKind,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let mut file_name = prefix.as_os_str().to_owned();
        file_name.push(".");
        file_name.push(kind.extension());
        let path = PathBuf::from(file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        Ok(path)
    }

    /// Opens a fresh `toc.csv` in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the file cannot be created.
    pub fn toc_writer(dir: &Path) -> Result<TocWriter, StorageError> {
        TocWriter::create(dir)
    }
}

async fn ensure_dir(dir: &Path) -> Result<(), StorageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))
}

/// Reads the first three digit runs of `value` as year, month, day.
fn parse_publish_date(value: &str) -> Result<NaiveDate, StorageError> {
    let invalid = || StorageError::InvalidPublishDate {
        value: value.to_string(),
    };
    let mut parts = DATE_DIGITS.find_iter(value).map(|m| m.as_str());
    let (Some(year), Some(month), Some(day)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Makes a single path component out of free text (queries, court names).
fn path_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
