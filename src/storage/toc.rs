//! Per-query table of contents (`toc.csv`).

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::StorageError;
use crate::api::{DocId, ResultEntry};

/// File name of the table of contents inside a query directory.
pub const TOC_FILE_NAME: &str = "toc.csv";

const HEADER: [&str; 5] = ["position", "docid", "date", "court", "title"];

#[derive(Serialize)]
struct TocRow<'a> {
    position: u64,
    docid: DocId,
    date: &'a str,
    court: &'a str,
    title: &'a str,
}

/// Writes one header line, then one row per discovered result.
///
/// The file is truncated on creation. Callers flush after each page so an
/// interrupted run keeps the rows already discovered.
///
/// Writes are blocking. A page holds at most 100 short rows, so they run
/// inline on the async task rather than through `spawn_blocking`.
#[derive(Debug)]
pub struct TocWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl TocWriter {
    /// Creates `<dir>/toc.csv` and writes the header.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the file cannot be created or written.
    pub fn create(dir: &Path) -> Result<Self, StorageError> {
        let path = dir.join(TOC_FILE_NAME);
        let file = File::create(&path).map_err(|e| StorageError::io(&path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record(HEADER)
            .map_err(|e| StorageError::csv(&path, e))?;
        Ok(Self {
            writer,
            path,
            rows: 0,
        })
    }

    /// Appends the row for `entry` at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Csv`] on write failure.
    pub fn append(&mut self, position: u64, entry: &ResultEntry) -> Result<(), StorageError> {
        self.writer
            .serialize(TocRow {
                position,
                docid: entry.tid,
                date: &entry.publishdate,
                court: &entry.docsource,
                title: &entry.title,
            })
            .map_err(|e| StorageError::csv(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Pushes buffered rows to disk.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] on flush failure.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.writer
            .flush()
            .map_err(|e| StorageError::io(&self.path, e))
    }

    /// Flushes and closes the file, returning the number of data rows.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] on flush failure.
    pub fn finish(mut self) -> Result<usize, StorageError> {
        self.flush()?;
        Ok(self.rows)
    }

    /// Path of the TOC file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(tid: DocId, title: &str) -> ResultEntry {
        ResultEntry {
            tid,
            title: title.to_string(),
            publishdate: "2021-03-04".to_string(),
            docsource: "Bombay High Court".to_string(),
        }
    }

    #[test]
    fn test_empty_toc_has_only_header() {
        let dir = TempDir::new().unwrap();
        let toc = TocWriter::create(dir.path()).unwrap();
        assert_eq!(toc.finish().unwrap(), 0);

        let contents = std::fs::read_to_string(dir.path().join(TOC_FILE_NAME)).unwrap();
        assert_eq!(contents, "position,docid,date,court,title\n");
    }

    #[test]
    fn test_rows_follow_header_in_order_and_quote_commas() {
        let dir = TempDir::new().unwrap();
        let mut toc = TocWriter::create(dir.path()).unwrap();
        toc.append(1, &entry(10, "State v. Rao")).unwrap();
        toc.append(2, &entry(20, "Rao, K v. Union")).unwrap();
        assert_eq!(toc.finish().unwrap(), 2);

        let contents = std::fs::read_to_string(dir.path().join(TOC_FILE_NAME)).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1,10,2021-03-04,Bombay High Court,State v. Rao");
        assert_eq!(lines[2], "2,20,2021-03-04,Bombay High Court,\"Rao, K v. Union\"");
    }

    #[test]
    fn test_flush_makes_rows_visible_before_finish() {
        let dir = TempDir::new().unwrap();
        let mut toc = TocWriter::create(dir.path()).unwrap();
        toc.append(1, &entry(10, "A")).unwrap();
        toc.flush().unwrap();

        let contents = std::fs::read_to_string(toc.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
