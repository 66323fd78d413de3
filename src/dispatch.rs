//! Fixed-size worker pool for batches of queries.
//!
//! The dispatcher spawns its workers first, then feeds composed queries
//! through a bounded channel, then one [`WorkItem::Shutdown`] per worker.
//! Each worker finishes its current query before taking the next item, so
//! every query is run by exactly one worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, Span, debug, info, info_span, instrument, warn};

use crate::query::QueryModifiers;
use crate::search::{SearchEngine, SearchMode};

/// Queue slots between the producer and the workers.
pub const QUEUE_CAPACITY: usize = 20;

/// Minimum allowed worker count.
const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
const MAX_WORKERS: usize = 100;

/// Default worker count if not specified.
pub const DEFAULT_WORKERS: usize = 5;

/// Error type for dispatcher operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Invalid worker count provided.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkerCount {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Every worker exited before the queue was drained.
    #[error("work queue closed before all queries were sent")]
    QueueClosed,
}

/// One unit of work on the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// A fully composed query to run.
    Query(String),
    /// Tells the receiving worker to exit.
    Shutdown,
}

/// Statistics from a dispatcher run.
///
/// Updated concurrently by workers through atomic counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    documents: AtomicUsize,
}

impl DispatchStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of queries that ran to completion.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of queries that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of distinct ids summed over completed queries.
    #[must_use]
    pub fn documents(&self) -> usize {
        self.documents.load(Ordering::SeqCst)
    }

    /// Returns the total number of queries processed (completed + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed()
    }

    fn record_completed(&self, documents: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.documents.fetch_add(documents, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runs batches of queries across a fixed set of workers.
#[derive(Debug)]
pub struct TaskDispatcher {
    engine: Arc<SearchEngine>,
    workers: usize,
    modifiers: QueryModifiers,
    mode: SearchMode,
    span: Span,
}

impl TaskDispatcher {
    /// Creates a dispatcher with `workers` workers (1-100).
    ///
    /// Workers always persist results; `mode` only selects CSV output and
    /// the directory layout, and a count-only mode is upgraded to persist.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidWorkerCount`] if the value is outside
    /// the valid range.
    #[instrument(level = "debug", skip(engine, modifiers))]
    pub fn new(
        engine: Arc<SearchEngine>,
        workers: usize,
        modifiers: QueryModifiers,
        mode: SearchMode,
    ) -> Result<Self, DispatchError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(DispatchError::InvalidWorkerCount { value: workers });
        }
        Ok(Self {
            engine,
            workers,
            modifiers,
            mode: SearchMode::persist(mode.csv, mode.by_source),
            span: info_span!("dispatch"),
        })
    }

    /// Runs this dispatcher's work inside `span` instead of its default one.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Returns the configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every non-blank query in `queries` and waits for all workers.
    ///
    /// Query failures are counted in the returned stats, not raised.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueClosed`] if all workers are gone while
    /// items remain to be sent.
    pub async fn execute<I>(&self, queries: I) -> Result<DispatchStats, DispatchError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.execute_inner(queries)
            .instrument(self.span.clone())
            .await
    }

    async fn execute_inner<I>(&self, queries: I) -> Result<DispatchStats, DispatchError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let (tx, rx) = mpsc::channel::<WorkItem>(QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(DispatchStats::new());

        info!(workers = self.workers, "starting workers");
        let handles: Vec<_> = (0..self.workers)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let engine = Arc::clone(&self.engine);
                let stats = Arc::clone(&stats);
                let mode = self.mode;
                tokio::spawn(
                    run_worker(worker, rx, engine, mode, stats).instrument(Span::current()),
                )
            })
            .collect();

        let mut sent = 0usize;
        for raw in queries {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let query = self.modifiers.compose(raw);
            debug!(query = %query, "enqueueing");
            tx.send(WorkItem::Query(query))
                .await
                .map_err(|_| DispatchError::QueueClosed)?;
            sent += 1;
        }
        for _ in 0..self.workers {
            tx.send(WorkItem::Shutdown)
                .await
                .map_err(|_| DispatchError::QueueClosed)?;
        }
        drop(tx);

        debug!(sent, "all items enqueued, waiting for workers");
        for handle in handles {
            // A panicked worker is logged; the others still drain the queue.
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task panicked");
            }
        }

        let completed = stats.completed();
        let failed = stats.failed();
        info!(
            completed,
            failed,
            documents = stats.documents(),
            total = completed + failed,
            "all queries processed"
        );

        // All workers have been joined, so no other owner remains.
        match Arc::try_unwrap(stats) {
            Ok(stats) => Ok(stats),
            Err(shared) => {
                let copy = DispatchStats::new();
                copy.completed.store(shared.completed(), Ordering::SeqCst);
                copy.failed.store(shared.failed(), Ordering::SeqCst);
                copy.documents.store(shared.documents(), Ordering::SeqCst);
                Ok(copy)
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    engine: Arc<SearchEngine>,
    mode: SearchMode,
    stats: Arc<DispatchStats>,
) {
    loop {
        let item = rx.lock().await.recv().await;
        match item {
            Some(WorkItem::Query(query)) => {
                info!(worker, query = %query, "processing query");
                match engine.run(&query, mode).await {
                    Ok(ids) => stats.record_completed(ids.len()),
                    Err(e) => {
                        warn!(worker, query = %query, error = %e, "query failed");
                        stats.increment_failed();
                    }
                }
            }
            Some(WorkItem::Shutdown) | None => {
                debug!(worker, "worker exiting");
                break;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, Transport};
    use crate::fetcher::DocumentFetcher;
    use crate::storage::FileStorage;
    use crate::test_support::{ScriptedTransport, doc_json, page_json, search_prefix};
    use tempfile::TempDir;

    fn engine(transport: &Arc<ScriptedTransport>, root: &std::path::Path) -> Arc<SearchEngine> {
        let client = ApiClient::new(Arc::clone(transport) as Arc<dyn Transport>);
        let fetcher = DocumentFetcher::new(client, Arc::new(FileStorage::new(root)), false);
        Arc::new(SearchEngine::new(fetcher, 1))
    }

    #[test]
    fn test_worker_count_bounds() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let engine = engine(&transport, root.path());

        let result = TaskDispatcher::new(
            Arc::clone(&engine),
            0,
            QueryModifiers::default(),
            SearchMode::persist(true, false),
        );
        assert!(matches!(
            result,
            Err(DispatchError::InvalidWorkerCount { value: 0 })
        ));
        let dispatcher =
            TaskDispatcher::new(engine, 4, QueryModifiers::default(), SearchMode::count_only())
                .unwrap();
        assert_eq!(dispatcher.workers(), 4);
        assert!(!dispatcher.mode.count_only);
    }

    #[tokio::test]
    async fn test_each_query_runs_exactly_once() {
        let root = TempDir::new().unwrap();
        let queries: Vec<String> = (0..30).map(|i| format!("topic {i}")).collect();
        let transport = Arc::new(ScriptedTransport::new().on("/search/", &page_json(&[])));
        let dispatcher = TaskDispatcher::new(
            engine(&transport, root.path()),
            3,
            QueryModifiers::default(),
            SearchMode::persist(true, false),
        )
        .unwrap();

        let stats = dispatcher.execute(&queries).await.unwrap();
        assert_eq!(stats.completed(), 30);
        assert_eq!(stats.failed(), 0);
        for query in &queries {
            assert_eq!(transport.count(&search_prefix(query, 0)), 1, "query {query}");
        }
    }

    #[tokio::test]
    async fn test_blank_lines_skipped_and_modifiers_applied() {
        let root = TempDir::new().unwrap();
        let modifiers = QueryModifiers {
            sort_by: Some("mostrecent".to_string()),
            ..QueryModifiers::default()
        };
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(
                    &search_prefix("bail sortby: mostrecent", 0),
                    &page_json(&[(5, "A", "2021-02-03", "Delhi High Court")]),
                )
                .on("/search/", &page_json(&[]))
                .on("/doc/5/", &doc_json("A", false, "<p/>")),
        );
        let dispatcher = TaskDispatcher::new(
            engine(&transport, root.path()),
            2,
            modifiers,
            SearchMode::persist(true, false),
        )
        .unwrap();

        let stats = dispatcher.execute(["bail", "", "   "]).await.unwrap();
        assert_eq!(stats.total(), 1);
        assert_eq!(stats.documents(), 1);
        assert!(
            root.path()
                .join("bail sortby: mostrecent")
                .join("1")
                .join("5.json")
                .exists()
        );
    }
}
