//! Cited-by accumulation over the citation graph.
//!
//! A walk starts from one seed document and collects every document that
//! cites it. With one-hop expansion the seed's own body is fetched, the
//! documents it links to are extracted, and their citing documents are
//! added too. Each id is queried at most once per walk.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{Instrument, Span, debug, info, info_span};

use crate::api::DocId;
use crate::fetcher::{DocumentFetcher, FetchError};
use crate::query;
use crate::search::{SearchEngine, SearchError, SearchMode};

#[allow(clippy::expect_used)]
static DOC_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href^="/doc/"]"#).expect("document link selector is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static DOC_ID_IN_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/doc/(\d+)/").expect("document href regex is valid")); // Static pattern, safe to panic

/// Errors that abort a citation walk.
#[derive(Debug, Error)]
pub enum CitationError {
    /// The seed document could not be fetched for expansion.
    #[error("could not fetch seed document {id}: {source}")]
    Seed {
        /// Seed id.
        id: DocId,
        /// Underlying fetch failure.
        #[source]
        source: FetchError,
    },

    /// A cited-by query failed.
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Walks cited-by relationships from seed documents.
#[derive(Debug)]
pub struct CitationWalker {
    engine: Arc<SearchEngine>,
    span: Span,
}

impl CitationWalker {
    /// Creates a walker that runs its cited-by queries through `engine`.
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self {
            engine,
            span: info_span!("citation"),
        }
    }

    /// Runs this walker's work inside `span` instead of its default one.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn fetcher(&self) -> &DocumentFetcher {
        self.engine.fetcher()
    }

    /// Returns the ids of documents citing `seed`, plus, with `one_hop`,
    /// those citing any document `seed` links to.
    ///
    /// # Errors
    ///
    /// [`CitationError::Seed`] if the seed body cannot be fetched for
    /// expansion; [`CitationError::Search`] if a cited-by query fails.
    pub async fn walk(&self, seed: DocId, one_hop: bool) -> Result<HashSet<DocId>, CitationError> {
        self.walk_inner(seed, one_hop)
            .instrument(self.span.clone())
            .await
    }

    async fn walk_inner(
        &self,
        seed: DocId,
        one_hop: bool,
    ) -> Result<HashSet<DocId>, CitationError> {
        let mut processed = HashSet::from([seed]);
        let mut citing = self.cited_by(seed).await?;

        if one_hop {
            let body = self
                .fetcher()
                .fetch_body(seed)
                .await
                .map_err(|source| CitationError::Seed { id: seed, source })?;
            let linked = body.doc.as_deref().map(extract_cited_ids).unwrap_or_default();
            debug!(seed, links = linked.len(), "expanding one hop");

            for id in linked {
                if !processed.insert(id) {
                    continue;
                }
                debug!(seed, id, "querying linked document");
                citing.extend(self.cited_by(id).await?);
            }
            info!(seed, total = citing.len(), "documents citing seed with one hop");
        } else {
            info!(seed, total = citing.len(), "documents citing seed");
        }

        Ok(citing)
    }

    async fn cited_by(&self, id: DocId) -> Result<HashSet<DocId>, CitationError> {
        Ok(self
            .engine
            .run(&query::cited_by(id), SearchMode::count_only())
            .await?)
    }
}

/// Ids of documents linked from `html` via `/doc/<id>/` anchors, in link
/// order. Repeated links are kept.
#[must_use]
pub fn extract_cited_ids(html: &str) -> Vec<DocId> {
    let document = Html::parse_fragment(html);
    document
        .select(&DOC_LINK)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| DOC_ID_IN_HREF.captures(href))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, Transport};
    use crate::storage::FileStorage;
    use crate::test_support::{ScriptedTransport, doc_json, page_json, search_prefix};
    use tempfile::TempDir;

    fn walker(transport: &Arc<ScriptedTransport>, root: &std::path::Path) -> CitationWalker {
        let client = ApiClient::new(Arc::clone(transport) as Arc<dyn Transport>);
        let fetcher = DocumentFetcher::new(client, Arc::new(FileStorage::new(root)), false);
        CitationWalker::new(Arc::new(SearchEngine::new(fetcher, 10)))
    }

    #[test]
    fn test_extract_cited_ids_in_order() {
        let html = r#"
            <p>See <a href="/doc/12/">A</a>, <a href="/doc/7/?type=print">B</a>
            and <a href="https://example.com/doc/99/">C</a>.
            <a href="/docfragment/5/">D</a> <a href="/doc/12/">A again</a>
            <a>no href</a> <a href="/doc/abc/">bad</a></p>
        "#;
        assert_eq!(extract_cited_ids(html), vec![12, 7, 12]);
    }

    #[test]
    fn test_extract_cited_ids_empty() {
        assert!(extract_cited_ids("").is_empty());
        assert!(extract_cited_ids("<p>no links</p>").is_empty());
    }

    #[tokio::test]
    async fn test_walk_without_expansion() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(
                    &search_prefix("citedby:1", 0),
                    &page_json(&[(20, "A", "2020-01-01", "X"), (21, "B", "2020-01-01", "X")]),
                )
                .on("/search/", &page_json(&[])),
        );
        let walker = walker(&transport, root.path());

        let ids = walker.walk(1, false).await.unwrap();
        assert_eq!(ids, HashSet::from([20, 21]));
        assert_eq!(transport.count("/doc/"), 0);
    }

    #[tokio::test]
    async fn test_one_hop_queries_seed_and_linked_once() {
        let root = TempDir::new().unwrap();
        let html = r#"<a href="/doc/1/">self</a><a href="/doc/2/">x</a><a href="/doc/2/">x</a>"#;
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("/doc/1/", &doc_json("Seed", false, html))
                .on(
                    &search_prefix("citedby:1", 0),
                    &page_json(&[(30, "A", "2020-01-01", "X")]),
                )
                .on(
                    &search_prefix("citedby:2", 0),
                    &page_json(&[(30, "A", "2020-01-01", "X"), (31, "B", "2020-01-01", "X")]),
                )
                .on("/search/", &page_json(&[])),
        );
        let walker = walker(&transport, root.path());

        let ids = walker.walk(1, true).await.unwrap();
        assert_eq!(ids, HashSet::from([30, 31]));
        assert_eq!(transport.count(&search_prefix("citedby:1", 0)), 1);
        assert_eq!(transport.count(&search_prefix("citedby:2", 0)), 1);

        let queried: HashSet<_> = transport
            .calls()
            .into_iter()
            .filter(|c| c.contains("pagenum=0&"))
            .collect();
        assert_eq!(queried.len(), 2);
        // Nothing is persisted by a walk.
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_seed_fetch_failure_is_reported() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("/search/", &page_json(&[]))
                .on("/doc/3/", r#"{"errmsg": "not found"}"#),
        );
        let walker = walker(&transport, root.path());

        let result = walker.walk(3, true).await;
        assert!(matches!(result, Err(CitationError::Seed { id: 3, .. })));
    }
}
