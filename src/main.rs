//! CLI entry point for the ikfetch tool.

use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use ikfetch_core::{
    ApiClient, CitationWalker, DocumentFetcher, FileStorage, HttpTransport, QueryModifiers,
    SearchEngine, SearchMode, TaskDispatcher,
};
use tracing::{debug, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

use cli::{Action, Args, LogLevel};
use config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(args.loglevel, args.logfile.as_deref())?;

    let file_config = config::load_default_file_config()?;
    let settings = Settings::resolve(&args, file_config.as_ref())?;
    debug!(?settings, from_file = file_config.is_some(), "settings resolved");

    let Some(action) = args.action() else {
        info!("Nothing to do. Pass one of --docid, --query, --doctype, --qfile or --citedby.");
        return Ok(());
    };

    let transport = HttpTransport::new(settings.transport_config())
        .context("Failed to build HTTP client")?;
    let client = ApiClient::new(Arc::new(transport))
        .with_citation_limits(args.maxcites, args.maxcitedby);
    let storage = Arc::new(FileStorage::new(&settings.datadir));
    let fetcher = DocumentFetcher::new(client, storage, args.original);
    let engine = Arc::new(SearchEngine::new(fetcher, settings.maxpages));

    let modifiers = QueryModifiers {
        from_date: args.fromdate.clone(),
        to_date: args.todate.clone(),
        added_today: args.addedtoday,
        sort_by: args.sortby.clone(),
    };
    let mode = if args.count {
        SearchMode::count_only()
    } else {
        SearchMode::persist(!args.no_csv, args.pathbysrc)
    };

    match action {
        Action::Fragment { docid, query } => {
            info!(docid, query = %query, "fetching document fragment");
            if let Err(e) = engine.fetcher().save_fragment(docid, &query).await {
                error!(docid, error = %e, "fragment fetch failed");
            }
        }
        Action::Document(docid) => {
            match engine.fetcher().download_doc(docid, &settings.datadir).await {
                Ok(true) => {}
                Ok(false) => info!(docid, "document already present"),
                Err(e) => error!(docid, error = %e, "document fetch failed"),
            }
            if args.meta
                && let Err(e) = engine.fetcher().save_meta(docid).await
            {
                error!(docid, error = %e, "metadata fetch failed");
            }
        }
        Action::Search(query) => {
            let query = modifiers.compose(&query);
            info!(query = %query, "search");
            run_search(&engine, &query, mode).await;
        }
        Action::Doctype(doctype) => {
            let query = modifiers.doctype(&doctype);
            info!(query = %query, "doctype search");
            run_search(&engine, &query, mode).await;
        }
        Action::QueryFile(path) => {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read query file '{}'", path.display()))?;
            if args.count {
                warn!("--count is ignored with --qfile; results are stored");
            }
            let dispatcher = TaskDispatcher::new(engine, settings.workers, modifiers, mode)?
                .with_span(info_span!("dispatch", qfile = %path.display()));
            let stats = dispatcher.execute(contents.lines()).await?;
            info!(
                completed = stats.completed(),
                failed = stats.failed(),
                documents = stats.documents(),
                "query file processed"
            );
        }
        Action::CitedBy(seeds) => {
            let walker =
                CitationWalker::new(engine).with_span(info_span!("citation", one_hop = args.level));
            for seed in seeds {
                // One failing seed does not stop the others.
                match walker.walk(seed, args.level).await {
                    Ok(ids) => info!(
                        seed,
                        total = ids.len(),
                        one_hop = args.level,
                        "cited-by walk complete"
                    ),
                    Err(e) => error!(seed, error = %e, "cited-by walk failed"),
                }
            }
        }
    }

    Ok(())
}

async fn run_search(engine: &SearchEngine, query: &str, mode: SearchMode) {
    match engine.run(query, mode).await {
        Ok(ids) => debug!(query, total = ids.len(), "search finished"),
        Err(e) => error!(query, error = %e, "search failed"),
    }
}

fn init_tracing(level: LogLevel, logfile: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if let Some(path) = logfile {
        let file = File::create(path)
            .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
        let _ = builder
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init();
    } else {
        let _ = builder
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .try_init();
    }
    Ok(())
}
