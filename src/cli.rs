//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use ikfetch_core::DocId;

/// Download search results, documents and citation graphs from a legal
/// document-search API.
///
/// Exactly one action runs per invocation, picked in this order: fragment
/// (--docid with --query), document (--docid), search (--query), doctype
/// (--doctype), query file (--qfile), cited-by walk (--citedby).
#[derive(Parser, Debug)]
#[command(name = "ikfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Log level (RUST_LOG overrides)
    #[arg(short = 'l', long, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(short = 'g', long)]
    pub logfile: Option<PathBuf>,

    /// Directory to store files
    #[arg(short = 'D', long)]
    pub datadir: Option<PathBuf>,

    /// Shared API token
    #[arg(short = 's', long, env = "IKFETCH_TOKEN", hide_env_values = true)]
    pub sharedtoken: Option<String>,

    /// API host (scheme and authority)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Document id to fetch
    #[arg(short = 'd', long)]
    pub docid: Option<DocId>,

    /// Search query
    #[arg(short = 'q', long)]
    pub query: Option<String>,

    /// Search every document of this type (e.g. supremecourt)
    #[arg(short = 'c', long)]
    pub doctype: Option<String>,

    /// File with one query per line, run across the worker pool
    #[arg(short = 'Q', long)]
    pub qfile: Option<PathBuf>,

    /// Count the documents citing each of these ids
    #[arg(short = 'C', long, num_args = 1..)]
    pub citedby: Vec<DocId>,

    /// With --citedby, also count citations of every document the seed links to
    #[arg(short = 'r', long)]
    pub level: bool,

    /// Lower publish-date bound (DD-MM-YYYY)
    #[arg(short = 'f', long)]
    pub fromdate: Option<String>,

    /// Upper publish-date bound (DD-MM-YYYY)
    #[arg(short = 't', long)]
    pub todate: Option<String>,

    /// Result order
    #[arg(short = 'S', long, value_parser = ["mostrecent", "leastrecent"])]
    pub sortby: Option<String>,

    /// Only documents added today
    #[arg(short = 'a', long)]
    pub addedtoday: bool,

    /// Result pages per search request (capped at 100)
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub maxpages: Option<u32>,

    /// Citations embedded per document (0 for the API default)
    #[arg(short = 'm', long, default_value_t = 0)]
    pub maxcites: u32,

    /// Cited-by entries embedded per document (0 for the API default)
    #[arg(short = 'M', long, default_value_t = 0)]
    pub maxcitedby: u32,

    /// Store documents under <court>/<year>/<date> instead of <query>/<position>
    #[arg(short = 'P', long)]
    pub pathbysrc: bool,

    /// Do not write toc.csv for searches
    #[arg(short = 'x', long)]
    pub no_csv: bool,

    /// Also fetch original court copies
    #[arg(short = 'o', long)]
    pub original: bool,

    /// With --docid, also store document metadata
    #[arg(long)]
    pub meta: bool,

    /// Workers for --qfile (1-100)
    #[arg(short = 'N', long, value_parser = clap::value_parser!(u16).range(1..=100))]
    pub workers: Option<u16>,

    /// Only count search results, store nothing
    #[arg(short = 'n', long)]
    pub count: bool,
}

/// Log levels accepted by `--loglevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

/// The single action chosen for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Fragments of one document matching a query.
    Fragment { docid: DocId, query: String },
    /// One full document.
    Document(DocId),
    /// An ad hoc search.
    Search(String),
    /// Every document of a type.
    Doctype(String),
    /// A batch of queries from a file.
    QueryFile(PathBuf),
    /// Cited-by walks from each seed.
    CitedBy(Vec<DocId>),
}

impl Args {
    /// Picks the action by fixed priority, or `None` if nothing was asked.
    #[must_use]
    pub fn action(&self) -> Option<Action> {
        match (self.docid, &self.query) {
            (Some(docid), Some(query)) => {
                return Some(Action::Fragment {
                    docid,
                    query: query.clone(),
                });
            }
            (Some(docid), None) => return Some(Action::Document(docid)),
            (None, Some(query)) => return Some(Action::Search(query.clone())),
            (None, None) => {}
        }
        if let Some(doctype) = &self.doctype {
            return Some(Action::Doctype(doctype.clone()));
        }
        if let Some(qfile) = &self.qfile {
            return Some(Action::QueryFile(qfile.clone()));
        }
        if !self.citedby.is_empty() {
            return Some(Action::CitedBy(self.citedby.clone()));
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["ikfetch"]).unwrap();
        assert_eq!(args.loglevel, LogLevel::Info);
        assert_eq!(args.maxcites, 0);
        assert!(args.maxpages.is_none());
        assert!(args.workers.is_none());
        assert!(!args.no_csv);
        assert!(args.action().is_none());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["ikfetch", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["ikfetch", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_loglevel_accepts_warning() {
        let args = Args::try_parse_from(["ikfetch", "-l", "warning"]).unwrap();
        assert_eq!(args.loglevel, LogLevel::Warning);
        assert_eq!(args.loglevel.as_filter(), "warn");

        let result = Args::try_parse_from(["ikfetch", "--loglevel", "verbose"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_workers_range() {
        let args = Args::try_parse_from(["ikfetch", "-N", "100"]).unwrap();
        assert_eq!(args.workers, Some(100));
        assert!(Args::try_parse_from(["ikfetch", "-N", "0"]).is_err());
        assert!(Args::try_parse_from(["ikfetch", "-N", "101"]).is_err());
    }

    #[test]
    fn test_cli_maxpages_rejects_zero() {
        assert!(Args::try_parse_from(["ikfetch", "-p", "0"]).is_err());
        let args = Args::try_parse_from(["ikfetch", "-p", "500"]).unwrap();
        assert_eq!(args.maxpages, Some(500));
    }

    #[test]
    fn test_cli_sortby_values() {
        let args = Args::try_parse_from(["ikfetch", "-S", "leastrecent"]).unwrap();
        assert_eq!(args.sortby.as_deref(), Some("leastrecent"));
        assert!(Args::try_parse_from(["ikfetch", "-S", "random"]).is_err());
    }

    #[test]
    fn test_cli_citedby_takes_many_ids() {
        let args = Args::try_parse_from(["ikfetch", "-C", "1", "2", "3", "--level"]).unwrap();
        assert_eq!(args.action(), Some(Action::CitedBy(vec![1, 2, 3])));
        assert!(args.level);
    }

    #[test]
    fn test_action_priority() {
        let args = Args::try_parse_from(["ikfetch", "-d", "5", "-q", "bail", "-c", "x"]).unwrap();
        assert_eq!(
            args.action(),
            Some(Action::Fragment {
                docid: 5,
                query: "bail".to_string()
            })
        );

        let args = Args::try_parse_from(["ikfetch", "-d", "5", "-Q", "q.txt"]).unwrap();
        assert_eq!(args.action(), Some(Action::Document(5)));

        let args = Args::try_parse_from(["ikfetch", "-q", "bail", "-c", "x"]).unwrap();
        assert_eq!(args.action(), Some(Action::Search("bail".to_string())));

        let args = Args::try_parse_from(["ikfetch", "-c", "x", "-Q", "q.txt", "-C", "1"]).unwrap();
        assert_eq!(args.action(), Some(Action::Doctype("x".to_string())));

        let args = Args::try_parse_from(["ikfetch", "-Q", "q.txt", "-C", "1"]).unwrap();
        assert_eq!(args.action(), Some(Action::QueryFile(PathBuf::from("q.txt"))));
    }

    #[test]
    fn test_cli_no_csv_long_flag() {
        let args = Args::try_parse_from(["ikfetch", "--no-csv", "--pathbysrc"]).unwrap();
        assert!(args.no_csv);
        assert!(args.pathbysrc);
    }
}
