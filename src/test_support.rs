//! In-memory transport for pipeline tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::api::{ApiClient, ApiError, DocId, Transport};

#[derive(Debug)]
enum Scripted {
    Body(String),
    Fail,
}

#[derive(Debug)]
struct Rule {
    prefix: String,
    responses: VecDeque<Scripted>,
}

/// Answers routes from a script and records every call.
///
/// Rules match by longest route prefix. A rule with several responses plays
/// them in order and keeps repeating the last one. Unmatched routes fail
/// with HTTP 404.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(self, prefix: &str, body: &str) -> Self {
        self.push(prefix, vec![Scripted::Body(body.to_string())])
    }

    pub(crate) fn on_sequence(self, prefix: &str, bodies: &[&str]) -> Self {
        let responses = bodies
            .iter()
            .map(|b| Scripted::Body((*b).to_string()))
            .collect();
        self.push(prefix, responses)
    }

    pub(crate) fn fail(self, prefix: &str) -> Self {
        self.push(prefix, vec![Scripted::Fail])
    }

    fn push(self, prefix: &str, responses: Vec<Scripted>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            prefix: prefix.to_string(),
            responses: responses.into(),
        });
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|route| route.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, route: &str) -> Result<String, ApiError> {
        self.calls.lock().unwrap().push(route.to_string());

        let mut rules = self.rules.lock().unwrap();
        let Some(rule) = rules
            .iter_mut()
            .filter(|rule| route.starts_with(&rule.prefix))
            .max_by_key(|rule| rule.prefix.len())
        else {
            return Err(ApiError::http_status(route, 404));
        };

        let scripted = if rule.responses.len() > 1 {
            rule.responses.pop_front()
        } else {
            None
        };
        let current = scripted.as_ref().or_else(|| rule.responses.front());
        match current {
            Some(Scripted::Body(body)) => Ok(body.clone()),
            Some(Scripted::Fail) | None => Err(ApiError::RetriesExhausted {
                url: route.to_string(),
                attempts: 3,
                last: Box::new(ApiError::http_status(route, 503)),
            }),
        }
    }
}

/// Route prefix for one page of `query`, regardless of page size.
pub(crate) fn search_prefix(query: &str, pagenum: u32) -> String {
    let full = ApiClient::search_route(query, pagenum, 0);
    let cut = full.rfind("maxpages=").unwrap();
    full[..cut].to_string()
}

/// Search page JSON for `(id, title, date, court)` rows.
pub(crate) fn page_json(rows: &[(DocId, &str, &str, &str)]) -> String {
    let docs: Vec<_> = rows
        .iter()
        .map(|(id, title, date, court)| {
            json!({"tid": id, "title": title, "publishdate": date, "docsource": court})
        })
        .collect();
    json!({"found": format!("{} results", rows.len()), "docs": docs}).to_string()
}

/// Document JSON with the given court-copy flag and HTML body.
pub(crate) fn doc_json(title: &str, courtcopy: bool, html: &str) -> String {
    json!({"title": title, "courtcopy": courtcopy, "doc": html}).to_string()
}
