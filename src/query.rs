//! Search query composition.
//!
//! A query is free text followed by modifier clauses, always appended in the
//! same order: `fromdate`, `todate`, `added:today`, `sortby`.

use crate::api::DocId;

/// Modifier clauses shared by every query of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryModifiers {
    /// Lower publish-date bound (`DD-MM-YYYY`).
    pub from_date: Option<String>,
    /// Upper publish-date bound (`DD-MM-YYYY`).
    pub to_date: Option<String>,
    /// Restrict to documents added today.
    pub added_today: bool,
    /// Sort order (`mostrecent` or `leastrecent`).
    pub sort_by: Option<String>,
}

impl QueryModifiers {
    /// Appends the configured clauses to `base`.
    #[must_use]
    pub fn compose(&self, base: &str) -> String {
        let mut query = base.to_string();
        if let Some(from) = non_empty(self.from_date.as_deref()) {
            query.push_str(" fromdate: ");
            query.push_str(from);
        }
        if let Some(to) = non_empty(self.to_date.as_deref()) {
            query.push_str(" todate: ");
            query.push_str(to);
        }
        if self.added_today {
            query.push_str(" added:today");
        }
        if let Some(sort) = non_empty(self.sort_by.as_deref()) {
            query.push_str(" sortby: ");
            query.push_str(sort);
        }
        query
    }

    /// Composed query restricted to one document type.
    #[must_use]
    pub fn doctype(&self, doctype: &str) -> String {
        self.compose(&format!("doctypes: {doctype}"))
    }
}

/// Query for the documents citing `id`. Modifiers are not applied.
#[must_use]
pub fn cited_by(id: DocId) -> String {
    format!("citedby:{id}")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
