//! Typed views of the API's JSON payloads.
//!
//! Every payload may carry an `errmsg` field instead of data. Parsing goes
//! through [`parse_payload`], which turns that field into
//! [`ApiError::Remote`] so callers only ever see usable data.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use super::ApiError;

/// Identifier of one document in the remote corpus.
pub type DocId = u64;

/// Payloads that can report an API-level error.
pub trait ApiPayload {
    /// The `errmsg` field, if present.
    fn errmsg(&self) -> Option<&Value>;
}

/// One page of search results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    /// Result entries in rank order.
    #[serde(default)]
    pub docs: Vec<ResultEntry>,
    /// Total-found indicator as reported by the API (free-form).
    #[serde(default)]
    pub found: Option<Value>,
    #[serde(default)]
    errmsg: Option<Value>,
}

impl SearchPage {
    /// Human-readable `found` value for logs.
    #[must_use]
    pub fn found_label(&self) -> String {
        match &self.found {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        }
    }
}

impl ApiPayload for SearchPage {
    fn errmsg(&self) -> Option<&Value> {
        self.errmsg.as_ref()
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultEntry {
    /// Document id.
    #[serde(deserialize_with = "deserialize_doc_id")]
    pub tid: DocId,
    /// Document title.
    #[serde(default)]
    pub title: String,
    /// Publish date as sent by the API (`YYYY-MM-DD`).
    #[serde(default)]
    pub publishdate: String,
    /// Court or tribunal that issued the document.
    #[serde(default)]
    pub docsource: String,
}

/// A full document as returned by `/doc/<id>/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentBody {
    /// Document title.
    #[serde(default)]
    pub title: Option<String>,
    /// HTML body.
    #[serde(default)]
    pub doc: Option<String>,
    /// Whether an original court copy exists.
    #[serde(default)]
    pub courtcopy: Option<bool>,
    #[serde(default)]
    errmsg: Option<Value>,
}

impl DocumentBody {
    /// True when the API reports an original rendition for this document.
    #[must_use]
    pub fn has_original(&self) -> bool {
        self.courtcopy.unwrap_or(false)
    }
}

impl ApiPayload for DocumentBody {
    fn errmsg(&self) -> Option<&Value> {
        self.errmsg.as_ref()
    }
}

/// An original rendition as returned by `/origdoc/<id>/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OriginalPayload {
    /// Base64-encoded file contents.
    #[serde(default)]
    pub doc: Option<String>,
    /// MIME type of the decoded contents.
    #[serde(rename = "Content-Type", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    errmsg: Option<Value>,
}

impl ApiPayload for OriginalPayload {
    fn errmsg(&self) -> Option<&Value> {
        self.errmsg.as_ref()
    }
}

/// A payload we only need to check for `errmsg` (fragments, metadata).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpaquePayload {
    #[serde(default)]
    errmsg: Option<Value>,
}

impl ApiPayload for OpaquePayload {
    fn errmsg(&self) -> Option<&Value> {
        self.errmsg.as_ref()
    }
}

/// Parses `body` and rejects payloads carrying `errmsg`.
///
/// # Errors
///
/// [`ApiError::Parse`] for malformed JSON, [`ApiError::Remote`] when the
/// API reported an error.
pub fn parse_payload<T>(route: &str, body: &str) -> Result<T, ApiError>
where
    T: DeserializeOwned + ApiPayload,
{
    let payload: T = serde_json::from_str(body).map_err(|e| ApiError::parse(route, e))?;
    if let Some(errmsg) = payload.errmsg() {
        let message = match errmsg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ApiError::remote(route, message));
    }
    Ok(payload)
}

fn deserialize_doc_id<'de, D>(deserializer: D) -> Result<DocId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(DocId),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid document id: {text}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_page_parses_entries() {
        let body = r#"{"found": "1 - 2 of 2", "docs": [
            {"tid": 11, "title": "A v B", "publishdate": "2020-01-15", "docsource": "Supreme Court of India"},
            {"tid": "12", "title": "C v D", "publishdate": "2019-12-01", "docsource": "Delhi High Court"}
        ]}"#;
        let page: SearchPage = parse_payload("/search/", body).unwrap();
        assert_eq!(page.docs.len(), 2);
        assert_eq!(page.docs[0].tid, 11);
        assert_eq!(page.docs[1].tid, 12);
        assert_eq!(page.found_label(), "1 - 2 of 2");
    }

    #[test]
    fn test_search_page_without_docs_is_empty() {
        let page: SearchPage = parse_payload("/search/", r#"{"found": 0}"#).unwrap();
        assert!(page.docs.is_empty());
        assert_eq!(page.found_label(), "0");
    }

    #[test]
    fn test_errmsg_becomes_remote_error() {
        let result: Result<SearchPage, _> =
            parse_payload("/search/", r#"{"errmsg": "Invalid token"}"#);
        match result {
            Err(ApiError::Remote { message, .. }) => assert_eq!(message, "Invalid token"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_body_is_parse_error() {
        let result: Result<DocumentBody, _> = parse_payload("/doc/1/", "<html>oops</html>");
        assert!(matches!(result, Err(ApiError::Parse { .. })));
    }

    #[test]
    fn test_document_body_courtcopy() {
        let doc: DocumentBody =
            parse_payload("/doc/1/", r#"{"title": "T", "doc": "<p/>", "courtcopy": true}"#)
                .unwrap();
        assert!(doc.has_original());

        let doc: DocumentBody = parse_payload("/doc/1/", r#"{"title": "T"}"#).unwrap();
        assert!(!doc.has_original());
    }

    #[test]
    fn test_original_payload_reads_content_type_header_key() {
        let payload: OriginalPayload = parse_payload(
            "/origdoc/1/",
            r#"{"doc": "aGVsbG8=", "Content-Type": "application/pdf"}"#,
        )
        .unwrap();
        assert_eq!(payload.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(payload.doc.as_deref(), Some("aGVsbG8="));
    }
}
