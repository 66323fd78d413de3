//! User-Agent string for API traffic.

/// Default User-Agent for API requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("ikfetch/{version} (legal-research-tool)")
}
