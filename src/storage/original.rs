//! File kinds for original renditions.

use std::fmt;

/// The fixed set of extensions an original rendition is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginalKind {
    /// `text/html`, stored as `.html`.
    Html,
    /// `application/postscript`, stored as `.ps`.
    PostScript,
    /// `application/pdf`, stored as `.pdf`.
    Pdf,
    /// `text/plain`, stored as `.txt`.
    Text,
    /// `image/png`, stored as `.png`.
    Png,
    /// Missing or unrecognized content type, stored as `.unknown`.
    Unknown,
}

impl OriginalKind {
    /// Classifies a MIME type by prefix; parameters such as `charset` are
    /// ignored and matching is case-insensitive.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(mime) = content_type else {
            return Self::Unknown;
        };
        let mime = mime.trim().to_ascii_lowercase();

        if mime.starts_with("text/html") {
            Self::Html
        } else if mime.starts_with("application/postscript") {
            Self::PostScript
        } else if mime.starts_with("application/pdf") {
            Self::Pdf
        } else if mime.starts_with("text/plain") {
            Self::Text
        } else if mime.starts_with("image/png") {
            Self::Png
        } else {
            Self::Unknown
        }
    }

    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::PostScript => "ps",
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Png => "png",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OriginalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
