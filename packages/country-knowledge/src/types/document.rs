//! Raw documents as returned by a [`Fetcher`](crate::traits::fetcher::Fetcher).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw document content before extraction.
///
/// Output of fetchers: the body as text, untouched. Extraction turns it
/// into listing stubs or detail fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Locator the document was requested with
    pub locator: String,

    /// Raw body (HTML for the shipped sources)
    pub body: String,

    /// MIME type if the source reported one
    pub content_type: Option<String>,

    /// HTTP status or equivalent
    pub status: u16,

    /// When the document was fetched
    pub fetched_at: DateTime<Utc>,
}

impl RawDocument {
    /// Create a document with a 200 status fetched now.
    pub fn new(locator: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            body: body.into(),
            content_type: None,
            status: 200,
            fetched_at: Utc::now(),
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set the fetched timestamp.
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_document_builder() {
        let doc = RawDocument::new("https://example.com", "<p>Hello</p>")
            .with_content_type("text/html")
            .with_status(203);

        assert_eq!(doc.locator, "https://example.com");
        assert_eq!(doc.content_type.as_deref(), Some("text/html"));
        assert_eq!(doc.status, 203);
    }
}
