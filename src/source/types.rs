//! Miniflux API data types and the errors an entry source can raise.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by an [`EntrySource`](super::EntrySource) implementation.
///
/// The processor does not distinguish between variants: a failed page fetch
/// aborts the run, a failed update is counted and skipped.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request, including reading the response body, exceeded the timeout
    #[error("Request timed out")]
    Timeout,
    /// Non-2xx response; `message` carries the server's `error_message` when present
    #[error("HTTP error: status {status}{}", server_message(.message))]
    HttpStatus { status: u16, message: Option<String> },
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response body was not valid UTF-8
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    /// Response body did not match the expected JSON shape
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// Base URL could not be parsed or uses an unsupported scheme
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

fn server_message(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({m})"))
        .unwrap_or_default()
}

impl SourceError {
    /// Returns true if the request should be retried after a delay.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            SourceError::Timeout | SourceError::Network(_) => true,
            SourceError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            SourceError::ResponseTooLarge(_)
            | SourceError::InvalidUtf8
            | SourceError::Decode(_)
            | SourceError::InvalidUrl(_) => false,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Entry status as understood by the Miniflux API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Unread,
    Read,
    Removed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Unread => "unread",
            EntryStatus::Read => "read",
            EntryStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

/// Feed metadata attached to entries and returned by the feed listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Feed {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub feed_url: String,
    #[serde(default)]
    pub category: Option<Category>,
}

/// A single entry (article) stored by the remote service.
///
/// Only the fields the rules can look at, plus what is useful in logs, are
/// deserialized; everything else in the API payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Entry {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default)]
    pub published_at: Option<DateTime<FixedOffset>>,
    /// Parent feed; `None` when the payload carries no feed metadata.
    #[serde(default)]
    pub feed: Option<Feed>,
}

impl Entry {
    /// Title of the parent feed, or `""` when the entry has no feed attached.
    pub fn feed_title(&self) -> &str {
        self.feed.as_ref().map(|f| f.title.as_str()).unwrap_or("")
    }
}

/// One page of entries plus the total number of entries matching the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EntryPage {
    pub total: usize,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_deserializes_miniflux_payload() {
        let json = r#"{
            "id": 888,
            "user_id": 123,
            "feed_id": 42,
            "title": "Entry Title",
            "url": "https://example.org/article",
            "author": "Bob",
            "content": "<p>HTML contents</p>",
            "status": "unread",
            "starred": false,
            "published_at": "2016-12-12T16:15:19Z",
            "feed": {
                "id": 42,
                "title": "Tech News",
                "site_url": "https://example.org",
                "feed_url": "https://example.org/feed.xml",
                "category": {"id": 22, "title": "Tech"}
            }
        }"#;

        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, 888);
        assert_eq!(entry.author, "Bob");
        assert_eq!(entry.status, EntryStatus::Unread);
        assert_eq!(entry.feed_title(), "Tech News");
        assert!(entry.published_at.is_some());
        assert_eq!(
            entry.feed.and_then(|f| f.category).map(|c| c.title),
            Some("Tech".to_string())
        );
    }

    #[test]
    fn test_entry_without_feed_has_empty_feed_title() {
        let entry: Entry = serde_json::from_str(r#"{"id": 1, "title": "Lonely"}"#).unwrap();
        assert!(entry.feed.is_none());
        assert_eq!(entry.feed_title(), "");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&EntryStatus::Removed).unwrap(),
            "\"removed\""
        );
        assert_eq!(EntryStatus::Read.to_string(), "read");
    }

    #[test]
    fn test_http_status_error_includes_server_message() {
        let err = SourceError::HttpStatus {
            status: 401,
            message: Some("Access Unauthorized".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "HTTP error: status 401 (Access Unauthorized)"
        );

        let err = SourceError::HttpStatus {
            status: 502,
            message: None,
        };
        assert_eq!(err.to_string(), "HTTP error: status 502");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SourceError::Timeout.is_retryable());
        assert!(SourceError::HttpStatus {
            status: 429,
            message: None
        }
        .is_retryable());
        assert!(!SourceError::HttpStatus {
            status: 400,
            message: None
        }
        .is_retryable());
        assert!(!SourceError::InvalidUtf8.is_retryable());
        assert!(!SourceError::ResponseTooLarge(10).is_retryable());
    }
}
