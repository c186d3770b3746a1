//! Error types for tsim-dash
//!
//! Fetch-layer errors never escape the controller: they are stored as a
//! `DashboardError` in the session state and shown to the user, while the
//! cache keeps its previous contents.

use thiserror::Error;
use tsim_common::BookId;

/// Error for a single similarity API request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Transport-level failure (connection refused, reset, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// API answered with a non-success status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Response body was not the expected JSON shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Base URL could not be combined with the request path
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// User-visible failure stored next to the selection state
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    /// Startup book list could not be loaded; the catalog is empty
    #[error("Failed to load books: {0}")]
    BooksFetch(FetchError),

    /// A similarity fetch batch failed; nothing from the batch was cached
    #[error("Failed to load similarity data for book {book_id}: {source}")]
    SimilarityFetch {
        book_id: BookId,
        #[source]
        source: FetchError,
    },
}
