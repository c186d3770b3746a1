//! Similarity API client
//!
//! Thin reqwest wrapper over the two endpoints the dashboard consumes:
//!
//! - `GET {base}/books` -> `[{ id, label }]`
//! - `GET {base}/similarity/{bookId}/{term}` -> `[{ term, similarity, count, coherence }]`
//!
//! Payloads are coerced by `tsim_common::types` so a sloppy field never
//! reaches the aggregation code.

use crate::error::FetchError;
use reqwest::Url;
use std::time::Duration;
use tsim_common::types::{parse_books_payload, parse_similarity_payload};
use tsim_common::{Book, BookId, SimilarityItem};

const USER_AGENT: &str = concat!("tsim-dash/", env!("CARGO_PKG_VERSION"));

/// Similarity API client
#[derive(Debug, Clone)]
pub struct SimilarityClient {
    http_client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl SimilarityClient {
    /// Create new client for the API rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            timeout,
        })
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<serde_json::Value, FetchError> {
        tracing::debug!(url = %url, "Querying similarity API");

        let response = self.http_client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout.as_millis() as u64)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::Api(status.as_u16(), error_text));
        }

        response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout.as_millis() as u64)
            } else {
                FetchError::Parse(e.to_string())
            }
        })
    }

    /// Fetch the book list, sorted by id with positions assigned
    pub async fn fetch_books(&self) -> Result<Vec<Book>, FetchError> {
        let url = self.endpoint(&["books"])?;
        let payload = self.get_json(url).await?;
        let books = parse_books_payload(&payload).map_err(|e| FetchError::Parse(e.to_string()))?;

        tracing::info!(book_count = books.len(), "Retrieved book list");
        Ok(books)
    }

    /// Fetch similarity items for one (book, term) pair
    pub async fn fetch_similarity(
        &self,
        book_id: BookId,
        term: &str,
    ) -> Result<Vec<SimilarityItem>, FetchError> {
        let book = book_id.to_string();
        let url = self.endpoint(&["similarity", &book, term])?;
        let payload = self.get_json(url).await?;
        let items =
            parse_similarity_payload(&payload).map_err(|e| FetchError::Parse(e.to_string()))?;

        tracing::debug!(
            book_id,
            term = %term,
            item_count = items.len(),
            "Retrieved similarity items"
        );
        Ok(items)
    }
}
