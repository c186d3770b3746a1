//! Book result fetcher
//!
//! Fans out one similarity request per book missing from the cache and joins
//! them as a single batch. A batch is all-or-nothing: if any request fails
//! the whole batch fails, so the caller never merges a partial result.
//!
//! Requests are not aborted when the selection moves on. Staleness is
//! decided by the controller when the batch resolves (see `FetchTicket`).

use super::similarity_client::SimilarityClient;
use crate::error::{DashboardError, FetchError};
use futures::future::try_join_all;
use std::collections::HashMap;
use tsim_common::{BookId, SimilarityItem};

/// Items for every book in a successful batch
pub type BatchResult = HashMap<BookId, Vec<SimilarityItem>>;

/// Parallel per-book fetcher over the similarity API
#[derive(Debug, Clone)]
pub struct BookResultFetcher {
    client: SimilarityClient,
}

impl BookResultFetcher {
    pub fn new(client: SimilarityClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SimilarityClient {
        &self.client
    }

    /// Fetch `term` for every book in `book_ids`, in parallel
    ///
    /// # Errors
    /// `DashboardError::SimilarityFetch` naming the first book whose request
    /// failed. No items from the batch are returned in that case.
    pub async fn fetch_batch(
        &self,
        term: &str,
        book_ids: &[BookId],
    ) -> Result<BatchResult, DashboardError> {
        if book_ids.is_empty() {
            return Ok(BatchResult::new());
        }

        tracing::debug!(term = %term, ?book_ids, "Fetching similarity batch");

        let requests = book_ids.iter().map(|&book_id| async move {
            self.client
                .fetch_similarity(book_id, term)
                .await
                .map(|items| (book_id, items))
                .map_err(|source: FetchError| DashboardError::SimilarityFetch { book_id, source })
        });

        let results = try_join_all(requests).await.map_err(|e| {
            tracing::warn!(term = %term, error = %e, "Similarity batch failed");
            e
        })?;

        tracing::info!(term = %term, book_count = results.len(), "Similarity batch complete");
        Ok(results.into_iter().collect())
    }
}
