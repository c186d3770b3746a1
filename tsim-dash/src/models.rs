//! Row and diagnostic types produced by the aggregation pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tsim_common::BookId;

/// One book's data for a row's term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookScore {
    pub similarity: f64,
    /// Occurrence count
    pub n: u64,
    /// Coherence as a percentage (0-100)
    pub coherence: f64,
}

/// A term joined across the selected books
///
/// Rows are values: every pipeline stage produces new rows rather than
/// mutating the ones it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub term: String,
    /// Books with data for this term; absent means no data
    pub by_book: BTreeMap<BookId, BookScore>,
    /// Mean similarity over every present book (0 when none)
    pub avg: f64,
    /// Max similarity over every present book (0 when none)
    pub max: f64,
    /// Min similarity over every present book (0 when none)
    pub min: f64,
    /// Mean similarity excluding the reference book
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Reference similarity minus `mean`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<f64>,
}

impl Row {
    pub fn score(&self, book_id: BookId) -> Option<&BookScore> {
        self.by_book.get(&book_id)
    }

    /// Similarity values of the given books that have data, in the given order
    pub fn similarities_for(&self, book_ids: &[BookId]) -> Vec<f64> {
        book_ids
            .iter()
            .filter_map(|id| self.by_book.get(id).map(|s| s.similarity))
            .collect()
    }
}

/// Filtering diagnostics for one book
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookStats {
    /// Raw cached item count before filtering
    pub total: usize,
    /// Candidate rows dropped because this book lacked data or evidence
    pub removed: usize,
    /// Rows displayed
    pub shown: usize,
}

/// Per-book filtering diagnostics for one aggregation pass
pub type BookCalculationStats = BTreeMap<BookId, BookStats>;
