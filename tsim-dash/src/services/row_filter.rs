//! Row filter
//!
//! Keeps a row only when every selected book has data for its term with at
//! least `min_count` occurrences.
//!
//! **Counting window:** `removed` is tallied over the full candidate set
//! handed in (everything the aggregator produced, before ranking and
//! truncation). A row failing for several books counts once for each of
//! them. `shown` starts as the surviving candidate count and is replaced with
//! the displayed count by `record_shown` once the ranker has truncated.

use super::similarity_cache::SimilarityCache;
use crate::models::{BookCalculationStats, BookStats, Row};
use tsim_common::BookId;

/// Default minimum occurrence count per book
pub const DEFAULT_MIN_COUNT: u64 = 5;

/// Rows that survived filtering plus per-book diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub rows: Vec<Row>,
    pub stats: BookCalculationStats,
}

/// Minimum-evidence row filter
#[derive(Debug, Clone, Copy)]
pub struct RowFilter {
    min_count: u64,
}

impl RowFilter {
    pub fn new(min_count: u64) -> Self {
        Self { min_count }
    }

    /// Drop rows lacking data or evidence for any selected book
    pub fn filter(
        &self,
        rows: &[Row],
        selected_book_ids: &[BookId],
        cache: &SimilarityCache,
    ) -> FilterOutcome {
        let mut stats: BookCalculationStats = selected_book_ids
            .iter()
            .map(|&id| {
                let total = cache.get(id).map_or(0, |items| items.len());
                (id, BookStats { total, ..BookStats::default() })
            })
            .collect();

        let mut kept = Vec::with_capacity(rows.len());

        for row in rows {
            let mut keep = true;
            for &book_id in selected_book_ids {
                let sufficient = row
                    .score(book_id)
                    .is_some_and(|score| score.n >= self.min_count);
                if !sufficient {
                    keep = false;
                    if let Some(book_stats) = stats.get_mut(&book_id) {
                        book_stats.removed += 1;
                    }
                }
            }
            if keep {
                kept.push(row.clone());
            }
        }

        record_shown(&mut stats, kept.len());

        tracing::debug!(
            candidates = rows.len(),
            kept = kept.len(),
            min_count = self.min_count,
            "Filtered rows"
        );

        FilterOutcome { rows: kept, stats }
    }
}

impl Default for RowFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_COUNT)
    }
}

/// Set every book's `shown` to the number of rows displayed
pub fn record_shown(stats: &mut BookCalculationStats, shown: usize) {
    for book_stats in stats.values_mut() {
        book_stats.shown = shown;
    }
}
