//! Row aggregator
//!
//! Joins the cached per-book result sets into one row per term and computes
//! the cross-book statistics.
//!
//! **Statistics:**
//! - `avg`/`max`/`min` cover every book present in the row, reference included
//! - with a reference book present in the row, `mean` excludes it and
//!   `sortable = reference similarity - mean`
//!
//! Output order is the order in which terms were first seen (selected book
//! order, then item order). It carries no meaning; the ranker re-sorts.

use super::similarity_cache::SimilarityCache;
use crate::models::{BookScore, Row};
use std::collections::{BTreeMap, HashMap};
use tsim_common::BookId;

/// Stateless row aggregator
#[derive(Debug, Clone, Copy, Default)]
pub struct RowAggregator;

impl RowAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Join cached items for `selected_book_ids` into rows keyed by term
    ///
    /// Books without a cache entry are skipped, so `by_book` only ever holds
    /// books that are both selected and cached.
    pub fn aggregate(
        &self,
        selected_book_ids: &[BookId],
        cache: &SimilarityCache,
        reference_book_id: Option<BookId>,
    ) -> Vec<Row> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut joined: Vec<(String, BTreeMap<BookId, BookScore>)> = Vec::new();

        for &book_id in selected_book_ids {
            let Some(items) = cache.get(book_id) else {
                continue;
            };

            for item in items {
                let slot = *index.entry(item.term.clone()).or_insert_with(|| {
                    joined.push((item.term.clone(), BTreeMap::new()));
                    joined.len() - 1
                });

                joined[slot].1.insert(
                    book_id,
                    BookScore {
                        similarity: item.similarity,
                        n: item.count,
                        coherence: item.coherence * 100.0,
                    },
                );
            }
        }

        let rows: Vec<Row> = joined
            .into_iter()
            .map(|(term, by_book)| build_row(term, by_book, reference_book_id))
            .collect();

        tracing::debug!(
            term = %cache.term(),
            row_count = rows.len(),
            ?reference_book_id,
            "Aggregated rows"
        );

        rows
    }
}

fn build_row(
    term: String,
    by_book: BTreeMap<BookId, BookScore>,
    reference_book_id: Option<BookId>,
) -> Row {
    let all: Vec<f64> = by_book.values().map(|s| s.similarity).collect();
    let (avg, max, min) = summarize(&all);

    let reference = reference_book_id.and_then(|id| by_book.get(&id).map(|s| (id, s)));
    let (mean, sortable) = match reference {
        Some((reference_id, reference)) => {
            let others: Vec<f64> = by_book
                .iter()
                .filter(|(id, _)| **id != reference_id)
                .map(|(_, s)| s.similarity)
                .collect();
            let (mean, _, _) = summarize(&others);
            (Some(mean), Some(reference.similarity - mean))
        }
        None => (None, None),
    };

    Row {
        term,
        by_book,
        avg,
        max,
        min,
        mean,
        sortable,
    }
}

/// (mean, max, min) of `values`, all 0 for an empty slice
fn summarize(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let sum: f64 = values.iter().sum();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    (sum / values.len() as f64, max, min)
}
