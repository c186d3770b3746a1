//! Row ranker
//!
//! Sorts rows by the selected key and truncates to the display size.
//!
//! - Absolute mode: descending by `avg`, `max` or `min`.
//! - Reference-relative mode: by `sortable`; `max` and `avg` sort
//!   descending, `min` ascending.
//!
//! Missing values rank as 0. The sort is stable, so ties keep input order.

use crate::models::Row;
use std::cmp::Ordering;
use tsim_common::RankBy;

/// Ranking configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRanker {
    rank_by: RankBy,
    top_n: usize,
}

impl RowRanker {
    pub fn new(rank_by: RankBy, top_n: usize) -> Self {
        Self { rank_by, top_n }
    }

    /// Sorted copy of `rows`, truncated to `top_n`
    ///
    /// `reference_active` switches to the reference-relative ordering.
    pub fn rank(&self, rows: &[Row], reference_active: bool) -> Vec<Row> {
        let mut ranked: Vec<&Row> = rows.iter().collect();

        if reference_active {
            let ascending = self.rank_by == RankBy::Min;
            ranked.sort_by(|a, b| {
                let ordering = compare(a.sortable.unwrap_or(0.0), b.sortable.unwrap_or(0.0));
                if ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        } else {
            let key = self.rank_by;
            ranked.sort_by(|a, b| compare(rank_value(b, key), rank_value(a, key)));
        }

        ranked.into_iter().take(self.top_n).cloned().collect()
    }
}

fn rank_value(row: &Row, rank_by: RankBy) -> f64 {
    match rank_by {
        RankBy::Avg => row.avg,
        RankBy::Max => row.max,
        RankBy::Min => row.min,
    }
}

fn compare(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
