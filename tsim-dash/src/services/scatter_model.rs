//! Scatter chart data model
//!
//! Turns displayed rows into plot-ready data: one point series per selected
//! book, a min/max range segment per row, and a padded x-axis range. No
//! drawing happens here.

use crate::models::Row;
use serde::{Deserialize, Serialize};
use tsim_common::palette::color_for_position;
use tsim_common::{Book, BookId};

/// Fraction of the span added to each side of the x axis
const AXIS_PADDING: f64 = 0.05;

/// One plotted point: a book's similarity for the row at `y`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub x: f64,
    /// Row index in display order
    pub y: usize,
    pub term: String,
    pub n: u64,
    /// Coherence percentage
    pub coherence: f64,
}

/// All points for one book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSeries {
    pub book_id: BookId,
    pub label: String,
    pub color: String,
    pub points: Vec<ScatterPoint>,
}

/// Horizontal segment spanning a row's lowest and highest similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSegment {
    pub y: usize,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterModel {
    pub series: Vec<BookSeries>,
    pub ranges: Vec<RangeSegment>,
    pub x_axis: AxisRange,
    /// Term labels for the y axis, in row order
    pub terms: Vec<String>,
}

impl ScatterModel {
    /// Build the chart model for `rows` over `selected_books` (in selection order)
    pub fn build(rows: &[Row], selected_books: &[&Book]) -> Self {
        let series = selected_books
            .iter()
            .map(|book| BookSeries {
                book_id: book.id,
                label: format!("{} - {}", book.id, book.label),
                color: color_for_position(book.position).to_string(),
                points: rows
                    .iter()
                    .enumerate()
                    .filter_map(|(y, row)| {
                        row.score(book.id).map(|score| ScatterPoint {
                            x: score.similarity,
                            y,
                            term: row.term.clone(),
                            n: score.n,
                            coherence: score.coherence,
                        })
                    })
                    .collect(),
            })
            .collect();

        let book_ids: Vec<BookId> = selected_books.iter().map(|b| b.id).collect();

        let ranges = rows
            .iter()
            .enumerate()
            .filter_map(|(y, row)| {
                let values = row.similarities_for(&book_ids);
                if values.is_empty() {
                    return None;
                }
                Some(RangeSegment {
                    y,
                    min: values.iter().copied().fold(f64::INFINITY, f64::min),
                    max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                })
            })
            .collect();

        let all_values: Vec<f64> = rows
            .iter()
            .flat_map(|row| row.similarities_for(&book_ids))
            .collect();

        Self {
            series,
            ranges,
            x_axis: similarity_axis_range(&all_values),
            terms: rows.iter().map(|r| r.term.clone()).collect(),
        }
    }
}

/// Padded x-axis range covering `values`, clamped to [-1, 1]
///
/// Empty input gives [0, 1]. A single distinct value is first widened by
/// 5% of its magnitude (0.05 around zero) so the axis never collapses.
pub fn similarity_axis_range(values: &[f64]) -> AxisRange {
    if values.is_empty() {
        return AxisRange { min: 0.0, max: 1.0 };
    }

    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        let widen = if min == 0.0 { AXIS_PADDING } else { min.abs() * AXIS_PADDING };
        min -= widen;
        max += widen;
    }

    let padding = (max - min) * AXIS_PADDING;
    AxisRange {
        min: (min - padding).max(-1.0),
        max: (max + padding).min(1.0),
    }
}
