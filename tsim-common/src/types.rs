//! Book and similarity payload types
//!
//! The similarity API is loosely typed: numeric fields sometimes arrive as
//! strings or null, and older deployments call the book label `title`.
//! Everything is coerced here, once, so downstream code can rely on plain
//! numbers and non-empty terms.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Integer identifier of a book (text corpus)
pub type BookId = i64;

/// One text corpus known to the similarity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Book identifier used in API paths
    pub id: BookId,
    /// Display label
    pub label: String,
    /// Zero-based index after sorting the catalog by id; drives color assignment
    pub position: usize,
}

/// One similar term reported for a (book, query term) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityItem {
    /// The related term
    pub term: String,
    /// Similarity score, typically 0.0-0.55
    pub similarity: f64,
    /// Number of occurrences backing the score
    pub count: u64,
    /// Coherence as a fraction (0.0-1.0)
    pub coherence: f64,
}

/// Ranking key for displayed rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankBy {
    /// Average similarity across books
    #[default]
    Avg,
    /// Maximum similarity across books
    Max,
    /// Minimum similarity across books
    Min,
}

impl RankBy {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RankBy::Avg => "avg",
            RankBy::Max => "max",
            RankBy::Min => "min",
        }
    }
}

impl fmt::Display for RankBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avg" | "mean" | "average" => Ok(RankBy::Avg),
            "max" => Ok(RankBy::Max),
            "min" => Ok(RankBy::Min),
            other => Err(format!("unknown rank key '{}' (expected avg, max or min)", other)),
        }
    }
}

/// Coerce a loosely typed JSON value into a finite f64
///
/// Numbers pass through, numeric strings are parsed, booleans map to 0/1.
/// Null, non-numeric input, NaN and infinities all become 0.0.
pub fn coerce_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };

    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

/// Coerce a loosely typed JSON value into a non-negative count
pub fn coerce_count(value: &Value) -> u64 {
    let n = coerce_f64(value).round();
    if n <= 0.0 {
        0
    } else {
        n as u64
    }
}

fn coerce_book_id(value: &Value) -> Option<BookId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<BookId>().ok(),
        _ => None,
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parse the `/books` payload into a catalog-ordered book list
///
/// Sorted by id ascending, duplicates dropped (first occurrence wins),
/// `position` assigned from the sorted index. Entries without a usable id
/// are skipped.
pub fn parse_books_payload(payload: &Value) -> Result<Vec<Book>> {
    let entries = payload
        .as_array()
        .ok_or_else(|| {
            Error::InvalidInput("Invalid books response format: expected array".to_string())
        })?;

    let mut seen = HashSet::new();
    let mut books: Vec<(BookId, String)> = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(id) = entry.get("id").and_then(coerce_book_id) else {
            tracing::debug!(?entry, "Skipping book entry without usable id");
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        let label = entry
            .get("label")
            .and_then(coerce_text)
            .or_else(|| entry.get("title").and_then(coerce_text))
            .unwrap_or_else(|| id.to_string());
        books.push((id, label));
    }

    books.sort_by_key(|(id, _)| *id);

    Ok(books
        .into_iter()
        .enumerate()
        .map(|(position, (id, label))| Book { id, label, position })
        .collect())
}

/// Parse a `/similarity/{bookId}/{term}` payload
///
/// Items without a term are skipped; numeric fields are coerced.
pub fn parse_similarity_payload(payload: &Value) -> Result<Vec<SimilarityItem>> {
    let entries = payload
        .as_array()
        .ok_or_else(|| {
            Error::InvalidInput("Invalid similarity response format: expected array".to_string())
        })?;

    let null = Value::Null;
    let items = entries
        .iter()
        .filter_map(|entry| {
            let term = entry.get("term").and_then(coerce_text)?;
            Some(SimilarityItem {
                term,
                similarity: coerce_f64(entry.get("similarity").unwrap_or(&null)),
                count: coerce_count(entry.get("count").unwrap_or(&null)),
                coherence: coerce_f64(entry.get("coherence").unwrap_or(&null)),
            })
        })
        .collect();

    Ok(items)
}

/// Startup book list with lookup by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookCatalog {
    books: Vec<Book>,
}

impl BookCatalog {
    /// Build a catalog from books already sorted and positioned
    pub fn new(books: Vec<Book>) -> Self {
        Self { books }
    }

    /// Empty catalog (used when the startup fetch fails)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn ids(&self) -> Vec<BookId> {
        self.books.iter().map(|b| b.id).collect()
    }

    pub fn get(&self, id: BookId) -> Option<&Book> {
        self.books.iter().find(|b| b.id == id)
    }

    pub fn contains(&self, id: BookId) -> bool {
        self.get(id).is_some()
    }

    pub fn first(&self) -> Option<&Book> {
        self.books.first()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }
}
