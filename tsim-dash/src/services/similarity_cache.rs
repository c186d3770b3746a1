//! Per-book similarity cache, scoped to one search term
//!
//! The cache only ever holds results for `term()`. Switching terms wipes it
//! entirely; there is no per-book eviction. `merge` refuses a batch fetched
//! for any other term so late results cannot contaminate a new scope.

use std::collections::HashMap;
use tsim_common::{BookId, SimilarityItem};

#[derive(Debug, Clone, Default)]
pub struct SimilarityCache {
    term: String,
    entries: HashMap<BookId, Vec<SimilarityItem>>,
}

impl SimilarityCache {
    /// Create empty cache scoped to `term`
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            entries: HashMap::new(),
        }
    }

    /// Term all cached entries belong to
    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn get(&self, book_id: BookId) -> Option<&[SimilarityItem]> {
        self.entries.get(&book_id).map(Vec::as_slice)
    }

    pub fn put(&mut self, book_id: BookId, items: Vec<SimilarityItem>) {
        self.entries.insert(book_id, items);
    }

    pub fn contains(&self, book_id: BookId) -> bool {
        self.entries.contains_key(&book_id)
    }

    /// Drop every entry, keeping the current term scope
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Invalidate and rescope to a new term
    pub fn reset_for_term(&mut self, term: impl Into<String>) {
        self.invalidate_all();
        self.term = term.into();
    }

    /// Merge a whole batch fetched for `term`
    ///
    /// Returns false (and changes nothing) if `term` is not the cache's scope.
    pub fn merge<I>(&mut self, term: &str, batch: I) -> bool
    where
        I: IntoIterator<Item = (BookId, Vec<SimilarityItem>)>,
    {
        if term != self.term {
            return false;
        }
        self.entries.extend(batch);
        true
    }

    /// Books from `book_ids` with no cached entry, in input order
    pub fn missing(&self, book_ids: &[BookId]) -> Vec<BookId> {
        book_ids
            .iter()
            .copied()
            .filter(|id| !self.contains(*id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
