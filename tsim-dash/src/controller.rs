//! Selection controller
//!
//! Explicit state container for one dashboard session. Every user action is
//! a transition method, and each transition invalidates only the stages
//! downstream of what it changed:
//!
//! | Transition              | Cache      | Fetch          | Recompute          |
//! |-------------------------|------------|----------------|--------------------|
//! | term                    | wiped      | missing books  | after fetch        |
//! | book selection          | kept       | missing books  | now or after fetch |
//! | reference book          | kept       | none           | aggregate onward   |
//! | min count               | kept       | none           | filter onward      |
//! | rank key / top N        | kept       | none           | rank only          |
//!
//! **Staleness:** term and selection transitions bump a generation counter.
//! A fetch batch carries the generation it was issued under (`FetchTicket`)
//! and is applied only if that is still the current generation; anything
//! older is dropped whole, without touching cache or rows.

use crate::error::DashboardError;
use crate::models::{BookCalculationStats, Row};
use crate::services::row_filter::record_shown;
use crate::services::{
    BatchResult, RowAggregator, RowFilter, RowRanker, ScatterModel, SimilarityCache,
    DEFAULT_MIN_COUNT,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tsim_common::config::TomlConfig;
use tsim_common::events::{DashEvent, EventBus};
use tsim_common::{Book, BookCatalog, BookId, Error, RankBy, Result};

/// User-facing selection, read-only outside the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub term: String,
    /// Insertion order, no duplicates
    pub selected_book_ids: Vec<BookId>,
    /// Always one of `selected_book_ids` when set
    pub reference_book_id: Option<BookId>,
    pub rank_by: RankBy,
    pub top_n: usize,
    pub min_count: u64,
}

/// Controller defaults, usually taken from the TOML config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub default_book_id: Option<BookId>,
    pub rank_by: RankBy,
    pub top_n: usize,
    pub min_count: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            default_book_id: None,
            rank_by: RankBy::Avg,
            top_n: 25,
            min_count: DEFAULT_MIN_COUNT,
        }
    }
}

impl From<&TomlConfig> for ControllerSettings {
    fn from(config: &TomlConfig) -> Self {
        Self {
            default_book_id: config.default_book_id,
            rank_by: config.rank_by,
            top_n: config.top_n,
            min_count: config.min_count,
        }
    }
}

/// A fetch batch to run, tagged with the generation that requested it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub term: String,
    pub book_ids: Vec<BookId>,
}

/// What happened when a batch result was handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Merged into the cache and rows recomputed
    Applied,
    /// Batch failed; error stored, cache untouched
    Failed,
    /// Batch superseded by a newer term or selection; dropped
    Stale,
}

/// Owned read-only view of the controller for presentation
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub state: SelectionState,
    pub books: Vec<Book>,
    pub rows: Vec<Row>,
    pub stats: BookCalculationStats,
    /// Rows that passed the filter before truncation
    pub candidate_count: usize,
    pub loading: bool,
    pub generation: u64,
    pub books_error: Option<DashboardError>,
    pub last_error: Option<DashboardError>,
}

/// Session state machine over cache, selection and derived rows
#[derive(Debug)]
pub struct SelectionController {
    catalog: BookCatalog,
    default_book_id: Option<BookId>,
    state: SelectionState,
    cache: SimilarityCache,
    generation: u64,
    pending: Option<FetchTicket>,
    aggregator: RowAggregator,
    /// Aggregator output for the current cache/selection/reference
    aggregated: Vec<Row>,
    /// Filter output, before ranking
    candidates: Vec<Row>,
    rows: Vec<Row>,
    stats: BookCalculationStats,
    books_error: Option<DashboardError>,
    last_error: Option<DashboardError>,
    events: EventBus,
}

impl SelectionController {
    pub fn new(catalog: BookCatalog, settings: ControllerSettings, events: EventBus) -> Self {
        Self {
            catalog,
            default_book_id: settings.default_book_id,
            state: SelectionState {
                term: String::new(),
                selected_book_ids: Vec::new(),
                reference_book_id: None,
                rank_by: settings.rank_by,
                top_n: settings.top_n.max(1),
                min_count: settings.min_count,
            },
            cache: SimilarityCache::default(),
            generation: 0,
            pending: None,
            aggregator: RowAggregator::new(),
            aggregated: Vec::new(),
            candidates: Vec::new(),
            rows: Vec::new(),
            stats: BookCalculationStats::new(),
            books_error: None,
            last_error: None,
            events,
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn catalog(&self) -> &BookCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &SimilarityCache {
        &self.cache
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn stats(&self) -> &BookCalculationStats {
        &self.stats
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&DashboardError> {
        self.last_error.as_ref()
    }

    /// True while a batch for the current generation is outstanding
    pub fn is_loading(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|ticket| ticket.generation == self.generation)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            state: self.state.clone(),
            books: self.catalog.books().to_vec(),
            rows: self.rows.clone(),
            stats: self.stats.clone(),
            candidate_count: self.candidates.len(),
            loading: self.is_loading(),
            generation: self.generation,
            books_error: self.books_error.clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Chart model for the displayed rows over the selected books
    pub fn scatter_model(&self) -> ScatterModel {
        let books: Vec<&Book> = self
            .state
            .selected_book_ids
            .iter()
            .filter_map(|id| self.catalog.get(*id))
            .collect();
        ScatterModel::build(&self.rows, &books)
    }

    /// Record that the startup book list could not be loaded
    pub fn record_books_error(&mut self, error: DashboardError) {
        warn!(error = %error, "Book list unavailable, no books selectable");
        self.books_error = Some(error);
    }

    // ------------------------------------------------------------------
    // Term
    // ------------------------------------------------------------------

    /// Switch to a new search term: wipe the cache and restart the pipeline
    ///
    /// Selection resets to the default book; any in-flight batch becomes stale.
    /// Re-submitting the current term changes nothing.
    pub fn set_term(&mut self, term: &str) -> Result<Option<FetchTicket>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(Error::InvalidInput("search term must not be empty".to_string()));
        }
        if term == self.state.term {
            return Ok(None);
        }

        self.generation += 1;
        self.cache.reset_for_term(term);
        self.state.term = term.to_string();
        self.state.selected_book_ids = self.default_selection();
        self.state.reference_book_id = None;
        self.pending = None;
        self.last_error = None;
        self.clear_rows();

        info!(
            term = %term,
            generation = self.generation,
            selected = ?self.state.selected_book_ids,
            "Search term changed"
        );
        self.events.emit_lossy(DashEvent::TermChanged {
            term: term.to_string(),
            selected_book_ids: self.state.selected_book_ids.clone(),
            generation: self.generation,
            timestamp: Utc::now(),
        });

        Ok(self.request_missing())
    }

    fn default_selection(&self) -> Vec<BookId> {
        self.default_book_id
            .filter(|id| self.catalog.contains(*id))
            .or_else(|| self.catalog.first().map(|b| b.id))
            .into_iter()
            .collect()
    }

    // ------------------------------------------------------------------
    // Book selection
    // ------------------------------------------------------------------

    /// Replace the selection; duplicates are dropped, first occurrence wins
    ///
    /// Cache is kept. Returns a ticket for selected books not yet cached.
    pub fn set_selected_books(&mut self, book_ids: &[BookId]) -> Result<Option<FetchTicket>> {
        let mut selection: Vec<BookId> = Vec::with_capacity(book_ids.len());
        for &id in book_ids {
            if !self.catalog.contains(id) {
                return Err(Error::InvalidInput(format!("unknown book id {}", id)));
            }
            if !selection.contains(&id) {
                selection.push(id);
            }
        }

        if selection == self.state.selected_book_ids {
            return Ok(None);
        }

        self.generation += 1;
        self.state.selected_book_ids = selection;

        let mut reference_cleared = false;
        if let Some(reference) = self.state.reference_book_id {
            if !self.state.selected_book_ids.contains(&reference) {
                self.state.reference_book_id = None;
                debug!(reference, "Reference book deselected, clearing reference");
                self.events.emit_lossy(DashEvent::ReferenceBookChanged {
                    reference_book_id: None,
                    timestamp: Utc::now(),
                });
                reference_cleared = true;
            }
        }

        debug!(
            generation = self.generation,
            selected = ?self.state.selected_book_ids,
            "Book selection changed"
        );
        self.events.emit_lossy(DashEvent::SelectionChanged {
            selected_book_ids: self.state.selected_book_ids.clone(),
            generation: self.generation,
            timestamp: Utc::now(),
        });

        let ticket = self.request_missing();
        if reference_cleared && ticket.is_some() {
            self.recompute();
        }
        Ok(ticket)
    }

    pub fn add_book(&mut self, book_id: BookId) -> Result<Option<FetchTicket>> {
        let mut selection = self.state.selected_book_ids.clone();
        selection.push(book_id);
        self.set_selected_books(&selection)
    }

    pub fn remove_book(&mut self, book_id: BookId) -> Result<Option<FetchTicket>> {
        let selection: Vec<BookId> = self
            .state
            .selected_book_ids
            .iter()
            .copied()
            .filter(|id| *id != book_id)
            .collect();
        self.set_selected_books(&selection)
    }

    pub fn toggle_book(&mut self, book_id: BookId) -> Result<Option<FetchTicket>> {
        if self.state.selected_book_ids.contains(&book_id) {
            self.remove_book(book_id)
        } else {
            self.add_book(book_id)
        }
    }

    /// Select every catalog book, in catalog order
    pub fn select_all(&mut self) -> Result<Option<FetchTicket>> {
        let all = self.catalog.ids();
        self.set_selected_books(&all)
    }

    pub fn clear_books(&mut self) -> Result<Option<FetchTicket>> {
        self.set_selected_books(&[])
    }

    // ------------------------------------------------------------------
    // Reference and display
    // ------------------------------------------------------------------

    /// Set or clear the reference book; re-aggregates from cache, no fetch
    pub fn set_reference_book(&mut self, book_id: Option<BookId>) -> Result<()> {
        if let Some(id) = book_id {
            if !self.state.selected_book_ids.contains(&id) {
                return Err(Error::InvalidInput(format!(
                    "reference book {} is not selected",
                    id
                )));
            }
        }
        if book_id == self.state.reference_book_id {
            return Ok(());
        }

        self.state.reference_book_id = book_id;
        debug!(reference = ?book_id, "Reference book changed");
        self.events.emit_lossy(DashEvent::ReferenceBookChanged {
            reference_book_id: book_id,
            timestamp: Utc::now(),
        });

        self.recompute();
        Ok(())
    }

    /// Change the minimum evidence count; re-filters and re-ranks
    ///
    /// While a batch is loading the rows may still carry an older selection,
    /// so they are re-aggregated first.
    pub fn set_min_count(&mut self, min_count: u64) {
        if min_count == self.state.min_count {
            return;
        }
        self.state.min_count = min_count;
        if self.is_loading() {
            self.recompute();
        } else {
            self.refilter();
        }
    }

    /// Change the ranking key; re-ranks existing candidates only
    pub fn set_rank_by(&mut self, rank_by: RankBy) {
        if rank_by == self.state.rank_by {
            return;
        }
        self.state.rank_by = rank_by;
        self.rerank();
    }

    /// Change the display size; re-ranks existing candidates only
    pub fn set_top_n(&mut self, top_n: usize) -> Result<()> {
        if top_n == 0 {
            return Err(Error::InvalidInput("top_n must be greater than 0".to_string()));
        }
        if top_n == self.state.top_n {
            return Ok(());
        }
        self.state.top_n = top_n;
        self.rerank();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fetch resolution
    // ------------------------------------------------------------------

    /// Hand back the result of a batch issued for `ticket`
    ///
    /// Applied atomically if the ticket is still current; otherwise dropped.
    pub fn apply_fetch_result(
        &mut self,
        ticket: &FetchTicket,
        result: std::result::Result<BatchResult, DashboardError>,
    ) -> ApplyOutcome {
        if ticket.generation != self.generation || ticket.term != self.cache.term() {
            debug!(
                batch_generation = ticket.generation,
                current_generation = self.generation,
                "Discarding stale fetch result"
            );
            self.events.emit_lossy(DashEvent::StaleResultDiscarded {
                batch_generation: ticket.generation,
                current_generation: self.generation,
                timestamp: Utc::now(),
            });
            return ApplyOutcome::Stale;
        }

        self.pending = None;

        match result {
            Ok(batch) => {
                let book_count = batch.len();
                self.cache.merge(&ticket.term, batch);
                self.last_error = None;
                info!(
                    term = %ticket.term,
                    generation = ticket.generation,
                    book_count,
                    "Applied fetch batch"
                );
                self.recompute();
                ApplyOutcome::Applied
            }
            Err(error) => {
                warn!(
                    term = %ticket.term,
                    generation = ticket.generation,
                    error = %error,
                    "Fetch batch failed, cache unchanged"
                );
                self.events.emit_lossy(DashEvent::FetchFailed {
                    term: ticket.term.clone(),
                    generation: ticket.generation,
                    message: error.to_string(),
                    timestamp: Utc::now(),
                });
                self.last_error = Some(error);
                self.recompute();
                ApplyOutcome::Failed
            }
        }
    }

    // ------------------------------------------------------------------
    // Pipeline stages
    // ------------------------------------------------------------------

    /// Issue a ticket for uncached selected books, or recompute right away
    fn request_missing(&mut self) -> Option<FetchTicket> {
        if self.state.term.is_empty() {
            return None;
        }

        let missing = self.cache.missing(&self.state.selected_book_ids);
        if missing.is_empty() {
            self.pending = None;
            self.recompute();
            return None;
        }

        let ticket = FetchTicket {
            generation: self.generation,
            term: self.state.term.clone(),
            book_ids: missing,
        };
        debug!(
            term = %ticket.term,
            generation = ticket.generation,
            book_ids = ?ticket.book_ids,
            "Requesting uncached books"
        );
        self.events.emit_lossy(DashEvent::FetchStarted {
            term: ticket.term.clone(),
            book_ids: ticket.book_ids.clone(),
            generation: ticket.generation,
            timestamp: Utc::now(),
        });
        self.pending = Some(ticket.clone());
        Some(ticket)
    }

    fn clear_rows(&mut self) {
        self.aggregated.clear();
        self.candidates.clear();
        self.rows.clear();
        self.stats.clear();
    }

    /// Books the rows are computed over
    ///
    /// While a batch is loading only the selected books already cached take
    /// part; the batch recomputes over the full selection when it lands.
    fn computed_book_ids(&self) -> Vec<BookId> {
        if self.is_loading() {
            self.state
                .selected_book_ids
                .iter()
                .copied()
                .filter(|id| self.cache.contains(*id))
                .collect()
        } else {
            self.state.selected_book_ids.clone()
        }
    }

    /// Aggregate, filter and rank from the current cache
    fn recompute(&mut self) {
        let book_ids = self.computed_book_ids();
        self.aggregated = self
            .aggregator
            .aggregate(&book_ids, &self.cache, self.state.reference_book_id);
        self.refilter();
    }

    fn refilter(&mut self) {
        let book_ids = self.computed_book_ids();
        let outcome = RowFilter::new(self.state.min_count).filter(
            &self.aggregated,
            &book_ids,
            &self.cache,
        );
        self.candidates = outcome.rows;
        self.stats = outcome.stats;
        self.rerank();
    }

    fn rerank(&mut self) {
        let ranker = RowRanker::new(self.state.rank_by, self.state.top_n);
        self.rows = ranker.rank(&self.candidates, self.state.reference_book_id.is_some());
        record_shown(&mut self.stats, self.rows.len());

        self.events.emit_lossy(DashEvent::RowsUpdated {
            term: self.state.term.clone(),
            candidate_count: self.candidates.len(),
            shown_count: self.rows.len(),
            generation: self.generation,
            timestamp: Utc::now(),
        });
    }
}
