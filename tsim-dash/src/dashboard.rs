//! Dashboard session
//!
//! Async shell around `SelectionController`. Transitions run under the write
//! lock; when one yields a `FetchTicket` the batch is spawned as a tokio task
//! whose result is applied under the lock again, in a single step. The task
//! handle is returned so callers can wait for the batch if they want to.
//!
//! Fetches are never aborted. A batch that resolves after the selection moved
//! on is simply rejected by the controller's generation check.

use crate::controller::{
    ApplyOutcome, ControllerSettings, DashboardSnapshot, FetchTicket, SelectionController,
};
use crate::error::DashboardError;
use crate::services::{BookResultFetcher, ScatterModel};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tsim_common::events::{DashEvent, EventBus};
use tsim_common::{BookCatalog, BookId, RankBy, Result};

/// Handle of a spawned fetch batch
pub type FetchHandle = JoinHandle<ApplyOutcome>;

/// Shared dashboard session
///
/// Cloning shares the same controller, fetcher and event bus.
#[derive(Clone)]
pub struct Dashboard {
    controller: Arc<RwLock<SelectionController>>,
    fetcher: Arc<BookResultFetcher>,
    events: EventBus,
}

impl Dashboard {
    /// Wrap an existing controller
    pub fn new(
        controller: SelectionController,
        fetcher: BookResultFetcher,
        events: EventBus,
    ) -> Self {
        Self {
            controller: Arc::new(RwLock::new(controller)),
            fetcher: Arc::new(fetcher),
            events,
        }
    }

    /// Load the book catalog and build a session
    ///
    /// A failed book fetch is not fatal: the session starts with an empty
    /// catalog and the error is kept for display.
    pub async fn connect(
        fetcher: BookResultFetcher,
        settings: ControllerSettings,
        events: EventBus,
    ) -> Self {
        let (catalog, books_error) = match fetcher.client().fetch_books().await {
            Ok(books) => (BookCatalog::new(books), None),
            Err(e) => {
                warn!(error = %e, "Failed to load book list");
                (BookCatalog::empty(), Some(DashboardError::BooksFetch(e)))
            }
        };

        info!(book_count = catalog.len(), "Book catalog ready");
        events.emit_lossy(DashEvent::BooksLoaded {
            book_count: catalog.len(),
            timestamp: Utc::now(),
        });

        let mut controller = SelectionController::new(catalog, settings, events.clone());
        if let Some(error) = books_error {
            controller.record_books_error(error);
        }

        Self::new(controller, fetcher, events)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.controller.read().await.snapshot()
    }

    pub async fn scatter_model(&self) -> ScatterModel {
        self.controller.read().await.scatter_model()
    }

    pub async fn set_term(&self, term: &str) -> Result<Option<FetchHandle>> {
        let ticket = self.controller.write().await.set_term(term)?;
        Ok(self.dispatch(ticket))
    }

    pub async fn set_selected_books(&self, book_ids: &[BookId]) -> Result<Option<FetchHandle>> {
        let ticket = self.controller.write().await.set_selected_books(book_ids)?;
        Ok(self.dispatch(ticket))
    }

    pub async fn add_book(&self, book_id: BookId) -> Result<Option<FetchHandle>> {
        let ticket = self.controller.write().await.add_book(book_id)?;
        Ok(self.dispatch(ticket))
    }

    pub async fn remove_book(&self, book_id: BookId) -> Result<Option<FetchHandle>> {
        let ticket = self.controller.write().await.remove_book(book_id)?;
        Ok(self.dispatch(ticket))
    }

    pub async fn toggle_book(&self, book_id: BookId) -> Result<Option<FetchHandle>> {
        let ticket = self.controller.write().await.toggle_book(book_id)?;
        Ok(self.dispatch(ticket))
    }

    pub async fn select_all(&self) -> Result<Option<FetchHandle>> {
        let ticket = self.controller.write().await.select_all()?;
        Ok(self.dispatch(ticket))
    }

    pub async fn clear_books(&self) -> Result<Option<FetchHandle>> {
        let ticket = self.controller.write().await.clear_books()?;
        Ok(self.dispatch(ticket))
    }

    pub async fn set_reference_book(&self, book_id: Option<BookId>) -> Result<()> {
        self.controller.write().await.set_reference_book(book_id)
    }

    pub async fn set_rank_by(&self, rank_by: RankBy) {
        self.controller.write().await.set_rank_by(rank_by);
    }

    pub async fn set_top_n(&self, top_n: usize) -> Result<()> {
        self.controller.write().await.set_top_n(top_n)
    }

    pub async fn set_min_count(&self, min_count: u64) {
        self.controller.write().await.set_min_count(min_count);
    }

    /// Spawn the batch for `ticket`, if any
    fn dispatch(&self, ticket: Option<FetchTicket>) -> Option<FetchHandle> {
        let ticket = ticket?;
        let controller = Arc::clone(&self.controller);
        let fetcher = Arc::clone(&self.fetcher);

        Some(tokio::spawn(async move {
            let result = fetcher.fetch_batch(&ticket.term, &ticket.book_ids).await;
            controller.write().await.apply_fetch_result(&ticket, result)
        }))
    }
}
