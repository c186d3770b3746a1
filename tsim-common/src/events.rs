//! Event types for the tsim event system
//!
//! Provides the DashEvent enum and the EventBus used by the dashboard
//! session to report state transitions to any presentation layer.

use crate::types::BookId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Dashboard event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a UI. All variants carry the time the transition happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashEvent {
    /// Startup book list loaded (possibly empty after a failure)
    BooksLoaded {
        /// Number of books in the catalog
        book_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Search term changed; cache invalidated and selection reset
    TermChanged {
        term: String,
        /// Selection after the reset
        selected_book_ids: Vec<BookId>,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Set of selected books changed
    SelectionChanged {
        selected_book_ids: Vec<BookId>,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Reference book set or cleared
    ReferenceBookChanged {
        reference_book_id: Option<BookId>,
        timestamp: DateTime<Utc>,
    },

    /// Fetch batch issued for books missing from the cache
    FetchStarted {
        term: String,
        book_ids: Vec<BookId>,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Fetch batch failed; cache left untouched
    FetchFailed {
        term: String,
        generation: u64,
        /// Human-readable error for display
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Result of a superseded batch dropped without touching state
    StaleResultDiscarded {
        /// Generation the batch was issued under
        batch_generation: u64,
        /// Generation current when it resolved
        current_generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Displayed rows recomputed
    RowsUpdated {
        term: String,
        /// Rows surviving the evidence filter, before truncation
        candidate_count: usize,
        /// Rows actually displayed
        shown_count: usize,
        generation: u64,
        timestamp: DateTime<Utc>,
    },
}

impl DashEvent {
    /// Variant name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            DashEvent::BooksLoaded { .. } => "BooksLoaded",
            DashEvent::TermChanged { .. } => "TermChanged",
            DashEvent::SelectionChanged { .. } => "SelectionChanged",
            DashEvent::ReferenceBookChanged { .. } => "ReferenceBookChanged",
            DashEvent::FetchStarted { .. } => "FetchStarted",
            DashEvent::FetchFailed { .. } => "FetchFailed",
            DashEvent::StaleResultDiscarded { .. } => "StaleResultDiscarded",
            DashEvent::RowsUpdated { .. } => "RowsUpdated",
        }
    }
}

/// Broadcast channel for dashboard events
///
/// Cloning shares the same underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow receivers
    /// start missing old events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DashEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: DashEvent) -> Result<usize, broadcast::error::SendError<DashEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DashEvent) {
        tracing::trace!(kind = event.kind(), "Emitting dashboard event");
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
