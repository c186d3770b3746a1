//! tsim-dash library interface
//!
//! Client-side aggregation and caching engine for the term-similarity
//! dashboard: fetches per-book similarity results, caches them per search
//! term, joins them into rows and filters/ranks those rows for display.

pub mod controller;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod services;

pub use crate::controller::{
    ApplyOutcome, ControllerSettings, DashboardSnapshot, FetchTicket, SelectionController,
    SelectionState,
};
pub use crate::dashboard::{Dashboard, FetchHandle};
pub use crate::error::{DashboardError, FetchError};
pub use crate::models::{BookCalculationStats, BookScore, BookStats, Row};
