//! # tsim Common Library
//!
//! Shared code for the term-similarity dashboard crates including:
//! - Book and similarity payload types, coerced at the API boundary
//! - Configuration loading and API base URL resolution
//! - Event types (DashEvent enum) and the EventBus
//! - Book color palette

pub mod config;
pub mod error;
pub mod events;
pub mod palette;
pub mod types;

pub use error::{Error, Result};
pub use types::{Book, BookCatalog, BookId, RankBy, SimilarityItem};
