//! Data pipeline services
//!
//! Leaf to root: cache, client and fetcher, aggregator, filter, ranker,
//! plus the scatter chart model built from the ranked rows.

pub mod result_fetcher;
pub mod row_aggregator;
pub mod row_filter;
pub mod row_ranker;
pub mod scatter_model;
pub mod similarity_cache;
pub mod similarity_client;

pub use result_fetcher::{BatchResult, BookResultFetcher};
pub use row_aggregator::RowAggregator;
pub use row_filter::{FilterOutcome, RowFilter, DEFAULT_MIN_COUNT};
pub use row_ranker::RowRanker;
pub use scatter_model::ScatterModel;
pub use similarity_cache::SimilarityCache;
pub use similarity_client::SimilarityClient;
