//! Integration tests for the similarity fetch path
//!
//! Tests run against an in-process axum mock of the similarity API:
//! - Book catalog loading and failure degradation
//! - Parallel batch fetching and all-or-nothing failure
//! - Staleness of superseded batches
//! - Cache isolation across term changes
//! - Timeouts and transport errors

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tsim_common::events::EventBus;
use tsim_common::BookId;
use tsim_dash::services::{BookResultFetcher, SimilarityClient};
use tsim_dash::{ApplyOutcome, ControllerSettings, Dashboard, DashboardError, FetchError};

/// Canned API responses
#[derive(Default)]
struct MockApi {
    books: Option<Value>,
    similarity: HashMap<(BookId, String), Value>,
    failing_books: HashSet<BookId>,
    slow_books: HashMap<BookId, Duration>,
    requests: AtomicUsize,
}

impl MockApi {
    fn with_books() -> Self {
        let mut api = MockApi {
            books: Some(json!([
                {"id": 33310, "label": "Book Two"},
                {"id": 3300, "label": "Book One"},
                {"id": 30107, "label": "Book Three"},
            ])),
            ..MockApi::default()
        };

        api.similarity.insert(
            (3300, "market".to_string()),
            json!([
                {"term": "trade", "similarity": 0.42, "count": 40, "coherence": 0.91},
                {"term": "price", "similarity": 0.31, "count": 12, "coherence": 0.88},
                {"term": "stall", "similarity": 0.25, "count": 3, "coherence": 0.70},
            ]),
        );
        api.similarity.insert(
            (33310, "market".to_string()),
            json!([
                {"term": "trade", "similarity": "0.22", "count": "15", "coherence": 0.85},
                {"term": "price", "similarity": 0.36, "count": 9, "coherence": null},
                {"term": "stall", "similarity": 0.30, "count": 30, "coherence": 0.75},
            ]),
        );
        api.similarity.insert(
            (30107, "market".to_string()),
            json!([
                {"term": "trade", "similarity": 0.30, "count": 22, "coherence": 0.80},
                {"term": "price", "similarity": 0.12, "count": 6, "coherence": 0.60},
            ]),
        );
        api.similarity.insert(
            (3300, "labour".to_string()),
            json!([
                {"term": "work", "similarity": 0.50, "count": 80, "coherence": 0.95},
                {"term": "wages", "similarity": 0.44, "count": 25, "coherence": 0.90},
            ]),
        );
        api.similarity.insert(
            (3300, "free trade".to_string()),
            json!([{"term": "tariff", "similarity": 0.33, "count": 11, "coherence": 0.5}]),
        );
        api
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

async fn books(State(api): State<Arc<MockApi>>) -> Result<Json<Value>, StatusCode> {
    api.requests.fetch_add(1, Ordering::SeqCst);
    api.books.clone().map(Json).ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

async fn similarity(
    State(api): State<Arc<MockApi>>,
    Path((book_id, term)): Path<(BookId, String)>,
) -> Result<Json<Value>, (StatusCode, String)> {
    api.requests.fetch_add(1, Ordering::SeqCst);

    if let Some(delay) = api.slow_books.get(&book_id) {
        tokio::time::sleep(*delay).await;
    }
    if api.failing_books.contains(&book_id) {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "similarity backend down".to_string()));
    }

    Ok(Json(api.similarity.get(&(book_id, term)).cloned().unwrap_or_else(|| json!([]))))
}

/// Start the mock API on an ephemeral port, returning its base URL
async fn spawn_mock(api: Arc<MockApi>) -> String {
    let app = Router::new()
        .route("/books", get(books))
        .route("/similarity/:book_id/:term", get(similarity))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn fetcher(base_url: &str, timeout: Duration) -> BookResultFetcher {
    BookResultFetcher::new(SimilarityClient::new(base_url, timeout).unwrap())
}

async fn dashboard(api: Arc<MockApi>) -> Dashboard {
    let base_url = spawn_mock(api).await;
    Dashboard::connect(
        fetcher(&base_url, Duration::from_secs(5)),
        ControllerSettings::default(),
        EventBus::new(100),
    )
    .await
}

#[tokio::test]
async fn test_books_loaded_sorted_with_positions() {
    let base_url = spawn_mock(Arc::new(MockApi::with_books())).await;
    let client = SimilarityClient::new(&base_url, Duration::from_secs(5)).unwrap();

    let books = client.fetch_books().await.unwrap();
    let ids: Vec<BookId> = books.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![3300, 30107, 33310]);
    assert_eq!(books.iter().map(|b| b.position).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_books_failure_degrades_to_empty_catalog() {
    let api = Arc::new(MockApi::default());
    let dashboard = dashboard(api).await;

    let snapshot = dashboard.snapshot().await;
    assert!(snapshot.books.is_empty());
    assert!(matches!(
        snapshot.books_error,
        Some(DashboardError::BooksFetch(FetchError::Api(503, _)))
    ));
    assert!(dashboard.add_book(3300).await.is_err());
}

#[tokio::test]
async fn test_batch_fetches_all_books() {
    let api = Arc::new(MockApi::with_books());
    let base_url = spawn_mock(Arc::clone(&api)).await;

    let result = fetcher(&base_url, Duration::from_secs(5))
        .fetch_batch("market", &[3300, 33310, 30107])
        .await
        .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result[&3300].len(), 3);
    // numeric strings and nulls coerced at the boundary
    let trade = result[&33310].iter().find(|i| i.term == "trade").unwrap();
    assert_eq!(trade.similarity, 0.22);
    assert_eq!(trade.count, 15);
    let price = result[&33310].iter().find(|i| i.term == "price").unwrap();
    assert_eq!(price.coherence, 0.0);
    assert_eq!(api.request_count(), 3);
}

#[tokio::test]
async fn test_batch_fails_as_a_whole() {
    let mut api = MockApi::with_books();
    api.failing_books.insert(30107);
    let base_url = spawn_mock(Arc::new(api)).await;

    let result = fetcher(&base_url, Duration::from_secs(5))
        .fetch_batch("market", &[3300, 30107])
        .await;

    match result {
        Err(DashboardError::SimilarityFetch { book_id, source }) => {
            assert_eq!(book_id, 30107);
            assert!(matches!(source, FetchError::Api(500, _)));
        }
        other => panic!("expected batch failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_term_is_path_encoded() {
    let base_url = spawn_mock(Arc::new(MockApi::with_books())).await;
    let client = SimilarityClient::new(&base_url, Duration::from_secs(5)).unwrap();

    let items = client.fetch_similarity(3300, "free trade").await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].term, "tariff");
}

#[tokio::test]
async fn test_end_to_end_rows() {
    let dashboard = dashboard(Arc::new(MockApi::with_books())).await;

    let handle = dashboard.set_term("market").await.unwrap().unwrap();
    assert_eq!(handle.await.unwrap(), ApplyOutcome::Applied);

    let handle = dashboard.set_selected_books(&[3300, 33310]).await.unwrap().unwrap();
    assert_eq!(handle.await.unwrap(), ApplyOutcome::Applied);

    let snapshot = dashboard.snapshot().await;
    assert!(!snapshot.loading);
    // stall fails min count for 3300 (n=3)
    let terms: Vec<&str> = snapshot.rows.iter().map(|r| r.term.as_str()).collect();
    assert_eq!(terms, vec!["price", "trade"]);

    let trade = &snapshot.rows[1];
    assert!((trade.avg - 0.32).abs() < 1e-9);
    assert_eq!(trade.max, 0.42);
    assert_eq!(trade.min, 0.22);
    assert!((trade.score(3300).unwrap().coherence - 91.0).abs() < 1e-9);

    assert_eq!(snapshot.stats[&3300].total, 3);
    assert_eq!(snapshot.stats[&3300].removed, 1);
    assert_eq!(snapshot.stats[&33310].shown, 2);

    let model = dashboard.scatter_model().await;
    assert_eq!(model.series.len(), 2);
    assert_eq!(model.series[0].color, "#e15759");
    assert_eq!(model.ranges.len(), 2);
}

#[tokio::test]
async fn test_superseded_selection_batch_is_discarded() {
    let mut api = MockApi::with_books();
    api.slow_books.insert(33310, Duration::from_millis(200));
    let dashboard = dashboard(Arc::new(api)).await;

    let handle = dashboard.set_term("market").await.unwrap().unwrap();
    handle.await.unwrap();

    // A -> B -> C before B resolves
    let b = dashboard.add_book(33310).await.unwrap().unwrap();
    let c = dashboard.add_book(30107).await.unwrap().unwrap();

    assert_eq!(b.await.unwrap(), ApplyOutcome::Stale);
    assert_eq!(c.await.unwrap(), ApplyOutcome::Applied);

    let snapshot = dashboard.snapshot().await;
    assert_eq!(snapshot.state.selected_book_ids, vec![3300, 33310, 30107]);
    assert!(snapshot.rows.iter().all(|r| r.by_book.len() == 3));
}

#[tokio::test]
async fn test_failed_batch_keeps_previous_cache() {
    let mut api = MockApi::with_books();
    api.failing_books.insert(30107);
    let api = Arc::new(api);
    let dashboard = dashboard(Arc::clone(&api)).await;

    dashboard.set_term("market").await.unwrap().unwrap().await.unwrap();
    let rows_before = dashboard.snapshot().await.rows;
    assert!(!rows_before.is_empty());

    let handle = dashboard.set_selected_books(&[3300, 33310, 30107]).await.unwrap().unwrap();
    assert_eq!(handle.await.unwrap(), ApplyOutcome::Failed);

    let snapshot = dashboard.snapshot().await;
    assert!(matches!(
        snapshot.last_error,
        Some(DashboardError::SimilarityFetch { book_id: 30107, .. })
    ));

    // 33310 succeeded inside the failed batch but must not have been cached
    let retry = dashboard.set_selected_books(&[3300, 33310]).await.unwrap();
    assert!(retry.is_some());
    assert_eq!(retry.unwrap().await.unwrap(), ApplyOutcome::Applied);

    // 3300 stayed cached throughout: going back to it needs no request
    let requests = api.request_count();
    assert!(dashboard.set_selected_books(&[3300]).await.unwrap().is_none());
    assert_eq!(api.request_count(), requests);
    assert_eq!(dashboard.snapshot().await.rows, rows_before);
}

#[tokio::test]
async fn test_term_change_isolates_rows() {
    let mut api = MockApi::with_books();
    api.slow_books.insert(3300, Duration::from_millis(150));
    let dashboard = dashboard(Arc::new(api)).await;

    let market = dashboard.set_term("market").await.unwrap().unwrap();
    let labour = dashboard.set_term("labour").await.unwrap().unwrap();

    assert_eq!(market.await.unwrap(), ApplyOutcome::Stale);
    assert_eq!(labour.await.unwrap(), ApplyOutcome::Applied);

    let snapshot = dashboard.snapshot().await;
    assert_eq!(snapshot.state.term, "labour");
    let terms: HashSet<&str> = snapshot.rows.iter().map(|r| r.term.as_str()).collect();
    assert_eq!(terms, HashSet::from(["work", "wages"]));
}

#[tokio::test]
async fn test_display_changes_make_no_requests() {
    let api = Arc::new(MockApi::with_books());
    let dashboard = dashboard(Arc::clone(&api)).await;

    dashboard.set_term("market").await.unwrap().unwrap().await.unwrap();
    dashboard
        .set_selected_books(&[3300, 33310, 30107])
        .await
        .unwrap()
        .unwrap()
        .await
        .unwrap();
    let requests = api.request_count();

    dashboard.set_reference_book(Some(3300)).await.unwrap();
    dashboard.set_rank_by(tsim_common::RankBy::Min).await;
    dashboard.set_top_n(1).await.unwrap();
    dashboard.set_min_count(1).await;
    assert!(dashboard.set_term("market").await.unwrap().is_none());

    assert_eq!(api.request_count(), requests);
    let snapshot = dashboard.snapshot().await;
    assert_eq!(snapshot.rows.len(), 1);
    assert!(snapshot.rows[0].sortable.is_some());
}

#[tokio::test]
async fn test_request_timeout() {
    let mut api = MockApi::with_books();
    api.slow_books.insert(3300, Duration::from_secs(2));
    let base_url = spawn_mock(Arc::new(api)).await;

    let client = SimilarityClient::new(&base_url, Duration::from_millis(100)).unwrap();
    let result = client.fetch_similarity(3300, "market").await;
    assert!(matches!(result, Err(FetchError::Timeout(100))));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        SimilarityClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let result = client.fetch_books().await;
    assert!(matches!(result, Err(FetchError::Network(_))));
}
