//! tsim-dash - Main entry point
//!
//! Runs one pass of the similarity pipeline from the command line: load the
//! book catalog, fetch the selected books for a term, then print the ranked
//! rows as a table, as JSON, or as scatter chart data.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tsim_common::config::{resolve_api_base_url, TomlConfig, API_BASE_URL_ENV};
use tsim_common::events::EventBus;
use tsim_common::{BookId, RankBy};
use tsim_dash::services::{BookResultFetcher, SimilarityClient};
use tsim_dash::{ControllerSettings, Dashboard, DashboardSnapshot};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Plain text table
    Table,
    /// Rows and per-book statistics as JSON
    Json,
    /// Scatter chart model as JSON
    Chart,
}

/// Command-line arguments for tsim-dash
#[derive(Parser, Debug)]
#[command(name = "tsim-dash")]
#[command(about = "Compare term similarity across books")]
#[command(version)]
struct Args {
    /// Term to look up
    #[arg(short, long, env = "TSIM_TERM")]
    term: String,

    /// Book id to compare (repeatable, or comma separated)
    #[arg(short, long = "book", value_delimiter = ',')]
    books: Vec<BookId>,

    /// Compare every book in the catalog
    #[arg(long, conflicts_with = "books")]
    all_books: bool,

    /// Reference book for relative ranking
    #[arg(short, long)]
    reference: Option<BookId>,

    /// Ranking key (avg, max, min)
    #[arg(long)]
    rank_by: Option<RankBy>,

    /// Number of rows to show
    #[arg(short = 'n', long)]
    top_n: Option<usize>,

    /// Minimum occurrence count per book
    #[arg(long)]
    min_count: Option<u64>,

    /// Similarity API origin
    #[arg(long)]
    api_base_url: Option<String>,

    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    term: &'a str,
    selected_book_ids: &'a [BookId],
    reference_book_id: Option<BookId>,
    rank_by: RankBy,
    rows: &'a [tsim_dash::Row],
    stats: &'a tsim_dash::BookCalculationStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting tsim-dash v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let base_url = resolve_api_base_url(args.api_base_url.as_deref(), API_BASE_URL_ENV, &config);
    info!("Similarity API: {}", base_url);

    let client = SimilarityClient::new(&base_url, config.request_timeout())
        .context("Failed to create similarity API client")?;

    let mut settings = ControllerSettings::from(&config);
    if let Some(rank_by) = args.rank_by {
        settings.rank_by = rank_by;
    }
    if let Some(top_n) = args.top_n {
        settings.top_n = top_n;
    }
    if let Some(min_count) = args.min_count {
        settings.min_count = min_count;
    }

    let dashboard = Dashboard::connect(
        BookResultFetcher::new(client),
        settings,
        EventBus::new(config.event_capacity),
    )
    .await;

    let snapshot = dashboard.snapshot().await;
    if let Some(error) = &snapshot.books_error {
        warn!("{}", error);
    }
    if snapshot.books.is_empty() {
        bail!("No books available from {}", base_url);
    }

    if let Some(handle) = dashboard.set_term(&args.term).await? {
        handle.await.context("Fetch task failed")?;
    }

    let selection = if args.all_books {
        dashboard.select_all().await?
    } else if !args.books.is_empty() {
        dashboard.set_selected_books(&args.books).await?
    } else {
        None
    };
    if let Some(handle) = selection {
        handle.await.context("Fetch task failed")?;
    }

    if args.reference.is_some() {
        dashboard.set_reference_book(args.reference).await?;
    }

    let snapshot = dashboard.snapshot().await;
    if let Some(error) = &snapshot.last_error {
        bail!("{}", error);
    }

    match args.format {
        OutputFormat::Table => print_table(&snapshot),
        OutputFormat::Json => {
            let output = JsonOutput {
                term: &snapshot.state.term,
                selected_book_ids: &snapshot.state.selected_book_ids,
                reference_book_id: snapshot.state.reference_book_id,
                rank_by: snapshot.state.rank_by,
                rows: &snapshot.rows,
                stats: &snapshot.stats,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Chart => {
            let model = dashboard.scatter_model().await;
            println!("{}", serde_json::to_string_pretty(&model)?);
        }
    }

    Ok(())
}

fn print_table(snapshot: &DashboardSnapshot) {
    let state = &snapshot.state;
    let relative = state.reference_book_id.is_some();

    let key_label = if relative { "delta" } else { state.rank_by.as_str() };
    let mut header = format!("{:>3}  {:<24} {:>8}", "#", "Term", key_label);
    for id in &state.selected_book_ids {
        header.push_str(&format!("  {:>24}", id));
    }
    println!("{}", header);

    for (index, row) in snapshot.rows.iter().enumerate() {
        let key = if relative {
            row.sortable.unwrap_or(0.0)
        } else {
            match state.rank_by {
                RankBy::Avg => row.avg,
                RankBy::Max => row.max,
                RankBy::Min => row.min,
            }
        };

        let mut line = format!("{:>3}  {:<24} {:>8.3}", index + 1, row.term, key);
        for id in &state.selected_book_ids {
            let cell = row
                .score(*id)
                .map(|s| format!("{:.3} {:.1}% (n={})", s.similarity, s.coherence, s.n))
                .unwrap_or_else(|| "-".to_string());
            line.push_str(&format!("  {:>24}", cell));
        }
        println!("{}", line);
    }

    println!();
    for (id, stats) in &snapshot.stats {
        println!(
            "book {}: {} items, {} removed, {} shown",
            id, stats.total, stats.removed, stats.shown
        );
    }
}
