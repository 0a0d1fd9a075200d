// crates/server/src/main.rs
//! sharecycle server binary.
//!
//! Opens (or creates) the SQLite store, optionally upserts reference data
//! from a fixtures file, then serves the share-session API.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use sharecycle_db::{Database, ReferenceData};
use sharecycle_server::{create_app, init_metrics, AppState, Config};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn,sharecycle_server=info,sharecycle_db=info";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();

    let startup_start = Instant::now();
    init_metrics();

    eprintln!("\n  sharecycle v{}\n", env!("CARGO_PKG_VERSION"));

    // Step 1: Open database (migrations run on open)
    let db = match &config.db_path {
        Some(path) => Database::new(path).await,
        None => Database::open_default().await,
    }
    .context("failed to open database")?;
    tracing::info!(path = %db.db_path().display(), "Database ready");

    // Step 2: Reference data
    if let Some(path) = &config.fixtures {
        let data = ReferenceData::from_path(path)
            .with_context(|| format!("failed to read fixtures from {}", path.display()))?;
        db.load_reference_data(&data).await?;
        tracing::info!(
            users = data.users.len(),
            postings = data.postings.len(),
            "Reference data loaded"
        );
    }

    // Step 3: Status catalog and app
    let state = AppState::load(db).await?;
    let app = create_app(state);

    // Step 4: Bind and serve
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    eprintln!(
        "  Ready in {}ms -> http://{}\n",
        startup_start.elapsed().as_millis(),
        addr
    );

    axum::serve(listener, app).await?;

    Ok(())
}
