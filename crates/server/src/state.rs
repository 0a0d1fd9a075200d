// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sharecycle_core::time::{Clock, SystemClock};
use sharecycle_core::StatusCatalog;
use sharecycle_db::{Database, DbResult};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub db: Database,
    /// Status ids and display names, loaded once at startup.
    pub statuses: StatusCatalog,
    /// Source of "now" for window math and row timestamps.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(db: Database, statuses: StatusCatalog) -> Arc<Self> {
        Self::with_clock(db, statuses, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, statuses: StatusCatalog, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            db,
            statuses,
            clock,
        })
    }

    /// Load the status catalog from `db` and build the state.
    ///
    /// Fails if any status row is missing, so a misconfigured database stops
    /// startup instead of surfacing per request.
    pub async fn load(db: Database) -> DbResult<Arc<Self>> {
        let statuses = db.load_status_catalog().await?;
        Ok(Self::new(db, statuses))
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
