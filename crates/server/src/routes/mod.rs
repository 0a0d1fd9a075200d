//! API route handlers for the sharecycle server.

pub mod active;
pub mod health;
pub mod metrics;
pub mod postings;
pub mod segments;
pub mod sessions;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/sessions/start - Start a share session
/// - POST /api/sessions/cancel - Cancel a share session (idempotent)
/// - GET  /api/sessions/by-posting - Resolve a participant's session for a posting
/// - GET  /api/sessions/snapshot - Snake-case session snapshot with last segment
/// - GET  /api/sessions/active - Active sessions of a user with progress
/// - POST /api/segments - Submit one day's segment and metrics
/// - GET  /api/postings/shares - All shares of a posting, for the buyer
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", sessions::router())
        .nest("/api", active::router())
        .nest("/api", segments::router())
        .nest("/api", postings::router())
        .merge(metrics::router())
        .with_state(state)
}

/// Parse an integer id from a query parameter. Blank or non-integer values
/// yield `None`.
pub(crate) fn parse_id(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse().ok()
}
