// crates/server/src/lib.rs
//! sharecycle server library.
//!
//! Axum HTTP API for share sessions: participants start a session against a
//! posting, upload one segment per day, and buyers read back the shares.

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::*;
pub use metrics::{init_metrics, render_metrics, RequestTimer};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (sessions, segments, postings, health, metrics)
/// - CORS (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::{json, Value};
    use sharecycle_core::time::FixedClock;
    use sharecycle_db::{Database, ReferenceData};
    use tower::ServiceExt;

    use crate::state::AppState;

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
    }

    pub fn reference_data() -> ReferenceData {
        serde_json::from_value(json!({
            "users": [
                { "userId": 3, "name": "Ada" },
                { "userId": 4, "name": "Grace" },
                { "userId": 10, "name": "Buyer Co" }
            ],
            "rewardTypes": [
                { "rewardTypeId": 1, "code": "POINTS", "displayName": "Points" },
                { "rewardTypeId": 2, "code": "GIFT_CARD", "displayName": "Gift Card" }
            ],
            "postings": [
                {
                    "postingId": 7, "buyerUserId": 10, "title": "Sleep study",
                    "summary": "Nightly sleep stages", "rewardTypeId": 1, "rewardValue": 1500
                },
                { "postingId": 8, "buyerUserId": 99, "title": "Step count", "rewardTypeId": 2, "rewardValue": 25 },
                { "postingId": 9 }
            ],
            "metricDefinitions": [
                { "metricId": 1, "displayName": "Steps" },
                { "metricId": 2, "displayName": "Heart rate" }
            ]
        }))
        .unwrap()
    }

    /// A seeded in-memory app whose clock is frozen at `now`.
    pub async fn app_at(now: DateTime<Utc>) -> (Router, Arc<AppState>) {
        let db = Database::new_in_memory().await.unwrap();
        db.load_reference_data(&reference_data()).await.unwrap();
        let statuses = db.load_status_catalog().await.unwrap();
        let state = AppState::with_clock(db, statuses, Arc::new(FixedClock(now)));
        (crate::create_app(state.clone()), state)
    }

    /// The same database as `state`, seen at a different instant.
    pub fn app_later(state: &AppState, now: DateTime<Utc>) -> Router {
        let later = AppState::with_clock(
            state.db.clone(),
            state.statuses.clone(),
            Arc::new(FixedClock(now)),
        );
        crate::create_app(later)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_raw(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        post_raw(app, uri, &body.to_string()).await
    }

    pub fn start_body(posting_id: i64, user_id: i64, segments_expected: i64) -> Value {
        json!({
            "postingId": posting_id,
            "userId": user_id,
            "joinTimeLocal": "2025-01-01T09:00:00",
            "joinTimezone": "Europe/Paris",
            "cycleAnchorUtc": "2025-01-01T08:00:00Z",
            "segmentsExpected": segments_expected
        })
    }

    /// Start a session through the API and return its id.
    pub async fn start(app: &Router, posting_id: i64, user_id: i64, segments_expected: i64) -> i64 {
        let (status, json) = post_json(
            app.clone(),
            "/api/sessions/start",
            start_body(posting_id, user_id, segments_expected),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "start failed: {json}");
        json["sessionId"].as_i64().unwrap()
    }

    /// Submit-segment body for day `day` of the `t0()` schedule.
    pub fn segment_body(session_id: i64, day: i64, has_data: bool) -> Value {
        let from = t0() + chrono::TimeDelta::days(day);
        let to = from + chrono::TimeDelta::days(1);
        let metrics = if has_data {
            json!([
                { "metricId": 2, "unitCode": "bpm", "avgValue": 61.5, "minValue": 48, "maxValue": 97 },
                { "metricId": 1, "unitCode": "count", "totalValue": 8042, "samplesCount": 24 }
            ])
        } else {
            json!([])
        };
        json!({
            "sessionId": session_id,
            "dayIndex": day,
            "fromUtc": from.to_rfc3339(),
            "toUtc": to.to_rfc3339(),
            "hasData": has_data,
            "metrics": metrics
        })
    }

    pub async fn submit(app: &Router, session_id: i64, day: i64, has_data: bool) -> (StatusCode, Value) {
        post_json(app.clone(), "/api/segments", segment_body(session_id, day, has_data)).await
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::test_support::{app_at, get, t0};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let (app, _) = app_at(t0()).await;
        let (status, _) = get(app, "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_headers_present() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let (app, _) = app_at(t0()).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("origin", "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key("access-control-allow-origin"));
    }
}
