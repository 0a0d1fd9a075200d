//! Buyer view: every participant's share of one posting.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sharecycle_core::time::to_iso;
use sharecycle_db::{MetricRow, SegmentRow};

use crate::error::{ApiError, ApiResult};
use crate::metrics::RequestTimer;
use crate::routes::parse_id;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingSharesQuery {
    pub posting_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ShareMetric {
    pub metric_id: i64,
    pub metric_name: Option<String>,
    pub unit_code: String,
    pub total_value: Option<f64>,
    pub avg_value: Option<f64>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub samples_count: Option<i64>,
    #[cfg_attr(feature = "codegen", ts(type = "unknown"))]
    pub computed_json: Option<Value>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ShareSegment {
    pub segment_id: i64,
    pub day_index: u32,
    pub from_utc: String,
    pub to_utc: String,
    pub has_data: bool,
    pub metrics: Vec<ShareMetric>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantShare {
    pub user_id: i64,
    pub user_display_name: Option<String>,
    pub session_id: i64,
    pub status_id: i64,
    pub status_name: String,
    pub segments_expected: i64,
    pub segments_sent: i64,
    pub segments: Vec<ShareSegment>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PostingSharesResponse {
    pub posting_id: i64,
    pub posting_title: Option<String>,
    pub shares: Vec<ParticipantShare>,
}

/// GET /api/postings/shares?postingId= - Sessions by user id, segments by
/// day index, metrics by metric id, with metric display names joined in.
pub async fn posting_shares(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostingSharesQuery>,
) -> ApiResult<Json<PostingSharesResponse>> {
    let timer = RequestTimer::new("posting_shares");
    timer.observe(StatusCode::OK, shares(&state, query).await)
}

async fn shares(state: &AppState, query: PostingSharesQuery) -> ApiResult<Json<PostingSharesResponse>> {
    let posting_id = parse_id(query.posting_id.as_deref()).ok_or_else(|| {
        ApiError::bad_request_with(
            "postingId is required and must be an integer",
            json!({ "postingId": query.posting_id }),
        )
    })?;
    let posting = state.db.get_posting(posting_id).await?.ok_or_else(|| {
        ApiError::NotFound(format!("Posting not found for postingId={posting_id}"))
    })?;

    let sessions = state.db.list_sessions_for_posting(posting_id).await?;
    let session_ids: Vec<i64> = sessions.iter().map(|s| s.session_id).collect();
    let user_ids: Vec<i64> = sessions
        .iter()
        .map(|s| s.user_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let users = state.db.get_users_by_ids(&user_ids).await?;

    let segments = state.db.get_segments_for_sessions(&session_ids).await?;
    let segment_ids: Vec<i64> = segments.iter().map(|s| s.segment_id).collect();
    let metrics = state.db.get_metrics_for_segments(&segment_ids).await?;
    let metric_ids: Vec<i64> = metrics
        .iter()
        .map(|m| m.metric_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let definitions = state.db.get_metric_definitions_by_ids(&metric_ids).await?;

    // Both queries come back ordered, so grouping preserves the order.
    let mut metrics_by_segment: HashMap<i64, Vec<ShareMetric>> = HashMap::new();
    for metric in metrics {
        let name = definitions
            .get(&metric.metric_id)
            .map(|d| d.display_name.clone());
        metrics_by_segment
            .entry(metric.segment_id)
            .or_default()
            .push(share_metric(metric, name));
    }
    let mut segments_by_session: HashMap<i64, Vec<ShareSegment>> = HashMap::new();
    for segment in segments {
        let metrics = metrics_by_segment
            .remove(&segment.segment_id)
            .unwrap_or_default();
        segments_by_session
            .entry(segment.session_id)
            .or_default()
            .push(share_segment(segment, metrics));
    }

    let shares = sessions
        .into_iter()
        .map(|session| {
            let status = state.statuses.def(session.status);
            ParticipantShare {
                user_id: session.user_id,
                user_display_name: users.get(&session.user_id).and_then(|u| u.name.clone()),
                session_id: session.session_id,
                status_id: status.status_id,
                status_name: status.display_name.clone(),
                segments_expected: session.segments_expected,
                segments_sent: session.segments_sent,
                segments: segments_by_session
                    .remove(&session.session_id)
                    .unwrap_or_default(),
            }
        })
        .collect();

    Ok(Json(PostingSharesResponse {
        posting_id: posting.posting_id,
        posting_title: posting.title,
        shares,
    }))
}

fn share_segment(segment: SegmentRow, metrics: Vec<ShareMetric>) -> ShareSegment {
    ShareSegment {
        segment_id: segment.segment_id,
        day_index: segment.day_index,
        from_utc: to_iso(segment.from_utc),
        to_utc: to_iso(segment.to_utc),
        has_data: segment.has_data,
        metrics,
    }
}

fn share_metric(metric: MetricRow, metric_name: Option<String>) -> ShareMetric {
    ShareMetric {
        metric_id: metric.metric_id,
        metric_name,
        unit_code: metric.unit_code,
        total_value: metric.total_value,
        avg_value: metric.avg_value,
        min_value: metric.min_value,
        max_value: metric.max_value,
        samples_count: metric.samples_count,
        computed_json: metric.computed_json,
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/postings/shares", get(posting_shares))
}
