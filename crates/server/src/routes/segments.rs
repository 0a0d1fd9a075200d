//! Segment submission endpoint.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use sharecycle_core::{SegmentSubmission, SubmitAck, SEGMENT_REQUIRED_FIELDS};

use crate::error::{json_body, ApiResult};
use crate::metrics::{record_segment_admitted, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSegmentResponse {
    pub segment_id: i64,
    pub session_id: i64,
    pub day_index: u32,
    pub segments_sent: i64,
    pub segments_expected: i64,
    pub session_status_id: i64,
    pub session_status_name: String,
    pub ack: SubmitAck,
}

/// POST /api/segments - Record one day's segment and its metrics.
///
/// Validation runs before storage. The write is all-or-nothing: a duplicate
/// day, window or metric leaves no trace.
pub async fn submit_segment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SegmentSubmission>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitSegmentResponse>)> {
    let timer = RequestTimer::new("submit_segment");
    timer.observe(StatusCode::CREATED, submit(&state, payload).await)
}

async fn submit(
    state: &AppState,
    payload: Result<Json<SegmentSubmission>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitSegmentResponse>)> {
    let segment = json_body(payload, SEGMENT_REQUIRED_FIELDS)?.validate()?;
    let admitted = state.db.admit_segment(&segment, state.now()).await?;

    let ack = SubmitAck::resolve(admitted.status, admitted.metrics_stored > 0);
    record_segment_admitted(ack.as_str());

    let status = state.statuses.def(admitted.status);
    Ok((
        StatusCode::CREATED,
        Json(SubmitSegmentResponse {
            segment_id: admitted.segment_id,
            session_id: admitted.session_id,
            day_index: admitted.day_index,
            segments_sent: admitted.segments_sent,
            segments_expected: admitted.segments_expected,
            session_status_id: status.status_id,
            session_status_name: status.display_name.clone(),
            ack,
        }),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/segments", post(submit_segment))
}
