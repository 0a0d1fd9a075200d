// crates/server/src/routes/sessions.rs
//! Session lifecycle endpoints: start, cancel, and the two lookups a client
//! uses to find its session for a posting.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sharecycle_core::time::to_iso;
use sharecycle_core::{CancelOutcome, SessionStatus, StartSessionRequest, START_REQUIRED_FIELDS};
use sharecycle_db::SessionRow;

use crate::error::{json_body, ApiError, ApiResult};
use crate::metrics::{record_session_cancelled, record_session_started, RequestTimer};
use crate::routes::parse_id;
use crate::state::AppState;

// ============================================================================
// Start
// ============================================================================

#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: i64,
    pub posting_id: i64,
    pub posting_title: Option<String>,
    pub user_id: i64,
    pub user_display_name: Option<String>,
    pub status_id: i64,
    pub status_name: String,
    pub segments_expected: i64,
    pub segments_sent: i64,
    pub join_time_local: String,
    pub join_timezone: String,
    pub cycle_anchor_utc: String,
    pub permission_granted: bool,
    pub created_on_utc: String,
}

/// POST /api/sessions/start - Start a new ACTIVE session for (posting, user).
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartSessionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StartSessionResponse>)> {
    let timer = RequestTimer::new("start_session");
    timer.observe(StatusCode::CREATED, start(&state, payload).await)
}

async fn start(
    state: &AppState,
    payload: Result<Json<StartSessionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StartSessionResponse>)> {
    let new = json_body(payload, START_REQUIRED_FIELDS)?.validate()?;
    let started = state.db.start_session(&new, state.now()).await?;
    record_session_started();

    let session = started.session;
    let status = state.statuses.def(session.status);
    Ok((
        StatusCode::CREATED,
        Json(StartSessionResponse {
            session_id: session.session_id,
            posting_id: session.posting_id,
            posting_title: started.posting.title,
            user_id: session.user_id,
            user_display_name: started.user.name,
            status_id: status.status_id,
            status_name: status.display_name.clone(),
            segments_expected: session.segments_expected,
            segments_sent: session.segments_sent,
            join_time_local: session.join_time_local,
            join_timezone: session.join_timezone,
            cycle_anchor_utc: to_iso(session.cycle_anchor),
            permission_granted: session.permission_granted,
            created_on_utc: to_iso(session.created_at),
        }),
    ))
}

// ============================================================================
// Cancel
// ============================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSessionRequest {
    pub session_id: i64,
}

const CANCEL_REQUIRED_FIELDS: &[&str] = &["sessionId:number"];

#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct CancelSessionResponse {
    pub session_id: i64,
    pub status_id: i64,
    pub status_name: String,
    pub ack: CancelOutcome,
}

/// POST /api/sessions/cancel - Cancel a session. Repeating it is a no-op.
pub async fn cancel_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CancelSessionRequest>, JsonRejection>,
) -> ApiResult<Json<CancelSessionResponse>> {
    let timer = RequestTimer::new("cancel_session");
    timer.observe(StatusCode::OK, cancel(&state, payload).await)
}

async fn cancel(
    state: &AppState,
    payload: Result<Json<CancelSessionRequest>, JsonRejection>,
) -> ApiResult<Json<CancelSessionResponse>> {
    let CancelSessionRequest { session_id } = json_body(payload, CANCEL_REQUIRED_FIELDS)?;
    let ack = state.db.cancel_session(session_id, state.now()).await?;
    record_session_cancelled(ack.as_str());

    let status = state.statuses.def(SessionStatus::Cancelled);
    Ok(Json(CancelSessionResponse {
        session_id,
        status_id: status.status_id,
        status_name: status.display_name.clone(),
        ack,
    }))
}

// ============================================================================
// By posting
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingUserQuery {
    pub posting_id: Option<String>,
    pub user_id: Option<String>,
}

/// Which rule picked the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionSource {
    Active,
    Latest,
}

#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SessionByPostingResponse {
    pub session_id: i64,
    pub posting_id: i64,
    pub posting_title: Option<String>,
    pub user_id: i64,
    pub user_display_name: Option<String>,
    pub status_id: i64,
    pub status_name: String,
    pub segments_expected: i64,
    pub segments_sent: i64,
    pub created_on_utc: String,
    pub modified_on_utc: String,
    pub source: SessionSource,
}

/// GET /api/sessions/by-posting?postingId=&userId= - The ACTIVE session, or
/// failing that the most recently created one.
pub async fn session_by_posting(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostingUserQuery>,
) -> ApiResult<Json<SessionByPostingResponse>> {
    let timer = RequestTimer::new("session_by_posting");
    timer.observe(StatusCode::OK, by_posting(&state, query).await)
}

async fn by_posting(
    state: &AppState,
    query: PostingUserQuery,
) -> ApiResult<Json<SessionByPostingResponse>> {
    let posting_id = parse_id(query.posting_id.as_deref()).ok_or_else(|| {
        ApiError::bad_request_with(
            "postingId is required and must be an integer",
            json!({ "postingId": query.posting_id }),
        )
    })?;
    let user_id = parse_id(query.user_id.as_deref()).ok_or_else(|| {
        ApiError::bad_request_with(
            "userId is required and must be an integer",
            json!({ "userId": query.user_id }),
        )
    })?;

    let posting = state.db.get_posting(posting_id).await?.ok_or_else(|| {
        ApiError::NotFound(format!("Posting not found for postingId={posting_id}"))
    })?;
    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found for userId={user_id}")))?;

    let (session, source) = match state.db.find_active_session(posting_id, user_id).await? {
        Some(active) => (active, SessionSource::Active),
        None => {
            let latest = state
                .db
                .find_latest_session_by_created(posting_id, user_id)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!(
                        "No share session found for postingId={posting_id} & userId={user_id}"
                    ))
                })?;
            (latest, SessionSource::Latest)
        }
    };

    let status = state.statuses.def(session.status);
    Ok(Json(SessionByPostingResponse {
        session_id: session.session_id,
        posting_id: posting.posting_id,
        posting_title: posting.title,
        user_id: user.user_id,
        user_display_name: user.name,
        status_id: status.status_id,
        status_name: status.display_name.clone(),
        segments_expected: session.segments_expected,
        segments_sent: session.segments_sent,
        created_on_utc: to_iso(session.created_at),
        modified_on_utc: to_iso(session.modified_at),
        source,
    }))
}

// ============================================================================
// Snapshot
// ============================================================================

/// Snake-case session view consumed by device clients.
#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
pub struct SessionSnapshot {
    pub session_id: i64,
    pub posting_id: i64,
    pub user_id: i64,
    pub status_code: SessionStatus,
    pub status_name: String,
    pub segments_expected: i64,
    pub segments_sent: i64,
    pub last_sent_day_index: Option<u32>,
    pub cycle_anchor_utc: String,
    pub join_time_local_iso: String,
    pub join_timezone: String,
    pub last_uploaded_at: Option<String>,
    pub last_window_from_utc: Option<String>,
    pub last_window_to_utc: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
pub struct SnapshotResponse {
    pub ok: bool,
    pub session: Option<SessionSnapshot>,
}

/// GET /api/sessions/snapshot?userId=&postingId= - The ACTIVE session, or
/// failing that the most recently modified one, with its last segment.
/// `session` is null when the pair has never had a session.
pub async fn session_snapshot(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostingUserQuery>,
) -> ApiResult<Json<SnapshotResponse>> {
    let timer = RequestTimer::new("session_snapshot");
    timer.observe(StatusCode::OK, snapshot(&state, query).await)
}

async fn snapshot(state: &AppState, query: PostingUserQuery) -> ApiResult<Json<SnapshotResponse>> {
    let present = |raw: &Option<String>| raw.as_deref().is_some_and(|s| !s.trim().is_empty());
    if !present(&query.user_id) || !present(&query.posting_id) {
        return Err(ApiError::bad_request(
            "Missing required query params ?userId=&postingId=",
        ));
    }
    let (Some(user_id), Some(posting_id)) = (
        parse_id(query.user_id.as_deref()),
        parse_id(query.posting_id.as_deref()),
    ) else {
        return Err(ApiError::bad_request_with(
            "userId and postingId must be valid integers",
            json!({
                "user_id_param": query.user_id,
                "posting_id_param": query.posting_id,
            }),
        ));
    };

    let chosen = match state.db.find_active_session(posting_id, user_id).await? {
        Some(active) => Some(active),
        None => {
            state
                .db
                .find_latest_session_by_modified(posting_id, user_id)
                .await?
        }
    };
    let Some(session) = chosen else {
        return Ok(Json(SnapshotResponse {
            ok: true,
            session: None,
        }));
    };

    let last = state.db.get_last_segment(session.session_id).await?;
    Ok(Json(SnapshotResponse {
        ok: true,
        session: Some(snapshot_of(state, session, last)),
    }))
}

fn snapshot_of(
    state: &AppState,
    session: SessionRow,
    last: Option<sharecycle_db::SegmentRow>,
) -> SessionSnapshot {
    SessionSnapshot {
        session_id: session.session_id,
        posting_id: session.posting_id,
        user_id: session.user_id,
        status_code: session.status,
        status_name: state.statuses.display_name(session.status).to_string(),
        segments_expected: session.segments_expected,
        segments_sent: session.segments_sent,
        last_sent_day_index: last.as_ref().map(|s| s.day_index),
        cycle_anchor_utc: to_iso(session.cycle_anchor),
        join_time_local_iso: session.join_time_local,
        join_timezone: session.join_timezone,
        last_uploaded_at: last.as_ref().map(|s| to_iso(s.created_at)),
        last_window_from_utc: last.as_ref().map(|s| to_iso(s.from_utc)),
        last_window_to_utc: last.as_ref().map(|s| to_iso(s.to_utc)),
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions/start", post(start_session))
        .route("/sessions/cancel", post(cancel_session))
        .route("/sessions/by-posting", get(session_by_posting))
        .route("/sessions/snapshot", get(session_snapshot))
}
