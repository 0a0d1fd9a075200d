//! Active share sessions of one participant, with derived progress.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sharecycle_core::time::to_iso;
use sharecycle_core::{
    format_reward_label, CycleSchedule, ProgressReport, SegmentDigest, SegmentMark, SessionStatus,
    UiStatus, UNKNOWN_REWARD_CODE, UNKNOWN_REWARD_DISPLAY,
};
use sharecycle_db::{PostingRow, SessionRow};

use crate::error::{ApiError, ApiResult};
use crate::metrics::RequestTimer;
use crate::routes::parse_id;
use crate::state::AppState;

const UNTITLED_POSTING: &str = "Untitled posting";
const UNKNOWN_BUYER: &str = "Unknown buyer";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionsQuery {
    pub user_id: Option<String>,
}

/// One card in the participant's "active shares" list.
#[derive(Debug, Serialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ActiveShareSession {
    pub posting_id: i64,
    pub session_id: i64,

    pub posting_title: String,
    pub posting_summary: Option<String>,
    pub posting_description: Option<String>,
    pub buyer_name: String,
    pub reward_label: String,
    pub reward_type_code: String,
    pub reward_type_display: String,
    pub reward_value: f64,
    pub segments_expected: i64,

    pub join_time_local: String,
    pub join_timezone: String,
    pub status_code: SessionStatus,
    pub status_display: String,
    pub permission_granted: bool,

    /// Distinct days with data, not the stored counter.
    pub segments_sent: i64,
    pub progress_pct: u8,
    pub expected_completion_date: String,

    pub last_segment_created_on: Option<String>,
    pub last_day_index: Option<u32>,
    pub missed_windows_count: u32,
    pub next_window_from_utc: Option<String>,
    pub next_window_to_utc: Option<String>,

    pub ui_status: UiStatus,
}

/// GET /api/sessions/active?userId= - ACTIVE sessions with sharing
/// permission, oldest first. `[]` when there are none.
pub async fn list_active_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActiveSessionsQuery>,
) -> ApiResult<Json<Vec<ActiveShareSession>>> {
    let timer = RequestTimer::new("list_active_sessions");
    timer.observe(StatusCode::OK, list_active(&state, query).await)
}

async fn list_active(
    state: &AppState,
    query: ActiveSessionsQuery,
) -> ApiResult<Json<Vec<ActiveShareSession>>> {
    let user_id = parse_id(query.user_id.as_deref())
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request("Invalid or missing userId query parameter"))?;

    let sessions = state.db.list_active_sessions_for_user(user_id).await?;
    if sessions.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let posting_ids = unique(sessions.iter().map(|s| s.posting_id));
    let postings = state.db.get_postings_by_ids(&posting_ids).await?;

    let buyer_ids = unique(postings.values().filter_map(|p| p.buyer_user_id));
    let reward_type_ids = unique(postings.values().filter_map(|p| p.reward_type_id));
    let buyers = state.db.get_users_by_ids(&buyer_ids).await?;
    let reward_types = state.db.get_reward_types_by_ids(&reward_type_ids).await?;

    let session_ids: Vec<i64> = sessions.iter().map(|s| s.session_id).collect();
    let mut marks: HashMap<i64, Vec<SegmentMark>> = HashMap::new();
    for segment in state.db.get_segments_for_sessions(&session_ids).await? {
        marks.entry(segment.session_id).or_default().push(SegmentMark {
            day_index: segment.day_index,
            has_data: segment.has_data,
            created_at: segment.created_at,
        });
    }

    let now = state.now();
    let status_display = state.statuses.display_name(SessionStatus::Active);
    let cards = sessions
        .into_iter()
        .map(|session| {
            let posting = postings.get(&session.posting_id);
            let buyer_name = posting
                .and_then(|p| p.buyer_user_id)
                .and_then(|id| buyers.get(&id))
                .and_then(|u| u.name.clone())
                .unwrap_or_else(|| UNKNOWN_BUYER.to_string());
            let (reward_code, reward_display) = posting
                .and_then(|p| p.reward_type_id)
                .and_then(|id| reward_types.get(&id))
                .map(|rt| (rt.code.as_str(), rt.display_name.as_str()))
                .unwrap_or((UNKNOWN_REWARD_CODE, UNKNOWN_REWARD_DISPLAY));
            let digest =
                SegmentDigest::from_marks(marks.remove(&session.session_id).unwrap_or_default());

            card(
                session,
                posting,
                buyer_name,
                (reward_code, reward_display),
                status_display,
                &digest,
                now,
            )
        })
        .collect();

    Ok(Json(cards))
}

fn card(
    session: SessionRow,
    posting: Option<&PostingRow>,
    buyer_name: String,
    (reward_code, reward_display): (&str, &str),
    status_display: &str,
    digest: &SegmentDigest,
    now: DateTime<Utc>,
) -> ActiveShareSession {
    let schedule = CycleSchedule::new(session.cycle_anchor, session.segments_expected);
    let report = ProgressReport::compute(&schedule, &session.join_time_local, digest, now);
    let reward_value = posting.map_or(0.0, |p| p.reward_value);

    ActiveShareSession {
        posting_id: session.posting_id,
        session_id: session.session_id,
        posting_title: posting
            .and_then(|p| p.title.clone())
            .unwrap_or_else(|| UNTITLED_POSTING.to_string()),
        posting_summary: posting.and_then(|p| p.summary.clone()),
        posting_description: posting.and_then(|p| p.description.clone()),
        buyer_name,
        reward_label: format_reward_label(reward_code, reward_display, reward_value),
        reward_type_code: reward_code.to_string(),
        reward_type_display: reward_display.to_string(),
        reward_value,
        segments_expected: session.segments_expected,
        join_time_local: session.join_time_local,
        join_timezone: session.join_timezone,
        status_code: SessionStatus::Active,
        status_display: status_display.to_string(),
        permission_granted: session.permission_granted,
        segments_sent: report.segments_sent,
        progress_pct: report.progress_pct,
        expected_completion_date: report.expected_completion_date,
        last_segment_created_on: report.last_segment_created_at.map(to_iso),
        last_day_index: report.last_day_index,
        missed_windows_count: report.missed_windows,
        next_window_from_utc: report.next_window.map(|w| to_iso(w.start)),
        next_window_to_utc: report.next_window.map(|w| to_iso(w.end)),
        ui_status: report.ui_status,
    }
}

fn unique(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/sessions/active", get(list_active_sessions))
}
