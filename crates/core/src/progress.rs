// crates/core/src/progress.rs
//! Per-session progress derived on read from stored segments.
//!
//! Nothing here is persisted. Every figure is recomputed from the session's
//! schedule, its segment rows and the caller's `now`.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{parse_instant, to_iso};
use crate::window::{CycleSchedule, Window};

// =============================================================================
// Scalar helpers
// =============================================================================

/// `round(100 · sent / expected)` clamped to `[0, 100]`; 0 when nothing is expected.
pub fn progress_pct(segments_sent: i64, segments_expected: i64) -> u8 {
    if segments_expected <= 0 {
        return 0;
    }
    let raw = (segments_sent as f64 / segments_expected as f64) * 100.0;
    raw.round().clamp(0.0, 100.0) as u8
}

/// Join time plus `segments_expected - 1` days, rendered as ISO-8601 UTC.
///
/// Returns the input unchanged when nothing is expected or it cannot be parsed.
pub fn expected_completion_date(join_time_local: &str, segments_expected: i64) -> String {
    if segments_expected < 1 {
        return join_time_local.to_string();
    }
    parse_instant(join_time_local)
        .and_then(|join| join.checked_add_signed(TimeDelta::try_days(segments_expected - 1)?))
        .map(to_iso)
        .unwrap_or_else(|| join_time_local.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub enum UiStatus {
    OnTrack,
    Behind,
}

impl UiStatus {
    pub fn from_missed(missed_windows: u32) -> Self {
        if missed_windows > 0 {
            Self::Behind
        } else {
            Self::OnTrack
        }
    }
}

// =============================================================================
// Segment digest
// =============================================================================

/// What progress needs to know about one stored segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentMark {
    pub day_index: u32,
    pub has_data: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate over a session's data-bearing segments.
///
/// Segments without data are ignored entirely: they neither fulfil a day nor
/// move `last_day_index`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentDigest {
    pub fulfilled_days: BTreeSet<u32>,
    pub last_created_at: Option<DateTime<Utc>>,
    pub last_day_index: Option<u32>,
}

impl SegmentDigest {
    pub fn from_marks<I>(marks: I) -> Self
    where
        I: IntoIterator<Item = SegmentMark>,
    {
        let mut digest = Self::default();
        for mark in marks.into_iter().filter(|m| m.has_data) {
            digest.fulfilled_days.insert(mark.day_index);
            if digest.last_created_at.map_or(true, |t| mark.created_at > t) {
                digest.last_created_at = Some(mark.created_at);
            }
            if digest.last_day_index.map_or(true, |d| mark.day_index > d) {
                digest.last_day_index = Some(mark.day_index);
            }
        }
        digest
    }

    /// Distinct days with data.
    pub fn effective_segments_sent(&self) -> i64 {
        self.fulfilled_days.len() as i64
    }
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub segments_sent: i64,
    pub progress_pct: u8,
    pub expected_completion_date: String,
    pub last_segment_created_at: Option<DateTime<Utc>>,
    pub last_day_index: Option<u32>,
    pub missed_windows: u32,
    pub next_window: Option<Window>,
    pub ui_status: UiStatus,
}

impl ProgressReport {
    pub fn compute(
        schedule: &CycleSchedule,
        join_time_local: &str,
        digest: &SegmentDigest,
        now: DateTime<Utc>,
    ) -> Self {
        let expected = schedule.segments_expected();
        let segments_sent = digest.effective_segments_sent();

        let (missed_windows, next_window) = if expected > 0 {
            (
                schedule.missed_windows(now, &digest.fulfilled_days),
                schedule.next_window(now),
            )
        } else {
            (0, None)
        };

        Self {
            segments_sent,
            progress_pct: progress_pct(segments_sent, expected),
            expected_completion_date: expected_completion_date(join_time_local, expected),
            last_segment_created_at: digest.last_created_at,
            last_day_index: digest.last_day_index,
            missed_windows,
            next_window,
            ui_status: UiStatus::from_missed(missed_windows),
        }
    }
}
