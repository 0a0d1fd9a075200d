// crates/core/src/session.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::parse_instant;
use crate::window::CycleSchedule;

/// Raw start-session request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub posting_id: i64,
    pub user_id: i64,
    pub join_time_local: String,
    pub join_timezone: String,
    pub cycle_anchor_utc: String,
    pub segments_expected: i64,
}

pub const START_REQUIRED_FIELDS: &[&str] = &[
    "postingId:number",
    "userId:number",
    "joinTimeLocal:string",
    "joinTimezone:string",
    "cycleAnchorUtc:string",
    "segmentsExpected:number",
];

/// A validated session ready to be inserted as ACTIVE.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub posting_id: i64,
    pub user_id: i64,
    /// Kept verbatim; only checked for parseability.
    pub join_time_local: String,
    pub join_timezone: String,
    pub cycle_anchor: DateTime<Utc>,
    pub segments_expected: i64,
}

impl NewSession {
    pub fn schedule(&self) -> CycleSchedule {
        CycleSchedule::new(self.cycle_anchor, self.segments_expected)
    }
}

impl StartSessionRequest {
    pub fn validate(self) -> Result<NewSession, ValidationError> {
        if self.segments_expected < 1 {
            return Err(ValidationError::SegmentsExpectedTooSmall {
                received: self.segments_expected,
            });
        }
        let cycle_anchor = match (
            parse_instant(&self.join_time_local),
            parse_instant(&self.cycle_anchor_utc),
        ) {
            (Some(_), Some(anchor)) => anchor,
            _ => return Err(ValidationError::InvalidStartTimestamps),
        };
        Ok(NewSession {
            posting_id: self.posting_id,
            user_id: self.user_id,
            join_time_local: self.join_time_local,
            join_timezone: self.join_timezone,
            cycle_anchor,
            segments_expected: self.segments_expected,
        })
    }
}
