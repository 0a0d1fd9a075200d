// crates/core/src/admission.rs
//! Segment submission: input validation and the acknowledgement rule.
//!
//! Validation here is pure and runs before any storage access. The atomic
//! write (guard session, insert segment and metrics, recount, complete) lives
//! in `sharecycle-db`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::lifecycle::SessionStatus;
use crate::time::parse_instant;
use crate::window::Window;

/// One metric aggregate attached to a data-bearing segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct MetricInput {
    pub metric_id: i64,
    /// Accepted from clients but never stored; names come from metric definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,
    pub unit_code: String,
    #[serde(default)]
    pub total_value: Option<f64>,
    #[serde(default)]
    pub avg_value: Option<f64>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub samples_count: Option<i64>,
    #[serde(default)]
    #[cfg_attr(feature = "codegen", ts(type = "unknown"))]
    pub computed_json: Option<Value>,
}

/// Raw submit-segment request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSubmission {
    pub session_id: i64,
    pub day_index: i64,
    pub from_utc: String,
    pub to_utc: String,
    pub has_data: bool,
    pub metrics: Vec<MetricInput>,
}

/// Field list echoed in `details.required` when the body does not deserialize.
pub const SEGMENT_REQUIRED_FIELDS: &[&str] = &[
    "sessionId:number",
    "dayIndex:number",
    "fromUtc:string(ISO)",
    "toUtc:string(ISO)",
    "hasData:boolean",
    "metrics:array",
];

/// A submission that passed validation and is ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSegment {
    pub session_id: i64,
    pub day_index: u32,
    pub window: Window,
    pub has_data: bool,
    /// Always empty when `has_data` is false.
    pub metrics: Vec<MetricInput>,
}

impl SegmentSubmission {
    pub fn validate(self) -> Result<ValidatedSegment, ValidationError> {
        let day_index = u32::try_from(self.day_index).map_err(|_| {
            ValidationError::DayIndexOutOfRange {
                received: self.day_index,
            }
        })?;

        let (from, to) = match (parse_instant(&self.from_utc), parse_instant(&self.to_utc)) {
            (Some(from), Some(to)) => (from, to),
            _ => return Err(ValidationError::InvalidWindowTimestamps),
        };
        let window = Window::new(from, to).ok_or(ValidationError::EmptyWindow)?;

        if self.has_data && self.metrics.is_empty() {
            return Err(ValidationError::MissingMetrics);
        }

        let mut seen = HashSet::with_capacity(self.metrics.len());
        for metric in &self.metrics {
            if !seen.insert(metric.metric_id) {
                return Err(ValidationError::DuplicateMetric {
                    metric_id: metric.metric_id,
                });
            }
        }

        // Metrics sent alongside hasData=false are dropped, never stored.
        let metrics = if self.has_data {
            self.metrics
        } else {
            Vec::new()
        };

        Ok(ValidatedSegment {
            session_id: self.session_id,
            day_index,
            window,
            has_data: self.has_data,
            metrics,
        })
    }
}

/// Acknowledgement tag for an admitted segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum SubmitAck {
    Accepted,
    AcceptedNoMetrics,
    AcceptedCompleted,
}

impl SubmitAck {
    /// Completion wins over the metrics distinction.
    pub fn resolve(resulting_status: SessionStatus, metrics_stored: bool) -> Self {
        match (resulting_status, metrics_stored) {
            (SessionStatus::Completed, _) => Self::AcceptedCompleted,
            (_, true) => Self::Accepted,
            (_, false) => Self::AcceptedNoMetrics,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::AcceptedNoMetrics => "accepted_no_metrics",
            Self::AcceptedCompleted => "accepted_completed",
        }
    }
}
