// crates/core/src/error.rs
use serde_json::{json, Value};
use thiserror::Error;

use crate::lifecycle::SessionStatus;

/// Errors raised while validating caller input, before any storage access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("segmentsExpected must be >= 1")]
    SegmentsExpectedTooSmall { received: i64 },

    #[error("joinTimeLocal and cycleAnchorUtc must be ISO-8601 strings")]
    InvalidStartTimestamps,

    #[error("fromUtc and toUtc must be valid ISO-8601 strings")]
    InvalidWindowTimestamps,

    #[error("fromUtc must be earlier than toUtc")]
    EmptyWindow,

    #[error("dayIndex must be a non-negative integer")]
    DayIndexOutOfRange { received: i64 },

    #[error("metrics cannot be empty when hasData=true")]
    MissingMetrics,

    #[error("Duplicate metricId in metrics array is not allowed")]
    DuplicateMetric { metric_id: i64 },
}

impl ValidationError {
    /// Structured details echoed back in the error body, when there are any.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::SegmentsExpectedTooSmall { received } => {
                Some(json!({ "segmentsExpected": received }))
            }
            Self::DayIndexOutOfRange { received } => Some(json!({ "dayIndex": received })),
            Self::DuplicateMetric { metric_id } => Some(json!({ "metricId": metric_id })),
            Self::InvalidStartTimestamps
            | Self::InvalidWindowTimestamps
            | Self::EmptyWindow
            | Self::MissingMetrics => None,
        }
    }
}

/// Illegal session lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Session is not ACTIVE (current status: {status})")]
    NotActive { status: SessionStatus },

    #[error("Session is already COMPLETED and cannot be cancelled")]
    AlreadyCompleted,
}

/// Raised when the status reference table is missing a required row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{code} status row not found in share_session_statuses")]
    MissingStatus { code: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::EmptyWindow.to_string(),
            "fromUtc must be earlier than toUtc"
        );
        assert_eq!(
            ValidationError::MissingMetrics.to_string(),
            "metrics cannot be empty when hasData=true"
        );
    }

    #[test]
    fn test_validation_error_details() {
        let err = ValidationError::DuplicateMetric { metric_id: 7 };
        assert_eq!(err.details(), Some(json!({ "metricId": 7 })));
        assert!(ValidationError::EmptyWindow.details().is_none());
    }

    #[test]
    fn test_lifecycle_error_display() {
        let err = LifecycleError::NotActive {
            status: SessionStatus::Cancelled,
        };
        assert!(err.to_string().contains("not ACTIVE"));
        assert!(err.to_string().contains("CANCELLED"));
        assert!(LifecycleError::AlreadyCompleted
            .to_string()
            .contains("cannot be cancelled"));
    }

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::MissingStatus { code: "ACTIVE" };
        assert_eq!(
            err.to_string(),
            "ACTIVE status row not found in share_session_statuses"
        );
    }
}
