// crates/core/src/lifecycle.rs
//! Session lifecycle: `ACTIVE → COMPLETED | CANCELLED`, nothing leaves a
//! terminal state.
//!
//! These are the transition rules only. Storage applies each transition as a
//! guarded `UPDATE ... WHERE status_code = 'ACTIVE'` so concurrent writers
//! cannot both observe ACTIVE and both succeed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 3] = [Self::Active, Self::Completed, Self::Cancelled];

    /// Stable code stored in `share_sessions.status_code`.
    pub fn code(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Only ACTIVE sessions accept new segments.
    pub fn ensure_accepts_segments(self) -> Result<(), LifecycleError> {
        match self {
            Self::Active => Ok(()),
            status => Err(LifecycleError::NotActive { status }),
        }
    }

    /// Status after a segment has been recorded on an ACTIVE session.
    pub fn after_segment(self, segments_sent: i64, segments_expected: i64) -> Self {
        if self == Self::Active && segments_sent >= segments_expected {
            Self::Completed
        } else {
            self
        }
    }

    /// Apply a cancel request. Cancelling twice is a successful no-op.
    pub fn cancel(self) -> Result<CancelOutcome, LifecycleError> {
        match self {
            Self::Active => Ok(CancelOutcome::Cancelled),
            Self::Cancelled => Ok(CancelOutcome::AlreadyCancelled),
            Self::Completed => Err(LifecycleError::AlreadyCompleted),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Acknowledgement returned by a successful cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "codegen",
    derive(ts_rs::TS),
    ts(export, export_to = "../../../web/src/types/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
}

impl CancelOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::AlreadyCancelled => "already_cancelled",
        }
    }
}
