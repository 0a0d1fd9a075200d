// crates/db/src/queries/row_types.rs
// Row structs with manual FromRow impls. Instants are decoded from unix millis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sharecycle_core::time::from_millis;
use sharecycle_core::SessionStatus;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn instant(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let ms: i64 = row.try_get(column)?;
    from_millis(ms).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("timestamp {ms} out of range").into(),
    })
}

// ============================================================================
// Reference rows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingRow {
    pub posting_id: i64,
    #[serde(default)]
    pub buyer_user_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reward_type_id: Option<i64>,
    #[serde(default)]
    pub reward_value: f64,
    #[serde(default)]
    pub data_coverage_days_required: Option<i64>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for PostingRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            posting_id: row.try_get("posting_id")?,
            buyer_user_id: row.try_get("buyer_user_id")?,
            title: row.try_get("title")?,
            summary: row.try_get("summary")?,
            description: row.try_get("description")?,
            reward_type_id: row.try_get("reward_type_id")?,
            reward_value: row.try_get("reward_value")?,
            data_coverage_days_required: row.try_get("data_coverage_days_required")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub user_id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for UserRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardTypeRow {
    pub reward_type_id: i64,
    pub code: String,
    pub display_name: String,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for RewardTypeRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            reward_type_id: row.try_get("reward_type_id")?,
            code: row.try_get("code")?,
            display_name: row.try_get("display_name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinitionRow {
    pub metric_id: i64,
    pub display_name: String,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for MetricDefinitionRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            metric_id: row.try_get("metric_id")?,
            display_name: row.try_get("display_name")?,
        })
    }
}

// ============================================================================
// Session / segment / metric rows
// ============================================================================

pub(crate) const SESSION_COLUMNS: &str = "session_id, posting_id, user_id, join_time_local, \
     join_timezone, cycle_anchor_utc, segments_expected, segments_sent, status_code, \
     permission_granted, created_at, modified_at";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub session_id: i64,
    pub posting_id: i64,
    pub user_id: i64,
    pub join_time_local: String,
    pub join_timezone: String,
    pub cycle_anchor: DateTime<Utc>,
    pub segments_expected: i64,
    pub segments_sent: i64,
    pub status: SessionStatus,
    pub permission_granted: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for SessionRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let code: String = row.try_get("status_code")?;
        let status =
            SessionStatus::from_code(&code).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "status_code".to_string(),
                source: format!("unknown status code {code:?}").into(),
            })?;
        Ok(Self {
            session_id: row.try_get("session_id")?,
            posting_id: row.try_get("posting_id")?,
            user_id: row.try_get("user_id")?,
            join_time_local: row.try_get("join_time_local")?,
            join_timezone: row.try_get("join_timezone")?,
            cycle_anchor: instant(row, "cycle_anchor_utc")?,
            segments_expected: row.try_get("segments_expected")?,
            segments_sent: row.try_get("segments_sent")?,
            status,
            permission_granted: row.try_get("permission_granted")?,
            created_at: instant(row, "created_at")?,
            modified_at: instant(row, "modified_at")?,
        })
    }
}

pub(crate) const SEGMENT_COLUMNS: &str =
    "segment_id, session_id, posting_id, user_id, day_index, from_utc, to_utc, has_data, created_at";

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRow {
    pub segment_id: i64,
    pub session_id: i64,
    pub posting_id: i64,
    pub user_id: i64,
    pub day_index: u32,
    pub from_utc: DateTime<Utc>,
    pub to_utc: DateTime<Utc>,
    pub has_data: bool,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for SegmentRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            segment_id: row.try_get("segment_id")?,
            session_id: row.try_get("session_id")?,
            posting_id: row.try_get("posting_id")?,
            user_id: row.try_get("user_id")?,
            day_index: row.try_get("day_index")?,
            from_utc: instant(row, "from_utc")?,
            to_utc: instant(row, "to_utc")?,
            has_data: row.try_get("has_data")?,
            created_at: instant(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub segment_id: i64,
    pub metric_id: i64,
    pub unit_code: String,
    pub total_value: Option<f64>,
    pub avg_value: Option<f64>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub samples_count: Option<i64>,
    pub computed_json: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for MetricRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let raw_json: Option<String> = row.try_get("computed_json")?;
        let computed_json = raw_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "computed_json".to_string(),
                source: Box::new(e),
            })?;
        Ok(Self {
            segment_id: row.try_get("segment_id")?,
            metric_id: row.try_get("metric_id")?,
            unit_code: row.try_get("unit_code")?,
            total_value: row.try_get("total_value")?,
            avg_value: row.try_get("avg_value")?,
            min_value: row.try_get("min_value")?,
            max_value: row.try_get("max_value")?,
            samples_count: row.try_get("samples_count")?,
            computed_json,
            created_at: instant(row, "created_at")?,
        })
    }
}
