//! Read-only reference data: postings, users, reward types, metric definitions.
//!
//! Nothing in the service mutates these tables at request time. They are
//! seeded from a fixtures file at startup (or directly by tests).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::info;

use super::row_types::{MetricDefinitionRow, PostingRow, RewardTypeRow, UserRow};
use super::SQLITE_VARIABLE_LIMIT;
use crate::{Database, DbResult};

/// Fixtures document loaded with `--fixtures`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceData {
    pub users: Vec<UserRow>,
    pub reward_types: Vec<RewardTypeRow>,
    pub postings: Vec<PostingRow>,
    pub metric_definitions: Vec<MetricDefinitionRow>,
}

impl ReferenceData {
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// `SELECT <columns> FROM <table> WHERE <key> IN (...)` for a set of ids,
/// one statement per chunk.
async fn fetch_by_ids<T>(
    db: &Database,
    columns: &str,
    table: &str,
    key: &str,
    ids: &[i64],
) -> DbResult<Vec<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut rows = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(SQLITE_VARIABLE_LIMIT) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {columns} FROM {table} WHERE {key} IN ("));
        let mut sep = qb.separated(", ");
        for id in chunk {
            sep.push_bind(*id);
        }
        sep.push_unseparated(")");
        rows.extend(qb.build_query_as::<T>().fetch_all(db.pool()).await?);
    }
    Ok(rows)
}

const POSTING_COLUMNS: &str = "posting_id, buyer_user_id, title, summary, description, \
     reward_type_id, reward_value, data_coverage_days_required";

impl Database {
    /// Upsert every row of `data` in one transaction.
    pub async fn load_reference_data(&self, data: &ReferenceData) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;

        for user in &data.users {
            sqlx::query(
                "INSERT INTO users (user_id, name) VALUES (?, ?)
                 ON CONFLICT(user_id) DO UPDATE SET name = excluded.name",
            )
            .bind(user.user_id)
            .bind(&user.name)
            .execute(&mut *tx)
            .await?;
        }

        for rt in &data.reward_types {
            sqlx::query(
                "INSERT INTO reward_types (reward_type_id, code, display_name) VALUES (?, ?, ?)
                 ON CONFLICT(reward_type_id) DO UPDATE SET
                    code = excluded.code, display_name = excluded.display_name",
            )
            .bind(rt.reward_type_id)
            .bind(&rt.code)
            .bind(&rt.display_name)
            .execute(&mut *tx)
            .await?;
        }

        for p in &data.postings {
            sqlx::query(
                "INSERT INTO postings (posting_id, buyer_user_id, title, summary, description,
                    reward_type_id, reward_value, data_coverage_days_required)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(posting_id) DO UPDATE SET
                    buyer_user_id = excluded.buyer_user_id,
                    title = excluded.title,
                    summary = excluded.summary,
                    description = excluded.description,
                    reward_type_id = excluded.reward_type_id,
                    reward_value = excluded.reward_value,
                    data_coverage_days_required = excluded.data_coverage_days_required",
            )
            .bind(p.posting_id)
            .bind(p.buyer_user_id)
            .bind(&p.title)
            .bind(&p.summary)
            .bind(&p.description)
            .bind(p.reward_type_id)
            .bind(p.reward_value)
            .bind(p.data_coverage_days_required)
            .execute(&mut *tx)
            .await?;
        }

        for m in &data.metric_definitions {
            sqlx::query(
                "INSERT INTO metric_definitions (metric_id, display_name) VALUES (?, ?)
                 ON CONFLICT(metric_id) DO UPDATE SET display_name = excluded.display_name",
            )
            .bind(m.metric_id)
            .bind(&m.display_name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            users = data.users.len(),
            postings = data.postings.len(),
            reward_types = data.reward_types.len(),
            metric_definitions = data.metric_definitions.len(),
            "Reference data loaded"
        );
        Ok(())
    }

    pub async fn get_posting(&self, posting_id: i64) -> DbResult<Option<PostingRow>> {
        let row = sqlx::query_as::<_, PostingRow>(&format!(
            "SELECT {POSTING_COLUMNS} FROM postings WHERE posting_id = ?"
        ))
        .bind(posting_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn get_postings_by_ids(&self, ids: &[i64]) -> DbResult<HashMap<i64, PostingRow>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<PostingRow> =
            fetch_by_ids(self, POSTING_COLUMNS, "postings", "posting_id", ids).await?;
        Ok(rows.into_iter().map(|r| (r.posting_id, r)).collect())
    }

    pub async fn get_user(&self, user_id: i64) -> DbResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT user_id, name FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    pub async fn get_users_by_ids(&self, ids: &[i64]) -> DbResult<HashMap<i64, UserRow>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<UserRow> =
            fetch_by_ids(self, "user_id, name", "users", "user_id", ids).await?;
        Ok(rows.into_iter().map(|r| (r.user_id, r)).collect())
    }

    pub async fn get_reward_types_by_ids(
        &self,
        ids: &[i64],
    ) -> DbResult<HashMap<i64, RewardTypeRow>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<RewardTypeRow> = fetch_by_ids(
            self,
            "reward_type_id, code, display_name",
            "reward_types",
            "reward_type_id",
            ids,
        )
        .await?;
        Ok(rows.into_iter().map(|r| (r.reward_type_id, r)).collect())
    }

    pub async fn get_metric_definitions_by_ids(
        &self,
        ids: &[i64],
    ) -> DbResult<HashMap<i64, MetricDefinitionRow>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<MetricDefinitionRow> = fetch_by_ids(
            self,
            "metric_id, display_name",
            "metric_definitions",
            "metric_id",
            ids,
        )
        .await?;
        Ok(rows.into_iter().map(|r| (r.metric_id, r)).collect())
    }
}
