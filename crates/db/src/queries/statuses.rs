// crates/db/src/queries/statuses.rs
use sharecycle_core::{StatusCatalog, StatusDef};

use crate::{Database, DbResult};

impl Database {
    pub async fn list_statuses(&self) -> DbResult<Vec<StatusDef>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT status_id, code, display_name FROM share_session_statuses ORDER BY status_id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(status_id, code, display_name)| StatusDef {
                status_id,
                code,
                display_name,
            })
            .collect())
    }

    /// Resolve every session status to its row. Called once at startup; a
    /// missing row is fatal.
    pub async fn load_status_catalog(&self) -> DbResult<StatusCatalog> {
        let rows = self.list_statuses().await?;
        Ok(StatusCatalog::from_rows(rows)?)
    }
}
