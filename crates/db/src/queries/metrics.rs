// crates/db/src/queries/metrics.rs
use sharecycle_core::MetricInput;
use sqlx::{QueryBuilder, Sqlite, Transaction};

use super::row_types::MetricRow;
use super::SQLITE_VARIABLE_LIMIT;
use crate::{Database, DbResult};

const METRIC_COLUMNS: &str = "segment_id, metric_id, unit_code, total_value, avg_value, \
     min_value, max_value, samples_count, computed_json, created_at";

/// Bound values per inserted metric row.
const METRIC_BINDS: usize = 10;

impl Database {
    /// Batch-insert a segment's metrics inside the admission transaction.
    ///
    /// Raw `sqlx::Error` is returned so the caller can map uniqueness
    /// violations alongside the segment insert.
    pub(crate) async fn insert_metrics_tx(
        tx: &mut Transaction<'_, Sqlite>,
        segment_id: i64,
        metrics: &[MetricInput],
        created_at_ms: i64,
    ) -> Result<usize, sqlx::Error> {
        if metrics.is_empty() {
            return Ok(0);
        }
        let mut inserted = 0;
        for chunk in metrics.chunks(SQLITE_VARIABLE_LIMIT / METRIC_BINDS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "INSERT INTO segment_metrics ({METRIC_COLUMNS}) "
            ));
            qb.push_values(chunk, |mut b, m| {
                b.push_bind(segment_id)
                    .push_bind(m.metric_id)
                    .push_bind(m.unit_code.as_str())
                    .push_bind(m.total_value)
                    .push_bind(m.avg_value)
                    .push_bind(m.min_value)
                    .push_bind(m.max_value)
                    .push_bind(m.samples_count)
                    .push_bind(m.computed_json.as_ref().map(|v| v.to_string()))
                    .push_bind(created_at_ms);
            });
            let done = qb.build().execute(&mut **tx).await?;
            inserted += done.rows_affected() as usize;
        }
        Ok(inserted)
    }

    /// Metrics for a set of segments, ordered by segment then metric id.
    pub async fn get_metrics_for_segments(&self, segment_ids: &[i64]) -> DbResult<Vec<MetricRow>> {
        if segment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = Vec::with_capacity(segment_ids.len());
        for chunk in segment_ids.chunks(SQLITE_VARIABLE_LIMIT) {
            let mut qb = QueryBuilder::new(format!(
                "SELECT {METRIC_COLUMNS} FROM segment_metrics WHERE segment_id IN ("
            ));
            let mut sep = qb.separated(", ");
            for id in chunk {
                sep.push_bind(*id);
            }
            sep.push_unseparated(")");

            rows.extend(
                qb.build_query_as::<MetricRow>()
                    .fetch_all(self.pool())
                    .await?,
            );
        }
        rows.sort_by_key(|m| (m.segment_id, m.metric_id));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::queries::test_support::{metric, seed, start, submission, t0};
    use crate::queries::SQLITE_VARIABLE_LIMIT;
    use crate::Database;
    use serde_json::json;

    #[tokio::test]
    async fn test_metrics_round_trip_through_admission() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let session_id = start(&db, 5).await;

        let mut segment = submission(session_id, 0, true);
        segment.metrics[1].computed_json = Some(json!({ "p95": 71.5 }));
        let admitted = db.admit_segment(&segment, t0()).await.unwrap();

        let metrics = db
            .get_metrics_for_segments(&[admitted.segment_id])
            .await
            .unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].metric_id, 1);
        assert_eq!(metrics[0].total_value, Some(8000.0));
        assert_eq!(metrics[1].computed_json, Some(json!({ "p95": 71.5 })));
        assert_eq!(metrics[1].samples_count, None);
    }

    #[tokio::test]
    async fn test_no_data_segment_stores_no_metrics() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let session_id = start(&db, 5).await;

        let admitted = db
            .admit_segment(&submission(session_id, 0, false), t0())
            .await
            .unwrap();
        assert!(db
            .get_metrics_for_segments(&[admitted.segment_id])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_metric_batches_larger_than_the_variable_limit() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let session_id = start(&db, 5).await;

        // 250 rows of 10 binds each would overflow a single INSERT.
        let mut segment = submission(session_id, 0, true);
        segment.metrics = (1..=250).map(|id| metric(id, Some(id as f64))).collect();
        let admitted = db.admit_segment(&segment, t0()).await.unwrap();
        assert_eq!(admitted.metrics_stored, 250);

        // The real id lands in the second chunk of the read.
        let mut ids: Vec<i64> = (100_000..100_000 + SQLITE_VARIABLE_LIMIT as i64).collect();
        ids.push(admitted.segment_id);
        let metrics = db.get_metrics_for_segments(&ids).await.unwrap();
        assert_eq!(metrics.len(), 250);
        assert_eq!(metrics[0].metric_id, 1);
        assert_eq!(metrics[249].metric_id, 250);
        assert_eq!(metrics[249].total_value, Some(250.0));
    }
}
