// crates/db/src/queries/segments.rs
//! Segment admission and segment reads.

use chrono::{DateTime, Utc};
use sharecycle_core::{SessionStatus, ValidatedSegment};
use sqlx::QueryBuilder;
use tracing::{debug, info};

use super::row_types::{SegmentRow, SEGMENT_COLUMNS};
use super::sessions::session_not_found;
use super::{unique_violation, SQLITE_VARIABLE_LIMIT};
use crate::{Database, DbError, DbResult};

/// Outcome of a successful admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedSegment {
    pub segment_id: i64,
    pub session_id: i64,
    pub day_index: u32,
    pub segments_sent: i64,
    pub segments_expected: i64,
    pub status: SessionStatus,
    pub metrics_stored: usize,
}

fn conflict_message(constraint: &str) -> &'static str {
    if constraint.contains("share_segments.day_index") {
        "Segment already exists for this session and dayIndex"
    } else if constraint.contains("share_segments.from_utc") {
        "Segment already exists for the same time window"
    } else if constraint.contains("segment_metrics") {
        "Metrics contain duplicates for this segment"
    } else {
        "Duplicate segment or metric detected"
    }
}

impl Database {
    /// Record one segment and its metrics as a single atomic unit.
    ///
    /// The transaction opens with a guarded write on the session row. That
    /// takes SQLite's write lock and proves the session is ACTIVE in one
    /// step, so a concurrent cancel or duplicate submit waits and then sees
    /// the committed result. Any failure rolls back everything.
    pub async fn admit_segment(
        &self,
        segment: &ValidatedSegment,
        now: DateTime<Utc>,
    ) -> DbResult<AdmittedSegment> {
        let now_ms = now.timestamp_millis();
        let session_id = segment.session_id;
        let mut tx = self.pool().begin().await?;

        let guarded = sqlx::query(
            "UPDATE share_sessions SET modified_at = ?
             WHERE session_id = ? AND status_code = 'ACTIVE'",
        )
        .bind(now_ms)
        .bind(session_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if guarded == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status_code FROM share_sessions WHERE session_id = ?")
                    .bind(session_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            let code = current.ok_or_else(|| session_not_found(session_id))?;
            let status = SessionStatus::from_code(&code).ok_or_else(|| {
                DbError::Sqlx(sqlx::Error::Protocol(format!("unknown status code {code:?}")))
            })?;
            return Err(match status.ensure_accepts_segments() {
                Err(e) => e.into(),
                // The guard only misses an existing row when it is not ACTIVE.
                Ok(()) => DbError::Conflict("Session is not ACTIVE".into()),
            });
        }

        let (posting_id, user_id, segments_expected): (i64, i64, i64) = sqlx::query_as(
            "SELECT posting_id, user_id, segments_expected FROM share_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            "INSERT INTO share_segments (session_id, posting_id, user_id, day_index,
                from_utc, to_utc, has_data, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(posting_id)
        .bind(user_id)
        .bind(segment.day_index)
        .bind(segment.window.start.timestamp_millis())
        .bind(segment.window.end.timestamp_millis())
        .bind(segment.has_data)
        .bind(now_ms)
        .execute(&mut *tx)
        .await;

        let segment_id = match inserted {
            Ok(done) => done.last_insert_rowid(),
            Err(e) => {
                return Err(match unique_violation(&e) {
                    Some(constraint) => {
                        debug!(session_id, day_index = segment.day_index, %constraint, "Duplicate segment");
                        DbError::Conflict(conflict_message(&constraint).into())
                    }
                    None => e.into(),
                });
            }
        };

        let metrics_stored = if segment.has_data {
            match Self::insert_metrics_tx(&mut tx, segment_id, &segment.metrics, now_ms).await {
                Ok(n) => n,
                Err(e) => {
                    return Err(match unique_violation(&e) {
                        Some(constraint) => DbError::Conflict(conflict_message(&constraint).into()),
                        None => e.into(),
                    });
                }
            }
        } else {
            0
        };

        let (segments_sent,): (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT day_index) FROM share_segments
             WHERE session_id = ? AND has_data = 1",
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        let status = SessionStatus::Active.after_segment(segments_sent, segments_expected);
        sqlx::query(
            "UPDATE share_sessions SET segments_sent = ?, status_code = ?, modified_at = ?
             WHERE session_id = ?",
        )
        .bind(segments_sent)
        .bind(status.code())
        .bind(now_ms)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            session_id,
            segment_id,
            day_index = segment.day_index,
            segments_sent,
            segments_expected,
            status = %status,
            "Segment admitted"
        );

        Ok(AdmittedSegment {
            segment_id,
            session_id,
            day_index: segment.day_index,
            segments_sent,
            segments_expected,
            status,
            metrics_stored,
        })
    }

    /// All segments of the given sessions, ordered by session then day.
    pub async fn get_segments_for_sessions(&self, session_ids: &[i64]) -> DbResult<Vec<SegmentRow>> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = Vec::new();
        for chunk in session_ids.chunks(SQLITE_VARIABLE_LIMIT) {
            let mut qb = QueryBuilder::new(format!(
                "SELECT {SEGMENT_COLUMNS} FROM share_segments WHERE session_id IN ("
            ));
            let mut sep = qb.separated(", ");
            for id in chunk {
                sep.push_bind(*id);
            }
            sep.push_unseparated(")");

            rows.extend(
                qb.build_query_as::<SegmentRow>()
                    .fetch_all(self.pool())
                    .await?,
            );
        }
        rows.sort_by_key(|s| (s.session_id, s.day_index));
        Ok(rows)
    }

    /// The segment with the highest day index, with or without data.
    pub async fn get_last_segment(&self, session_id: i64) -> DbResult<Option<SegmentRow>> {
        let row = sqlx::query_as::<_, SegmentRow>(&format!(
            "SELECT {SEGMENT_COLUMNS} FROM share_segments
             WHERE session_id = ?
             ORDER BY day_index DESC
             LIMIT 1"
        ))
        .bind(session_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{seed, start, submission, t0};
    use crate::queries::SQLITE_VARIABLE_LIMIT;
    use sharecycle_core::LifecycleError;

    #[tokio::test]
    async fn test_admit_with_metrics() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let session_id = start(&db, 5).await;

        let admitted = db
            .admit_segment(&submission(session_id, 0, true), t0())
            .await
            .unwrap();
        assert_eq!(admitted.segments_sent, 1);
        assert_eq!(admitted.metrics_stored, 2);
        assert_eq!(admitted.status, SessionStatus::Active);

        let session = db.get_session(session_id).await.unwrap().unwrap();
        assert_eq!(session.segments_sent, 1);
    }

    #[tokio::test]
    async fn test_no_data_segment_does_not_count() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let session_id = start(&db, 5).await;

        let admitted = db
            .admit_segment(&submission(session_id, 0, false), t0())
            .await
            .unwrap();
        assert_eq!(admitted.segments_sent, 0);
        assert_eq!(admitted.metrics_stored, 0);

        let last = db.get_last_segment(session_id).await.unwrap().unwrap();
        assert_eq!(last.day_index, 0);
        assert!(!last.has_data);
    }

    #[tokio::test]
    async fn test_duplicate_day_conflicts_and_keeps_one_row() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let session_id = start(&db, 5).await;

        db.admit_segment(&submission(session_id, 1, true), t0())
            .await
            .unwrap();
        let mut retry = submission(session_id, 1, true);
        retry.window.start += chrono::TimeDelta::minutes(1);
        let err = db.admit_segment(&retry, t0()).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(ref m) if m.contains("dayIndex")));

        let segments = db.get_segments_for_sessions(&[session_id]).await.unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_window_conflicts() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let session_id = start(&db, 5).await;

        let first = submission(session_id, 1, true);
        db.admit_segment(&first, t0()).await.unwrap();
        let mut same_window = first.clone();
        same_window.day_index = 2;
        let err = db.admit_segment(&same_window, t0()).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(ref m) if m.contains("time window")));
    }

    #[tokio::test]
    async fn test_completion_on_last_day() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let session_id = start(&db, 2).await;

        db.admit_segment(&submission(session_id, 0, true), t0())
            .await
            .unwrap();
        let admitted = db
            .admit_segment(&submission(session_id, 1, true), t0())
            .await
            .unwrap();
        assert_eq!(admitted.status, SessionStatus::Completed);

        let err = db
            .admit_segment(&submission(session_id, 2, true), t0())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Lifecycle(LifecycleError::NotActive {
                status: SessionStatus::Completed
            })
        ));
    }

    #[tokio::test]
    async fn test_admit_on_cancelled_or_missing_session() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let session_id = start(&db, 5).await;
        db.cancel_session(session_id, t0()).await.unwrap();

        let err = db
            .admit_segment(&submission(session_id, 0, true), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Lifecycle(LifecycleError::NotActive { .. })));

        let err = db
            .admit_segment(&submission(999, 0, true), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_segments_for_sessions_ordered() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let session_id = start(&db, 5).await;

        for day in [2, 0, 1] {
            db.admit_segment(&submission(session_id, day, true), t0())
                .await
                .unwrap();
        }
        let days: Vec<u32> = db
            .get_segments_for_sessions(&[session_id])
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.day_index)
            .collect();
        assert_eq!(days, vec![0, 1, 2]);
        assert!(db.get_segments_for_sessions(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_segments_for_more_sessions_than_the_variable_limit() {
        let db = Database::new_in_memory().await.unwrap();
        seed(&db).await;
        let first = start(&db, 5).await;
        for day in 0..3 {
            db.admit_segment(&submission(first, day, true), t0()).await.unwrap();
        }
        db.cancel_session(first, t0()).await.unwrap();
        let second = start(&db, 5).await;
        db.admit_segment(&submission(second, 0, true), t0()).await.unwrap();

        // The two sessions sit in different chunks, in reverse order.
        let mut ids = vec![second];
        ids.extend(50_000..50_000 + SQLITE_VARIABLE_LIMIT as i64);
        ids.push(first);

        let rows = db.get_segments_for_sessions(&ids).await.unwrap();
        let keys: Vec<(i64, u32)> = rows.iter().map(|s| (s.session_id, s.day_index)).collect();
        assert_eq!(keys, vec![(first, 0), (first, 1), (first, 2), (second, 0)]);
    }
}
