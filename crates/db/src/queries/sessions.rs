// crates/db/src/queries/sessions.rs
//! Share session reads and lifecycle writes.
//!
//! Every write is a single guarded statement or a transaction that opens
//! with one, so the status check and the change are a single atomic step.

use chrono::{DateTime, Utc};
use sharecycle_core::{CancelOutcome, NewSession, SessionStatus};
use tracing::info;

use super::row_types::{PostingRow, SessionRow, UserRow, SESSION_COLUMNS};
use super::unique_violation;
use crate::{Database, DbError, DbResult};

/// A freshly started session together with the rows it was validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedSession {
    pub session: SessionRow,
    pub posting: PostingRow,
    pub user: UserRow,
}

pub(crate) fn session_not_found(session_id: i64) -> DbError {
    DbError::NotFound(format!("Share session not found for sessionId={session_id}"))
}

impl Database {
    /// Insert a new ACTIVE session.
    ///
    /// The partial unique index on `(posting_id, user_id) WHERE ACTIVE`
    /// decides conflicts, so two racing starts cannot both succeed.
    pub async fn start_session(
        &self,
        new: &NewSession,
        now: DateTime<Utc>,
    ) -> DbResult<StartedSession> {
        let posting = self.get_posting(new.posting_id).await?.ok_or_else(|| {
            DbError::NotFound(format!("Posting not found for postingId={}", new.posting_id))
        })?;
        let user = self
            .get_user(new.user_id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("User not found for userId={}", new.user_id)))?;

        let now_ms = now.timestamp_millis();
        let result = sqlx::query(
            "INSERT INTO share_sessions (posting_id, user_id, join_time_local, join_timezone,
                cycle_anchor_utc, segments_expected, segments_sent, status_code,
                permission_granted, created_at, modified_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, 'ACTIVE', 1, ?, ?)",
        )
        .bind(new.posting_id)
        .bind(new.user_id)
        .bind(&new.join_time_local)
        .bind(&new.join_timezone)
        .bind(new.cycle_anchor.timestamp_millis())
        .bind(new.segments_expected)
        .bind(now_ms)
        .bind(now_ms)
        .execute(self.pool())
        .await;

        let session_id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(e) if unique_violation(&e).is_some() => {
                return Err(DbError::Conflict(
                    "Active session already exists for this posting and user".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let session = self
            .get_session(session_id)
            .await?
            .ok_or_else(|| session_not_found(session_id))?;
        info!(
            session_id,
            posting_id = new.posting_id,
            user_id = new.user_id,
            segments_expected = new.segments_expected,
            "Share session started"
        );
        Ok(StartedSession {
            session,
            posting,
            user,
        })
    }

    pub async fn get_session(&self, session_id: i64) -> DbResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM share_sessions WHERE session_id = ?"
        ))
        .bind(session_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// The ACTIVE session for a pair, if any. At most one can exist.
    pub async fn find_active_session(
        &self,
        posting_id: i64,
        user_id: i64,
    ) -> DbResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM share_sessions
             WHERE posting_id = ? AND user_id = ? AND status_code = 'ACTIVE'
             LIMIT 1"
        ))
        .bind(posting_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Most recently created session for a pair, ties broken by modification time.
    pub async fn find_latest_session_by_created(
        &self,
        posting_id: i64,
        user_id: i64,
    ) -> DbResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM share_sessions
             WHERE posting_id = ? AND user_id = ?
             ORDER BY created_at DESC, modified_at DESC, session_id DESC
             LIMIT 1"
        ))
        .bind(posting_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Most recently modified session for a pair, ties broken by creation time.
    pub async fn find_latest_session_by_modified(
        &self,
        posting_id: i64,
        user_id: i64,
    ) -> DbResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM share_sessions
             WHERE posting_id = ? AND user_id = ?
             ORDER BY modified_at DESC, created_at DESC, session_id DESC
             LIMIT 1"
        ))
        .bind(posting_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// ACTIVE sessions with sharing permission granted, oldest first.
    pub async fn list_active_sessions_for_user(&self, user_id: i64) -> DbResult<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM share_sessions
             WHERE user_id = ? AND status_code = 'ACTIVE' AND permission_granted = 1
             ORDER BY created_at ASC, session_id ASC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Every session of a posting, ordered by participant.
    pub async fn list_sessions_for_posting(&self, posting_id: i64) -> DbResult<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM share_sessions
             WHERE posting_id = ?
             ORDER BY user_id ASC, session_id ASC"
        ))
        .bind(posting_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Cancel a session.
    ///
    /// ACTIVE flips to CANCELLED through a compare-and-swap. When the swap
    /// matches nothing the current status decides: CANCELLED is an idempotent
    /// success, COMPLETED is a lifecycle error.
    pub async fn cancel_session(
        &self,
        session_id: i64,
        now: DateTime<Utc>,
    ) -> DbResult<CancelOutcome> {
        let mut tx = self.pool().begin().await?;

        let swapped = sqlx::query(
            "UPDATE share_sessions SET status_code = 'CANCELLED', modified_at = ?
             WHERE session_id = ? AND status_code = 'ACTIVE'",
        )
        .bind(now.timestamp_millis())
        .bind(session_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if swapped == 1 {
            tx.commit().await?;
            info!(session_id, status = %SessionStatus::Cancelled, "Share session cancelled");
            return Ok(CancelOutcome::Cancelled);
        }

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
        Ok(status.cancel()?)
    }
}
