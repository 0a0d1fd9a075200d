// crates/db/src/queries/mod.rs
// Repository-style queries over the sharecycle schema.

mod metrics;
mod reference;
pub(crate) mod row_types;
mod segments;
mod sessions;
mod statuses;

pub use reference::ReferenceData;
pub use row_types::{
    MetricDefinitionRow, MetricRow, PostingRow, RewardTypeRow, SegmentRow, SessionRow, UserRow,
};
pub use segments::AdmittedSegment;
pub use sessions::StartedSession;

/// Maximum number of SQLite bind variables per statement.
/// SQLite's historical hard limit is 999; we stay below it.
pub(crate) const SQLITE_VARIABLE_LIMIT: usize = 900;

/// The failing constraint's message if `err` is a UNIQUE violation.
///
/// SQLite reports `UNIQUE constraint failed: <table>.<col>, ...`, which is
/// enough to tell the duplicate kinds apart.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .filter(|db_err| db_err.is_unique_violation())
        .map(|db_err| db_err.message().to_string())
}
