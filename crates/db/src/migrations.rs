/// Inline SQL migrations for the sharecycle database schema.
///
/// Instants are INTEGER unix milliseconds (UTC). Uniqueness rules live here
/// as indexes so concurrent writers are serialised by SQLite itself.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: reference tables
    r#"
BEGIN;
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    name TEXT
);
CREATE TABLE IF NOT EXISTS reward_types (
    reward_type_id INTEGER PRIMARY KEY,
    code TEXT NOT NULL,
    display_name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS postings (
    posting_id INTEGER PRIMARY KEY,
    buyer_user_id INTEGER,
    title TEXT,
    summary TEXT,
    description TEXT,
    reward_type_id INTEGER,
    reward_value REAL NOT NULL DEFAULT 0,
    data_coverage_days_required INTEGER
);
CREATE TABLE IF NOT EXISTS metric_definitions (
    metric_id INTEGER PRIMARY KEY,
    display_name TEXT NOT NULL
);
COMMIT;
"#,
    // Migration 2: status lookup, seeded
    r#"
BEGIN;
CREATE TABLE IF NOT EXISTS share_session_statuses (
    status_id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL
);
INSERT OR IGNORE INTO share_session_statuses (status_id, code, display_name) VALUES
    (1, 'ACTIVE', 'Active'),
    (2, 'COMPLETED', 'Completed'),
    (3, 'CANCELLED', 'Cancelled');
COMMIT;
"#,
    // Migration 3: sessions
    r#"
CREATE TABLE IF NOT EXISTS share_sessions (
    session_id INTEGER PRIMARY KEY AUTOINCREMENT,
    posting_id INTEGER NOT NULL REFERENCES postings(posting_id),
    user_id INTEGER NOT NULL REFERENCES users(user_id),
    join_time_local TEXT NOT NULL,
    join_timezone TEXT NOT NULL,
    cycle_anchor_utc INTEGER NOT NULL,
    segments_expected INTEGER NOT NULL CHECK (segments_expected >= 1),
    segments_sent INTEGER NOT NULL DEFAULT 0 CHECK (segments_sent >= 0),
    status_code TEXT NOT NULL DEFAULT 'ACTIVE'
        CHECK (status_code IN ('ACTIVE', 'COMPLETED', 'CANCELLED')),
    permission_granted INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    modified_at INTEGER NOT NULL
);
"#,
    // At most one ACTIVE session per (posting, user).
    r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_share_sessions_one_active
    ON share_sessions(posting_id, user_id) WHERE status_code = 'ACTIVE';
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_share_sessions_user_status ON share_sessions(user_id, status_code);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_share_sessions_posting ON share_sessions(posting_id, user_id);
"#,
    // Migration 4: segments
    r#"
CREATE TABLE IF NOT EXISTS share_segments (
    segment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES share_sessions(session_id),
    posting_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    day_index INTEGER NOT NULL CHECK (day_index >= 0),
    from_utc INTEGER NOT NULL,
    to_utc INTEGER NOT NULL,
    has_data INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    CHECK (to_utc > from_utc),
    UNIQUE (session_id, day_index),
    UNIQUE (session_id, from_utc, to_utc)
);
"#,
    // Migration 5: per-segment metric aggregates
    r#"
CREATE TABLE IF NOT EXISTS segment_metrics (
    segment_id INTEGER NOT NULL REFERENCES share_segments(segment_id),
    metric_id INTEGER NOT NULL,
    unit_code TEXT NOT NULL,
    total_value REAL,
    avg_value REAL,
    min_value REAL,
    max_value REAL,
    samples_count INTEGER,
    computed_json TEXT,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (segment_id, metric_id)
);
"#,
];
