pub const SCHEMA: &str = r#"
-- Users: identities tracked by the recognizer
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,          -- external id supplied at registration
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_users_name ON users(name);

-- Attendance records: one row per accepted recognition event
CREATE TABLE IF NOT EXISTS attendance_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,  -- UTC, ISO 8601
    confidence REAL NOT NULL,        -- recognizer score (0-1)
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_attendance_user ON attendance_records(user_id);
CREATE INDEX IF NOT EXISTS idx_attendance_timestamp ON attendance_records(timestamp);
"#;

// Schema changes that postdate the initial release. Applied with errors
// ignored so re-running them on an up-to-date database is harmless.
pub const MIGRATIONS: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_attendance_user_timestamp ON attendance_records(user_id, timestamp)",
];
