//! SQL schema for the CivicaLex SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id             TEXT PRIMARY KEY,
    name                TEXT NOT NULL,
    email               TEXT NOT NULL UNIQUE,   -- trimmed, lowercased
    password_hash       TEXT NOT NULL,          -- argon2 PHC string
    phone               TEXT,
    address             TEXT,
    role                TEXT NOT NULL DEFAULT 'user',
    active              INTEGER NOT NULL DEFAULT 1,
    email_verified      INTEGER NOT NULL DEFAULT 0,
    last_login          TEXT,
    password_changed_at TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    csrf_token TEXT NOT NULL,
    user_id    TEXT REFERENCES users(user_id) ON DELETE CASCADE,
    last_login TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cases (
    case_id      TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL REFERENCES users(user_id),
    title        TEXT NOT NULL,
    description  TEXT,
    case_type    TEXT NOT NULL,
    court        TEXT NOT NULL,
    case_number  TEXT NOT NULL,   -- uppercased
    plaintiff    TEXT,
    defendant    TEXT,
    filing_date  TEXT,            -- YYYY-MM-DD
    next_hearing TEXT,            -- YYYY-MM-DD
    status       TEXT NOT NULL DEFAULT 'Pending',
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    UNIQUE (court, case_number)
);

-- Timeline entries are append-only.
CREATE TABLE IF NOT EXISTS case_events (
    event_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id     TEXT NOT NULL REFERENCES cases(case_id) ON DELETE CASCADE,
    date        TEXT NOT NULL,
    action      TEXT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS case_notifications (
    notification_id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id         TEXT NOT NULL REFERENCES cases(case_id) ON DELETE CASCADE,
    date            TEXT NOT NULL,
    message         TEXT NOT NULL,
    is_read         INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS petitions (
    petition_id   TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL REFERENCES users(user_id),
    case_id       TEXT REFERENCES cases(case_id) ON DELETE SET NULL,
    title         TEXT NOT NULL,
    description   TEXT NOT NULL,
    petition_type TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'Draft',
    court         TEXT,
    case_number   TEXT,
    filing_date   TEXT,
    next_hearing  TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- case_id and petition_id carry no foreign key: a document outlives the
-- records it was filed against.
CREATE TABLE IF NOT EXISTS documents (
    document_id  TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL REFERENCES users(user_id),
    case_id      TEXT,
    petition_id  TEXT,
    file_name    TEXT NOT NULL,
    file_path    TEXT NOT NULL UNIQUE,   -- bare name inside the upload dir
    mime_type    TEXT NOT NULL,
    file_size    INTEGER NOT NULL,
    category     TEXT,
    description  TEXT,
    version      INTEGER NOT NULL DEFAULT 1,
    access_level TEXT NOT NULL DEFAULT 'Private',
    shared_with  TEXT NOT NULL DEFAULT '[]',   -- JSON array of user ids
    sha256       TEXT NOT NULL,
    is_deleted   INTEGER NOT NULL DEFAULT 0,
    deleted_at   TEXT,
    deleted_by   TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    CHECK (case_id IS NOT NULL OR petition_id IS NOT NULL),
    CHECK (version >= 1),
    CHECK (file_size > 0)
);

CREATE INDEX IF NOT EXISTS sessions_expiry_idx   ON sessions(expires_at);
CREATE INDEX IF NOT EXISTS cases_owner_idx       ON cases(user_id, created_at);
CREATE INDEX IF NOT EXISTS events_case_idx       ON case_events(case_id);
CREATE INDEX IF NOT EXISTS notifications_case_idx ON case_notifications(case_id);
CREATE INDEX IF NOT EXISTS petitions_owner_idx   ON petitions(user_id, created_at);
CREATE INDEX IF NOT EXISTS documents_owner_idx   ON documents(user_id, is_deleted);
CREATE INDEX IF NOT EXISTS documents_case_idx    ON documents(case_id);

PRAGMA user_version = 1;
";
