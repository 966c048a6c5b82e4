/// SQL DDL for the lift-store database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    floors INTEGER NOT NULL CHECK (floors >= 1),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lifts (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    position INTEGER NOT NULL,
    current_floor INTEGER NOT NULL DEFAULT 0 CHECK (current_floor >= 0),
    status TEXT NOT NULL DEFAULT 'idle' CHECK (status IN ('idle', 'busy')),
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lift_requests (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    lift_id TEXT NOT NULL REFERENCES lifts(id),
    requested_floor INTEGER NOT NULL CHECK (requested_floor >= 0),
    status TEXT NOT NULL DEFAULT 'queued' CHECK (status IN ('queued', 'completed')),
    created_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_lifts_session_position ON lifts(session_id, position);
CREATE INDEX IF NOT EXISTS idx_lifts_session_status ON lifts(session_id, status);
CREATE INDEX IF NOT EXISTS idx_requests_session_status ON lift_requests(session_id, status);
CREATE INDEX IF NOT EXISTS idx_requests_status ON lift_requests(status);

-- At most one active request per lift, and per (session, floor).
CREATE UNIQUE INDEX IF NOT EXISTS idx_requests_active_lift
    ON lift_requests(lift_id) WHERE status = 'queued';
CREATE UNIQUE INDEX IF NOT EXISTS idx_requests_active_floor
    ON lift_requests(session_id, requested_floor) WHERE status = 'queued';

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
