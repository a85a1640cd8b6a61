//! SQL schema for the persistence backend. Applied once at `Store::open`
//! time with `CREATE TABLE IF NOT EXISTS`, so opening an existing database
//! file is idempotent.

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id              TEXT PRIMARY KEY,
    conversation_id TEXT,
    start_time      INTEGER NOT NULL,
    end_time        INTEGER,
    status          TEXT NOT NULL,
    metadata_json   TEXT
);

CREATE TABLE IF NOT EXISTS messages (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id   TEXT NOT NULL REFERENCES sessions(id),
    message_json TEXT NOT NULL,
    timestamp    INTEGER NOT NULL,
    message_type TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_session_timestamp
    ON messages(session_id, timestamp);

CREATE TABLE IF NOT EXISTS events (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    event_type TEXT NOT NULL,
    timestamp  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS memory_id_sequence (
    id INTEGER PRIMARY KEY AUTOINCREMENT
);
";
