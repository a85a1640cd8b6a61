//! SQLite-backed persistence facade. A single `parking_lot::Mutex` guards
//! one connection; every public method runs its statement(s) inside the
//! lock so callers never have to reason about interleaved writers. WAL mode
//! and foreign keys are turned on once at open time.

use agentcore_domain::error::{Error, Result};
use agentcore_domain::ids::ThreadId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::SCHEMA;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
}

impl SessionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "completed" => SessionStatus::Completed,
            "failed" => SessionStatus::Failed,
            _ => SessionStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: i64,
    pub session_id: ThreadId,
    pub message_json: Value,
    pub timestamp: DateTime<Utc>,
    pub message_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub id: ThreadId,
    pub conversation_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub metadata: Option<Value>,
}

pub struct Store {
    conn: Mutex<Connection>,
}

fn to_epoch_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_epoch_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

impl Store {
    /// Open (creating if absent) the database at `database_path`, apply
    /// pragmas, and ensure the schema exists.
    pub fn open(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path).map_err(|e| Error::Fatal(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| Error::Fatal(e.to_string()))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| Error::Fatal(e.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|e| Error::Fatal(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// An in-memory store, useful for tests and for a persistence-less mode.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Fatal(e.to_string()))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| Error::Fatal(e.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|e| Error::Fatal(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn create_session(
        &self,
        session_id: ThreadId,
        conversation_id: Option<String>,
        metadata: Option<Value>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (id, conversation_id, start_time, end_time, status, metadata_json)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5)",
            params![
                session_id.to_string(),
                conversation_id,
                to_epoch_millis(Utc::now()),
                SessionStatus::Active.as_str(),
                metadata.map(|v| v.to_string()),
            ],
        )
        .map_err(|e| Error::Fatal(e.to_string()))?;
        Ok(())
    }

    pub fn end_session(&self, session_id: ThreadId, status: SessionStatus) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET end_time = ?1, status = ?2 WHERE id = ?3",
            params![to_epoch_millis(Utc::now()), status.as_str(), session_id.to_string()],
        )
        .map_err(|e| Error::Fatal(e.to_string()))?;
        Ok(())
    }

    pub fn get_session(&self, session_id: ThreadId) -> Result<Option<StoredSession>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, conversation_id, start_time, end_time, status, metadata_json
                 FROM sessions WHERE id = ?1",
                params![session_id.to_string()],
                |row| {
                    let metadata_json: Option<String> = row.get(5)?;
                    Ok(StoredSession {
                        id: session_id,
                        conversation_id: row.get(1)?,
                        start_time: from_epoch_millis(row.get(2)?),
                        end_time: row.get::<_, Option<i64>>(3)?.map(from_epoch_millis),
                        status: SessionStatus::parse(&row.get::<_, String>(4)?),
                        metadata: metadata_json.and_then(|s| serde_json::from_str(&s).ok()),
                    })
                },
            )
            .optional()
            .map_err(|e| Error::Fatal(e.to_string()))?;
        Ok(row)
    }

    /// Append one message, stored as opaque JSON for accurate replay.
    /// Returns the assigned row id.
    pub fn append_message(
        &self,
        session_id: ThreadId,
        message_json: &Value,
        message_type: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO messages (session_id, message_json, timestamp, message_type)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id.to_string(),
                message_json.to_string(),
                to_epoch_millis(Utc::now()),
                message_type,
            ],
        )
        .map_err(|e| Error::Fatal(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    }

    /// All messages for a session in timestamp order, for replay.
    pub fn list_messages(&self, session_id: ThreadId) -> Result<Vec<StoredMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, message_json, timestamp, message_type FROM messages
                 WHERE session_id = ?1 ORDER BY timestamp ASC, id ASC",
            )
            .map_err(|e| Error::Fatal(e.to_string()))?;
        let rows = stmt
            .query_map(params![session_id.to_string()], |row| {
                let raw_json: String = row.get(1)?;
                Ok((row.get::<_, i64>(0)?, raw_json, row.get::<_, i64>(2)?, row.get::<_, String>(3)?))
            })
            .map_err(|e| Error::Fatal(e.to_string()))?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, raw_json, timestamp, message_type) = row.map_err(|e| Error::Fatal(e.to_string()))?;
            let message_json: Value = serde_json::from_str(&raw_json).map_err(Error::Json)?;
            messages.push(StoredMessage {
                id,
                session_id,
                message_json,
                timestamp: from_epoch_millis(timestamp),
                message_type,
            });
        }
        Ok(messages)
    }

    pub fn append_event(&self, session_id: ThreadId, event_type: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO events (session_id, event_type, timestamp) VALUES (?1, ?2, ?3)",
            params![session_id.to_string(), event_type, to_epoch_millis(Utc::now())],
        )
        .map_err(|e| Error::Fatal(e.to_string()))?;
        Ok(())
    }

    /// Draw the next value from the monotonic integer id generator.
    pub fn next_memory_id(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute("INSERT INTO memory_id_sequence DEFAULT VALUES", [])
            .map_err(|e| Error::Fatal(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_and_fetch_session_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        let id = ThreadId::new();
        store.create_session(id, Some("conv-1".to_string()), None).unwrap();
        let session = store.get_session(id).unwrap().unwrap();
        assert_eq!(session.conversation_id, Some("conv-1".to_string()));
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.end_time.is_none());
    }

    #[test]
    fn ending_a_session_sets_status_and_end_time() {
        let store = Store::open_in_memory().unwrap();
        let id = ThreadId::new();
        store.create_session(id, None, None).unwrap();
        store.end_session(id, SessionStatus::Completed).unwrap();
        let session = store.get_session(id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.end_time.is_some());
    }

    #[test]
    fn messages_are_returned_in_timestamp_order() {
        let store = Store::open_in_memory().unwrap();
        let id = ThreadId::new();
        store.create_session(id, None, None).unwrap();
        store.append_message(id, &json!({"text": "first"}), "TextMessage").unwrap();
        store.append_message(id, &json!({"text": "second"}), "TextMessage").unwrap();
        let messages = store.list_messages(id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message_json["text"], "first");
        assert_eq!(messages[1].message_json["text"], "second");
    }

    #[test]
    fn memory_id_sequence_is_monotonic() {
        let store = Store::open_in_memory().unwrap();
        let a = store.next_memory_id().unwrap();
        let b = store.next_memory_id().unwrap();
        assert!(b > a);
    }

    #[test]
    fn events_can_be_appended_independently_of_messages() {
        let store = Store::open_in_memory().unwrap();
        let id = ThreadId::new();
        store.create_session(id, None, None).unwrap();
        store.append_event(id, "RunAssignment").unwrap();
        store.append_event(id, "RunCompleted").unwrap();
    }

    #[test]
    fn messages_for_an_unknown_session_is_an_empty_list_not_an_error() {
        let store = Store::open_in_memory().unwrap();
        let messages = store.list_messages(ThreadId::new()).unwrap();
        assert!(messages.is_empty());
    }
}
