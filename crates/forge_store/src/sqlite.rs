//! Embedded SQL backend.
//!
//! One row per session in `flow_state`, `action_graph` and
//! `runtime_config`; one row per kept event in `events`. Bodies are JSON.

use std::path::Path;

use chrono::Utc;
use forge_core::{Event, StoreBackend};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::state::{PersistedState, StateStore, DEFAULT_EVENTS_TAIL};

/// File name of the database inside the sessions directory.
pub const DB_FILE: &str = "state.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runtime_config (
    session_id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    context TEXT,
    last_snapshot TEXT,
    saved_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS flow_state (
    session_id TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS action_graph (
    session_id TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS events (
    session_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (session_id, position)
);
CREATE INDEX IF NOT EXISTS idx_runtime_saved_at ON runtime_config(saved_at);
";

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    events_tail: usize,
}

impl SqliteStore {
    /// Open (or create) `<dir>/state.db`.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(DB_FILE))?;
        Self::init(conn)
    }

    /// In-memory database, for tests and dry runs.
    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            events_tail: DEFAULT_EVENTS_TAIL,
        })
    }

    pub fn with_events_tail(mut self, cap: usize) -> Self {
        self.events_tail = cap;
        self
    }

    fn latest_session(conn: &Connection) -> StoreResult<Option<String>> {
        Ok(conn
            .query_row(
                "SELECT session_id FROM runtime_config ORDER BY saved_at DESC, rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn body(conn: &Connection, table: &str, session_id: &str) -> StoreResult<String> {
        let sql = format!("SELECT body FROM {} WHERE session_id = ?1", table);
        conn.query_row(&sql, params![session_id], |row| row.get(0))
            .optional()?
            .ok_or_else(|| StoreError::Corrupt(format!("{} row missing for {}", table, session_id)))
    }

    /// Load one session by id.
    pub fn load_session(&self, session_id: &str) -> StoreResult<PersistedState> {
        Self::read(&self.conn.lock(), session_id)
    }

    fn read(conn: &Connection, session_id: &str) -> StoreResult<PersistedState> {
        let (runtime, context, snapshot): (String, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT body, context, last_snapshot FROM runtime_config WHERE session_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

        let flow = Self::body(conn, "flow_state", session_id)?;
        let graph = Self::body(conn, "action_graph", session_id)?;

        let mut stmt = conn.prepare("SELECT body FROM events WHERE session_id = ?1 ORDER BY position")?;
        let events = stmt
            .query_map(params![session_id], |row| row.get::<_, String>(0))?
            .map(|body| -> StoreResult<Event> { Ok(serde_json::from_str(&body?)?) })
            .collect::<StoreResult<Vec<Event>>>()?;

        Ok(PersistedState {
            runtime: serde_json::from_str(&runtime)?,
            flow: serde_json::from_str(&flow)?,
            graph: serde_json::from_str(&graph)?,
            events,
            last_snapshot: snapshot.map(|s| serde_json::from_str(&s)).transpose()?,
            context: context
                .map(|c| serde_json::from_str(&c))
                .transpose()?
                .unwrap_or(serde_json::Value::Null),
        })
    }
}

impl StateStore for SqliteStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }

    fn save(&self, state: &PersistedState) -> StoreResult<()> {
        let mut state = state.clone();
        state.truncate_events(self.events_tail);
        let session_id = state.session_id().to_string();

        let runtime = serde_json::to_string(&state.runtime)?;
        let flow = serde_json::to_string(&state.flow)?;
        let graph = serde_json::to_string(&state.graph)?;
        let context = serde_json::to_string(&state.context)?;
        let snapshot = state.last_snapshot.as_ref().map(serde_json::to_string).transpose()?;
        let events = state
            .events
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO runtime_config (session_id, body, context, last_snapshot, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![session_id, runtime, context, snapshot, Utc::now().to_rfc3339()],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO flow_state (session_id, body) VALUES (?1, ?2)",
                params![session_id, flow],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO action_graph (session_id, body) VALUES (?1, ?2)",
                params![session_id, graph],
            )?;
            tx.execute("DELETE FROM events WHERE session_id = ?1", params![session_id])?;
            {
                let mut insert = tx.prepare("INSERT INTO events (session_id, position, body) VALUES (?1, ?2, ?3)")?;
                for (position, body) in events.iter().enumerate() {
                    insert.execute(params![session_id, position as i64, body])?;
                }
            }
            tx.commit()?;
        }
        debug!("Saved session {} to sqlite", session_id);
        Ok(())
    }

    fn load(&self) -> StoreResult<Option<PersistedState>> {
        let conn = self.conn.lock();
        match Self::latest_session(&conn)? {
            Some(id) => Self::read(&conn, &id).map(Some),
            None => Ok(None),
        }
    }

    fn clear(&self) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let Some(id) = Self::latest_session(&conn)? else {
            return Ok(());
        };
        let tx = conn.transaction()?;
        for table in ["runtime_config", "flow_state", "action_graph", "events"] {
            tx.execute(&format!("DELETE FROM {} WHERE session_id = ?1", table), params![id])?;
        }
        tx.commit()?;
        info!("Cleared session {}", id);
        Ok(())
    }

    fn sessions(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT session_id FROM runtime_config ORDER BY saved_at DESC, rowid DESC")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{FlowState, ForgeConfig, GraphMetadata, RuntimeConfig};

    #[test]
    fn test_schema_has_the_four_tables() {
        let store = SqliteStore::in_memory().unwrap();
        let conn = store.conn.lock();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let tables = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap();
        assert_eq!(tables, vec!["action_graph", "events", "flow_state", "runtime_config"]);
    }

    #[test]
    fn test_missing_session() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(matches!(store.load_session("nope"), Err(StoreError::SessionNotFound(_))));

        let runtime = RuntimeConfig::with_session("s1", &ForgeConfig::default());
        store
            .save(&PersistedState::new(runtime, FlowState::default(), GraphMetadata::default()))
            .unwrap();
        assert_eq!(store.sessions().unwrap(), vec!["s1"]);
    }
}
