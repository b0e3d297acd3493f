//! Session persistence for AppForge.
//!
//! Saves the flow state, graph metadata, runtime record, the last N events
//! and the latest snapshot so a restarted process can resume a session.
//! Two backends share the [`StateStore`] contract:
//!
//! - [`JsonFileStore`]: one directory per session, rotated backups
//! - [`SqliteStore`]: one database with a table per record kind

pub mod error;
pub mod json;
pub mod sqlite;
pub mod state;

use std::sync::Arc;

use forge_core::{ForgeConfig, StoreBackend};

pub use error::{StoreError, StoreResult};
pub use json::{JsonFileStore, BACKUPS};
pub use sqlite::{SqliteStore, DB_FILE};
pub use state::{PersistedState, StateStore, DEFAULT_EVENTS_TAIL};

/// Open the backend selected by `config` under its sessions directory.
pub fn open_store(config: &ForgeConfig) -> StoreResult<Arc<dyn StateStore>> {
    let dir = config.sessions_dir();
    Ok(match config.store {
        StoreBackend::Json => Arc::new(JsonFileStore::new(dir).with_events_tail(config.events_tail)),
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&dir)?.with_events_tail(config.events_tail)),
    })
}
