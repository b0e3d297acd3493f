//! JSON file backend.
//!
//! Layout under the sessions directory:
//! ```text
//! sessions/
//! ├── current              # id of the most recently saved session
//! └── <session_id>/
//!     ├── state.json       # latest state
//!     ├── state.json.1     # previous saves, newest first
//!     └── ...
//!     └── state.json.5
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use forge_core::StoreBackend;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::state::{PersistedState, StateStore, DEFAULT_EVENTS_TAIL};

/// Rotated backups kept per session.
pub const BACKUPS: usize = 5;

const STATE_FILE: &str = "state.json";
const CURRENT_FILE: &str = "current";

/// File-backed store with rotated backups.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    events_tail: usize,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            events_tail: DEFAULT_EVENTS_TAIL,
        }
    }

    pub fn with_events_tail(mut self, cap: usize) -> Self {
        self.events_tail = cap;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.dir.join(session_id)
    }

    fn backup_path(dir: &Path, n: usize) -> PathBuf {
        dir.join(format!("{}.{}", STATE_FILE, n))
    }

    fn current(&self) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.dir.join(CURRENT_FILE)) {
            Ok(id) if !id.trim().is_empty() => Ok(Some(id.trim().to_string())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Shift `state.json` into `state.json.1`, `.1` into `.2`, and so on,
    /// dropping the oldest.
    fn rotate(dir: &Path) -> StoreResult<()> {
        let state = dir.join(STATE_FILE);
        if !state.exists() {
            return Ok(());
        }
        let oldest = Self::backup_path(dir, BACKUPS);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..BACKUPS).rev() {
            let from = Self::backup_path(dir, n);
            if from.exists() {
                fs::rename(&from, Self::backup_path(dir, n + 1))?;
            }
        }
        fs::rename(&state, Self::backup_path(dir, 1))?;
        Ok(())
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(bytes)?;
        temp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn read_state(path: &Path) -> StoreResult<PersistedState> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))
    }

    /// Load one session, falling back to the newest readable backup.
    pub fn load_session(&self, session_id: &str) -> StoreResult<PersistedState> {
        let dir = self.session_dir(session_id);
        if !dir.is_dir() {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        let candidates =
            std::iter::once(dir.join(STATE_FILE)).chain((1..=BACKUPS).map(|n| Self::backup_path(&dir, n)));

        let mut last_error = None;
        for path in candidates.filter(|p| p.exists()) {
            match Self::read_state(&path) {
                Ok(state) => return Ok(state),
                Err(e) => {
                    warn!("Skipping unreadable state {:?}: {}", path, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| StoreError::SessionNotFound(session_id.to_string())))
    }

    /// Number of backups present for a session.
    pub fn backup_count(&self, session_id: &str) -> usize {
        let dir = self.session_dir(session_id);
        (1..=BACKUPS).filter(|n| Self::backup_path(&dir, *n).exists()).count()
    }
}

impl StateStore for JsonFileStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Json
    }

    fn save(&self, state: &PersistedState) -> StoreResult<()> {
        let mut state = state.clone();
        state.truncate_events(self.events_tail);

        let dir = self.session_dir(state.session_id());
        fs::create_dir_all(&dir)?;
        let bytes = serde_json::to_vec_pretty(&state)?;
        Self::rotate(&dir)?;
        Self::write_atomic(&dir.join(STATE_FILE), &bytes)?;
        Self::write_atomic(&self.dir.join(CURRENT_FILE), state.session_id().as_bytes())?;
        debug!("Saved session {} ({} events)", state.session_id(), state.events.len());
        Ok(())
    }

    fn load(&self) -> StoreResult<Option<PersistedState>> {
        match self.current()? {
            Some(id) => match self.load_session(&id) {
                Ok(state) => Ok(Some(state)),
                Err(StoreError::SessionNotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    fn clear(&self) -> StoreResult<()> {
        let Some(id) = self.current()? else {
            return Ok(());
        };
        let dir = self.session_dir(&id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::remove_file(self.dir.join(CURRENT_FILE))?;
        info!("Cleared session {}", id);
        Ok(())
    }

    fn sessions(&self) -> StoreResult<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let state = entry.path().join(STATE_FILE);
            if let Ok(modified) = fs::metadata(&state).and_then(|m| m.modified()) {
                sessions.push((modified, entry.file_name().to_string_lossy().to_string()));
            }
        }
        sessions.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(sessions.into_iter().map(|(_, id)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{FlowState, ForgeConfig, GraphMetadata, RuntimeConfig};
    use tempfile::TempDir;

    fn state(session: &str) -> PersistedState {
        let runtime = RuntimeConfig::with_session(session, &ForgeConfig::default());
        PersistedState::new(runtime, FlowState::default(), GraphMetadata::default())
    }

    #[test]
    fn test_rotation_keeps_five_backups() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        for _ in 0..8 {
            store.save(&state("s1")).unwrap();
        }
        assert_eq!(store.backup_count("s1"), BACKUPS);
        assert!(!JsonFileStore::backup_path(&temp.path().join("s1"), BACKUPS + 1).exists());
    }

    #[test]
    fn test_corrupt_state_falls_back_to_backup() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        let first = state("s1");
        store.save(&first).unwrap();
        store.save(&first).unwrap();
        fs::write(temp.path().join("s1").join(STATE_FILE), "{ not json").unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, first);
    }

    #[test]
    fn test_current_points_at_latest_session() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        store.save(&state("a")).unwrap();
        store.save(&state("b")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().session_id(), "b");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.sessions().unwrap(), vec!["a"]);
    }
}
