//! Project file writer.
//!
//! All writes are relative to the project root, atomic (temp file then
//! rename) and idempotent: an existing file longer than
//! [`PRESERVE_THRESHOLD`] characters is never overwritten by generation.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use forge_core::{Event, EventBus, EventType};
use forge_templates::normalize_path;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Existing files with more characters than this are preserved.
pub const PRESERVE_THRESHOLD: usize = 100;

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// A new file was created.
    Created,
    /// An existing file was replaced.
    Replaced,
    /// The existing file was kept.
    Preserved,
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{:02x}", b)).collect()
}

/// Writes generated files under one project root.
#[derive(Clone)]
pub struct FileWriter {
    root: PathBuf,
    bus: EventBus,
    /// Files created by this writer in the current session.
    session: Arc<RwLock<BTreeSet<String>>>,
}

impl FileWriter {
    pub fn new(root: impl Into<PathBuf>, bus: EventBus) -> Self {
        Self {
            root: root.into(),
            bus,
            session: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a plan path. Absolute paths and `..` are rejected.
    pub fn resolve(&self, path: &str) -> PipelineResult<PathBuf> {
        let relative = normalize_path(path);
        if relative.is_empty() || Path::new(path.trim()).is_absolute() {
            return Err(PipelineError::InvalidPath(path.to_string()));
        }
        let candidate = Path::new(&relative);
        if candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(PipelineError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(candidate))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn read(&self, path: &str) -> PipelineResult<String> {
        let full = self.resolve(path)?;
        Ok(fs::read_to_string(full)?)
    }

    /// True when `path` holds user work that generation must not replace.
    pub fn should_preserve(&self, path: &str) -> bool {
        let Ok(full) = self.resolve(path) else {
            return false;
        };
        match fs::read(&full) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).chars().count() > PRESERVE_THRESHOLD,
            Err(_) => false,
        }
    }

    /// Write generated content unless the file must be preserved.
    pub fn write(&self, path: &str, content: &str) -> PipelineResult<WriteOutcome> {
        if self.should_preserve(path) {
            return Ok(self.preserve(path));
        }
        self.write_atomic(path, content)
    }

    /// Record that `path` keeps its existing content.
    pub fn preserve(&self, path: &str) -> WriteOutcome {
        info!("Preserving existing file {}", path);
        self.bus.emit(
            Event::new(EventType::ThoughtInternal, format!("Skipping {}: existing content preserved", path))
                .internal()
                .with_data(json!({ "path": path, "preserved": true })),
        );
        WriteOutcome::Preserved
    }

    /// Replace a file regardless of its length. Used by fixes, which only
    /// touch files generated in this session.
    pub fn rewrite(&self, path: &str, content: &str) -> PipelineResult<WriteOutcome> {
        self.write_atomic(path, content)
    }

    fn write_atomic(&self, path: &str, content: &str) -> PipelineResult<WriteOutcome> {
        let full = self.resolve(path)?;
        let existed = full.is_file();
        let parent = full.parent().unwrap_or(&self.root).to_path_buf();
        self.ensure_dirs(&parent)?;

        let write_error = |message: String| PipelineError::Write {
            path: path.to_string(),
            message,
        };
        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| write_error(e.to_string()))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| write_error(e.to_string()))?;
        temp.persist(&full).map_err(|e| write_error(e.error.to_string()))?;

        debug!("Wrote {} ({} bytes)", path, content.len());
        if existed {
            Ok(WriteOutcome::Replaced)
        } else {
            self.session.write().insert(normalize_path(path));
            Ok(WriteOutcome::Created)
        }
    }

    /// Create `dir` and its missing ancestors, top down, emitting
    /// `folder_created` for each new one.
    fn ensure_dirs(&self, dir: &Path) -> PipelineResult<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(d) = current {
            if d.as_os_str().is_empty() || d.exists() {
                break;
            }
            missing.push(d.to_path_buf());
            current = d.parent();
        }

        for d in missing.into_iter().rev() {
            fs::create_dir(&d).or_else(|e| {
                if d.is_dir() {
                    Ok(())
                } else {
                    Err(PipelineError::Write {
                        path: d.display().to_string(),
                        message: e.to_string(),
                    })
                }
            })?;
            if d.starts_with(&self.root) && d != self.root {
                let relative = d
                    .strip_prefix(&self.root)
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                self.bus.emit(
                    Event::new(EventType::FolderCreated, format!("Created folder {}", relative))
                        .with_data(json!({ "path": relative })),
                );
            }
        }
        Ok(())
    }

    /// Files created in this session, sorted.
    pub fn session_files(&self) -> Vec<String> {
        self.session.read().iter().cloned().collect()
    }

    pub fn created_in_session(&self, path: &str) -> bool {
        self.session.read().contains(&normalize_path(path))
    }

    /// Delete a file this writer created. Files from earlier sessions are
    /// never touched; returns whether anything was removed.
    pub fn remove(&self, path: &str) -> PipelineResult<bool> {
        if !self.created_in_session(path) {
            debug!("Not removing {}: not created in this session", path);
            return Ok(false);
        }
        let full = self.resolve(path)?;
        if full.is_file() {
            fs::remove_file(&full)?;
        }
        self.session.write().remove(&normalize_path(path));
        info!("Removed {}", path);
        Ok(true)
    }

    /// SHA-256 of every session file still on disk.
    pub fn checksums(&self) -> BTreeMap<String, String> {
        self.session_files()
            .into_iter()
            .filter_map(|path| {
                let full = self.resolve(&path).ok()?;
                let bytes = fs::read(full).ok()?;
                Some((path, sha256_hex(&bytes)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn writer() -> (TempDir, EventBus, FileWriter) {
        let temp = TempDir::new().unwrap();
        let bus = EventBus::new();
        let writer = FileWriter::new(temp.path().join("todo"), bus.clone());
        (temp, bus, writer)
    }

    #[test]
    fn test_creates_folders_top_down() {
        let (_temp, bus, writer) = writer();
        let outcome = writer.write("lib/models/item.dart", "class Item {}\n").unwrap();
        assert_eq!(outcome, WriteOutcome::Created);

        let folders: Vec<String> = bus
            .events_of(EventType::FolderCreated)
            .iter()
            .map(|e| e.path().unwrap().to_string())
            .collect();
        assert_eq!(folders, vec!["lib", "lib/models"]);
        assert_eq!(writer.read("lib/models/item.dart").unwrap(), "class Item {}\n");
        assert_eq!(writer.session_files(), vec!["lib/models/item.dart"]);
    }

    #[test]
    fn test_preserves_long_existing_files() {
        let (_temp, bus, writer) = writer();
        let user_work = "x".repeat(PRESERVE_THRESHOLD + 1);
        writer.write("README.md", &user_work).unwrap();

        let outcome = writer.write("README.md", "# generated\n").unwrap();
        assert_eq!(outcome, WriteOutcome::Preserved);
        assert_eq!(writer.read("README.md").unwrap(), user_work);

        let skipped = bus.events_of(EventType::ThoughtInternal);
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].flag("preserved"));
    }

    #[test]
    fn test_short_existing_file_is_replaced() {
        let (_temp, _bus, writer) = writer();
        writer.write("main.py", "pass\n").unwrap();
        assert_eq!(writer.write("main.py", "print('hi')\n").unwrap(), WriteOutcome::Replaced);
        assert_eq!(writer.read("main.py").unwrap(), "print('hi')\n");
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let (_temp, _bus, writer) = writer();
        assert!(matches!(writer.write("../evil.sh", "x"), Err(PipelineError::InvalidPath(_))));
        assert!(matches!(writer.write("lib/../../x", "x"), Err(PipelineError::InvalidPath(_))));
        assert!(matches!(writer.write("", "x"), Err(PipelineError::InvalidPath(_))));
    }

    #[test]
    fn test_checksums_cover_session_files() {
        let (_temp, _bus, writer) = writer();
        writer.write("a.txt", "abc").unwrap();
        let sums = writer.checksums();
        assert_eq!(
            sums.get("a.txt").map(String::as_str),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn test_remove_only_touches_session_files() {
        let (temp, _bus, writer) = writer();
        fs::write(temp.path().join("old.txt"), "from yesterday").unwrap();
        writer.write("new.txt", "fresh").unwrap();

        assert!(!writer.remove("old.txt").unwrap());
        assert!(temp.path().join("old.txt").exists());
        assert!(writer.remove("new.txt").unwrap());
        assert!(!temp.path().join("new.txt").exists());
        assert!(writer.session_files().is_empty());
    }
}
