//! YAML template manifests.
//!
//! A manifest at `<templates_dir>/<platform>/template.yaml` overrides the
//! built-in template of that platform. Fields left out keep their built-in
//! value; a non-empty `files` list replaces the built-in list.

use std::fs;
use std::path::{Path, PathBuf};

use forge_core::Platform;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{TemplateError, TemplateResult};
use crate::platform::{PlatformTemplate, TemplateFile};

/// On-disk manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateManifest {
    pub platform: Option<Platform>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<TemplateFile>,
    #[serde(default)]
    pub commands: ManifestCommands,
}

/// Command overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestCommands {
    #[serde(default)]
    pub install: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

impl TemplateManifest {
    /// Load a manifest file. The platform falls back to the parent directory
    /// name when the file does not declare one.
    pub fn load(path: &Path) -> TemplateResult<Self> {
        debug!("Loading manifest from {:?}", path);
        let content = fs::read_to_string(path)?;
        let mut manifest: TemplateManifest =
            serde_yaml::from_str(&content).map_err(|e| TemplateError::InvalidManifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if manifest.platform.is_none() {
            manifest.platform = path
                .parent()
                .and_then(|dir| dir.file_name())
                .and_then(|name| Platform::from_str(&name.to_string_lossy()));
        }
        if manifest.platform.is_none() {
            return Err(TemplateError::InvalidManifest {
                path: path.to_path_buf(),
                message: "unknown platform".to_string(),
            });
        }
        Ok(manifest)
    }

    /// Apply this manifest on top of `base`.
    pub fn apply(&self, base: &mut PlatformTemplate) {
        if let Some(name) = &self.name {
            base.name = name.clone();
        }
        if let Some(description) = &self.description {
            base.description = description.clone();
        }
        if !self.files.is_empty() {
            base.files = self.files.clone();
        }
        if let Some(install) = &self.commands.install {
            base.commands.install = non_empty(install);
        }
        if let Some(build) = &self.commands.build {
            base.commands.build = non_empty(build);
        }
        if let Some(preview) = &self.commands.preview {
            base.commands.preview = non_empty(preview);
        }
    }
}

/// An empty string in a manifest disables the step.
fn non_empty(command: &str) -> Option<String> {
    let trimmed = command.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Find every `template.yaml` / `template.yml` one level below `dir`.
pub fn discover(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Templates directory does not exist: {:?}", dir);
        return Vec::new();
    }

    let mut found = Vec::new();
    for name in ["template.yaml", "template.yml"] {
        let pattern = dir.join("*").join(name);
        let Some(pattern) = pattern.to_str() else {
            continue;
        };
        match glob::glob(pattern) {
            Ok(paths) => found.extend(paths.filter_map(Result::ok)),
            Err(e) => warn!("Bad manifest pattern {}: {}", pattern, e),
        }
    }
    found.sort();
    info!("Found {} template manifests in {:?}", found.len(), dir);
    found
}
