//! Template library: built-in templates plus manifest overrides.

use std::collections::HashMap;
use std::path::Path;

use forge_core::Platform;
use tracing::{info, warn};

use crate::error::TemplateResult;
use crate::files::FileSpec;
use crate::manifest::{discover, TemplateManifest};
use crate::platform::{builtin, commit_command, PlatformTemplate, PostCommands};
use crate::skeleton::skeleton;

/// Per-platform templates used by the planner and the generator.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: HashMap<Platform, PlatformTemplate>,
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateLibrary {
    /// Library with the built-in template of every platform.
    pub fn builtin() -> Self {
        let templates = Platform::all().iter().map(|p| (*p, builtin(*p))).collect();
        Self { templates }
    }

    /// Built-ins overridden by the manifests found in `dir`. Manifests that
    /// fail to load are skipped with a warning.
    pub fn load(dir: &Path) -> Self {
        let mut library = Self::builtin();
        for path in discover(dir) {
            match TemplateManifest::load(&path) {
                Ok(manifest) => library.apply(&manifest),
                Err(e) => warn!("Skipping manifest {:?}: {}", path, e),
            }
        }
        library
    }

    /// Apply one manifest.
    pub fn apply(&mut self, manifest: &TemplateManifest) {
        let Some(platform) = manifest.platform else {
            return;
        };
        let template = self.templates.entry(platform).or_insert_with(|| builtin(platform));
        manifest.apply(template);
        info!("Applied template manifest for {}", platform);
    }

    /// Load and apply a single manifest file.
    pub fn apply_file(&mut self, path: &Path) -> TemplateResult<()> {
        let manifest = TemplateManifest::load(path)?;
        self.apply(&manifest);
        Ok(())
    }

    pub fn template(&self, platform: Platform) -> PlatformTemplate {
        self.templates
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| builtin(platform))
    }

    /// Default file plan in priority order.
    pub fn file_plan(&self, platform: Platform) -> Vec<FileSpec> {
        self.template(platform).file_plan()
    }

    pub fn commands(&self, platform: Platform) -> PostCommands {
        self.template(platform).commands
    }

    pub fn commit_command(&self, project: &str) -> String {
        commit_command(project)
    }

    /// Offline content for one file.
    pub fn skeleton(&self, platform: Platform, file: &FileSpec, project: &str, description: &str) -> String {
        skeleton(&self.template(platform), file, project, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_overrides_file_list() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("html");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("template.yaml"),
            "files:\n  - path: index.html\n    description: Landing page\n  - path: about.html\n\
commands:\n  install: npm install\n",
        )
        .unwrap();

        let library = TemplateLibrary::load(temp.path());
        let plan: Vec<String> = library.file_plan(Platform::Html).into_iter().map(|f| f.path).collect();
        assert_eq!(plan, vec!["index.html", "about.html"]);
        assert_eq!(library.commands(Platform::Html).install.as_deref(), Some("npm install"));
        // Other platforms keep their built-ins.
        assert_eq!(library.file_plan(Platform::Flutter), builtin(Platform::Flutter).file_plan());
    }

    #[test]
    fn test_broken_manifest_is_skipped() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("vue");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("template.yaml"), "files: [unclosed\n").unwrap();

        let library = TemplateLibrary::load(temp.path());
        assert_eq!(library.template(Platform::Vue), builtin(Platform::Vue));
    }
}
