//! Template library for AppForge.
//!
//! Provides per-platform default file plans, file classification and
//! priorities, prompt templates, offline skeleton content and post-generation
//! commands. `templates/<platform>/template.yaml` manifests override the
//! built-in definitions.

pub mod error;
pub mod files;
pub mod library;
pub mod manifest;
pub mod platform;
pub mod prompts;
pub mod skeleton;

pub use error::{TemplateError, TemplateResult};
pub use files::{classify_path, extension_of, fence_language, normalize_path, order_by_priority, FileRole, FileSpec, FileType};
pub use library::TemplateLibrary;
pub use manifest::{ManifestCommands, TemplateManifest};
pub use platform::{builtin, commit_command, PlatformTemplate, PostCommands, TemplateFile};
pub use prompts::{
    dialog_system_prompt, file_prompt, fix_prompt, planning_prompt, render, FileContext, Prompt, COMMENTING_POLICY,
};
pub use skeleton::{skeleton, to_kebab_case, to_pascal_case, to_snake_case};
