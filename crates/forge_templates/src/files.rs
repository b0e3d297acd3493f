//! File specs and path classification.

use serde::{Deserialize, Serialize};

/// Coarse file type carried in plans and events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Config,
    Code,
    Asset,
    Test,
    Doc,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Code => "code",
            Self::Asset => "asset",
            Self::Test => "test",
            Self::Doc => "doc",
        }
    }
}

/// Role of a file within the project; decides its generation priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Config,
    Entry,
    Model,
    Service,
    Screen,
    Widget,
    Code,
    Test,
    Doc,
    Asset,
}

impl FileRole {
    /// Lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Config => 1,
            Self::Entry => 2,
            Self::Model => 3,
            Self::Service => 4,
            Self::Screen => 5,
            Self::Widget | Self::Code => 6,
            Self::Test => 7,
            Self::Doc => 8,
            Self::Asset => 9,
        }
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Self::Config => FileType::Config,
            Self::Test => FileType::Test,
            Self::Doc => FileType::Doc,
            Self::Asset => FileType::Asset,
            _ => FileType::Code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Entry => "entry point",
            Self::Model => "data model",
            Self::Service => "service",
            Self::Screen => "screen",
            Self::Widget => "widget",
            Self::Code => "source",
            Self::Test => "test",
            Self::Doc => "documentation",
            Self::Asset => "asset",
        }
    }
}

/// One planned file. Paths are relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSpec {
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub priority: u8,
    #[serde(default)]
    pub description: String,
}

impl FileSpec {
    /// Classify `path` and build its spec.
    pub fn new(path: impl Into<String>, description: impl Into<String>) -> Self {
        let path = normalize_path(&path.into());
        let role = classify_path(&path);
        Self {
            file_type: role.file_type(),
            priority: role.priority(),
            description: description.into(),
            path,
        }
    }

    pub fn role(&self) -> FileRole {
        classify_path(&self.path)
    }

    pub fn extension(&self) -> &str {
        extension_of(&self.path)
    }
}

const CONFIG_FILES: &[&str] = &[
    "pubspec.yaml",
    "package.json",
    "tsconfig.json",
    "angular.json",
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "package.swift",
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle.kts",
    "vite.config.js",
    "vite.config.ts",
    "next.config.js",
    "next.config.mjs",
    "analysis_options.yaml",
    ".gitignore",
    ".env.example",
];

const ENTRY_FILES: &[&str] = &[
    "main.dart",
    "app.dart",
    "main.py",
    "app.py",
    "index.js",
    "index.ts",
    "main.js",
    "main.ts",
    "main.jsx",
    "main.tsx",
    "index.jsx",
    "index.tsx",
    "server.js",
    "app.jsx",
    "app.tsx",
    "app.vue",
    "app.component.ts",
    "layout.tsx",
    "index.html",
    "main.swift",
    "app.swift",
    "main.kt",
];

const ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "ttf", "otf", "woff", "woff2", "mp3", "wav",
];

/// Forward slashes, no leading `./` or `/`.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let path = path.trim_start_matches("./").trim_start_matches('/');
    path.to_string()
}

/// Extension without the dot, lowercased by the caller if needed.
pub fn extension_of(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext,
        _ => "",
    }
}

/// Decide the role of a file from its path.
pub fn classify_path(path: &str) -> FileRole {
    let lower = normalize_path(path).to_lowercase();
    let mut segments: Vec<&str> = lower.split('/').collect();
    let name = segments.pop().unwrap_or("");
    let ext = extension_of(name);

    if CONFIG_FILES.contains(&name) || matches!(ext, "yaml" | "yml" | "toml" | "gradle" | "kts" | "ini" | "cfg") {
        return FileRole::Config;
    }
    if ext == "json" && !segments.contains(&"assets") {
        return FileRole::Config;
    }
    if matches!(ext, "md" | "rst" | "txt") {
        return FileRole::Doc;
    }
    if ASSET_EXTENSIONS.contains(&ext) {
        return FileRole::Asset;
    }
    let in_test_dir = segments
        .iter()
        .any(|s| matches!(*s, "test" | "tests" | "__tests__" | "spec"));
    if in_test_dir
        || name.contains("_test.")
        || name.contains(".test.")
        || name.contains(".spec.")
        || name.starts_with("test_")
    {
        return FileRole::Test;
    }
    if ENTRY_FILES.contains(&name) {
        return FileRole::Entry;
    }

    for segment in segments.iter().rev() {
        match *segment {
            "models" | "model" | "entities" | "types" => return FileRole::Model,
            "services" | "service" | "api" | "providers" | "repositories" | "store" => {
                return FileRole::Service
            }
            "screens" | "pages" | "views" | "routes" => return FileRole::Screen,
            "widgets" | "components" => return FileRole::Widget,
            _ => {}
        }
    }

    let stem = name.split('.').next().unwrap_or(name);
    if stem.contains("model") || stem == "types" {
        FileRole::Model
    } else if stem.contains("service") || stem.contains("store") {
        FileRole::Service
    } else if stem.contains("screen") || stem.contains("page") || stem.contains("view") || stem.contains("route") {
        FileRole::Screen
    } else {
        FileRole::Code
    }
}

/// Info string for a fenced code block holding `path`.
pub fn fence_language(path: &str) -> &'static str {
    match extension_of(path).to_lowercase().as_str() {
        "dart" => "dart",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "jsx",
        "ts" => "typescript",
        "tsx" => "tsx",
        "py" => "python",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "java" => "java",
        "html" => "html",
        "css" => "css",
        "vue" => "vue",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "md" => "markdown",
        _ => "text",
    }
}

/// Sort by priority, keeping the given order within a priority and dropping
/// repeated paths.
pub fn order_by_priority(files: Vec<FileSpec>) -> Vec<FileSpec> {
    let mut seen = std::collections::HashSet::new();
    let mut unique: Vec<FileSpec> = files
        .into_iter()
        .filter(|f| !f.path.is_empty() && seen.insert(f.path.clone()))
        .collect();
    unique.sort_by_key(|f| f.priority);
    unique
}
