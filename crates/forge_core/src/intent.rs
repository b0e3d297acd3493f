//! Intent engine: deterministic keyword routing of a user turn.
//!
//! Rules are evaluated top to bottom and never ask the user to
//! disambiguate:
//!
//! 1. While a flow is active every turn is `continue`.
//! 2. Platform keywords select a platform build and a project name.
//! 3. Fix/error keywords select `fix`.
//! 4. Git or terminal keywords select the matching mode.
//! 5. Anything else (including short turns) is `dialog`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Target stack for a generated project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Flutter,
    React,
    Next,
    Vue,
    Angular,
    Python,
    Node,
    Swift,
    Kotlin,
    Html,
}

impl Platform {
    pub fn all() -> &'static [Platform] {
        &[
            Self::Flutter,
            Self::React,
            Self::Next,
            Self::Vue,
            Self::Angular,
            Self::Python,
            Self::Node,
            Self::Swift,
            Self::Kotlin,
            Self::Html,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flutter => "flutter",
            Self::React => "react",
            Self::Next => "next",
            Self::Vue => "vue",
            Self::Angular => "angular",
            Self::Python => "python",
            Self::Node => "node",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Html => "html",
        }
    }

    /// Words in a turn that select this platform.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Flutter => &["flutter", "dart"],
            Self::React => &["react", "reactjs", "react.js"],
            Self::Next => &["next", "nextjs", "next.js"],
            Self::Vue => &["vue", "vuejs", "vue.js", "nuxt"],
            Self::Angular => &["angular"],
            Self::Python => &["python", "django", "flask", "fastapi"],
            Self::Node => &["node", "nodejs", "node.js", "express"],
            Self::Swift => &["swift", "swiftui", "ios"],
            Self::Kotlin => &["kotlin", "android"],
            Self::Html => &["html", "website", "landing"],
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == lower || p.keywords().contains(&lower.as_str()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classified mode of a user turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case", tag = "mode", content = "platform")]
pub enum IntentMode {
    Dialog,
    Platform(Platform),
    Fix,
    Git,
    Terminal,
    Continue,
}

impl IntentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dialog => "dialog",
            Self::Platform(_) => "platform",
            Self::Fix => "fix",
            Self::Git => "git",
            Self::Terminal => "terminal",
            Self::Continue => "continue",
        }
    }

    pub fn platform(&self) -> Option<Platform> {
        match self {
            Self::Platform(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for IntentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Platform(p) => write!(f, "platform({})", p),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Result of classifying a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Intent {
    pub mode: IntentMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl Intent {
    pub fn new(mode: IntentMode) -> Self {
        Self { mode, project: None }
    }
}

const FIX_KEYWORDS: &[&str] = &[
    "fix", "error", "errors", "bug", "bugs", "broken", "crash", "crashes", "failing", "fails",
    "failed", "exception", "debug", "repair",
];

const GIT_KEYWORDS: &[&str] = &[
    "git", "commit", "push", "pull", "branch", "merge", "clone", "checkout", "rebase",
];

const TERMINAL_KEYWORDS: &[&str] = &[
    "run", "terminal", "shell", "execute", "install", "npm", "pip", "yarn", "pnpm", "cargo",
    "command",
];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "create", "build", "make", "generate", "new", "me", "for", "with", "using",
    "please", "i", "want", "need", "to", "of", "and", "in", "on", "my", "simple", "basic", "can",
    "you", "would", "like", "some", "that", "this", "write", "start", "project",
];

/// Maximum tokens joined into a project name.
const PROJECT_NAME_TOKENS: usize = 3;

/// Stateless keyword classifier.
#[derive(Debug, Clone, Default)]
pub struct IntentEngine;

impl IntentEngine {
    pub fn new() -> Self {
        Self
    }

    /// Classify a turn. Identical inputs always produce identical results.
    pub fn classify(&self, turn: &str, flow_active: bool) -> Intent {
        if flow_active {
            return Intent::new(IntentMode::Continue);
        }

        let tokens = tokenize(turn);

        if let Some(platform) = detect_platform(&tokens) {
            return Intent {
                mode: IntentMode::Platform(platform),
                project: project_name(&tokens),
            };
        }

        if contains_any(&tokens, FIX_KEYWORDS) {
            return Intent::new(IntentMode::Fix);
        }
        if contains_any(&tokens, GIT_KEYWORDS) {
            return Intent::new(IntentMode::Git);
        }
        if tokens.len() >= 2 && contains_any(&tokens, TERMINAL_KEYWORDS) {
            return Intent::new(IntentMode::Terminal);
        }

        // Short turns and anything unmatched.
        Intent::new(IntentMode::Dialog)
    }
}

/// Lowercased words; `.` is kept inside a word so `next.js` stays intact.
fn tokenize(turn: &str) -> Vec<String> {
    turn.split(|c: char| !(c.is_alphanumeric() || c == '.' || c == '_' || c == '-'))
        .map(|t| t.trim_matches(|c: char| c == '.' || c == '-' || c == '_').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn contains_any(tokens: &[String], keywords: &[&str]) -> bool {
    tokens.iter().any(|t| keywords.contains(&t.as_str()))
}

fn detect_platform(tokens: &[String]) -> Option<Platform> {
    tokens.iter().find_map(|t| {
        Platform::all()
            .iter()
            .copied()
            .find(|p| p.keywords().contains(&t.as_str()))
    })
}

/// Stopword-filtered tokens, capped, joined with `_`.
fn project_name(tokens: &[String]) -> Option<String> {
    let words: Vec<String> = tokens
        .iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .map(|t| t.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|t| !t.is_empty())
        .take(PROJECT_NAME_TOKENS)
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join("_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_turn_is_dialog() {
        let engine = IntentEngine::new();
        assert_eq!(engine.classify("hello", false).mode, IntentMode::Dialog);
    }

    #[test]
    fn test_flutter_turn_extracts_project() {
        let engine = IntentEngine::new();
        let intent = engine.classify("create flutter todo app", false);
        assert_eq!(intent.mode, IntentMode::Platform(Platform::Flutter));
        assert_eq!(intent.project.as_deref(), Some("flutter_todo_app"));
    }

    #[test]
    fn test_project_name_capped_at_three_tokens() {
        let engine = IntentEngine::new();
        let intent = engine.classify("build a react dashboard with charts and maps", false);
        assert_eq!(intent.mode, IntentMode::Platform(Platform::React));
        assert_eq!(intent.project.as_deref(), Some("react_dashboard_charts"));
    }

    #[test]
    fn test_next_js_keyword() {
        let engine = IntentEngine::new();
        let intent = engine.classify("Make me a Next.js blog", false);
        assert_eq!(intent.mode, IntentMode::Platform(Platform::Next));
    }

    #[test]
    fn test_fix_git_terminal() {
        let engine = IntentEngine::new();
        assert_eq!(engine.classify("please fix the build error in main", false).mode, IntentMode::Fix);
        assert_eq!(engine.classify("commit everything to git now", false).mode, IntentMode::Git);
        assert_eq!(engine.classify("run npm test", false).mode, IntentMode::Terminal);
    }

    #[test]
    fn test_active_flow_is_continue() {
        let engine = IntentEngine::new();
        for turn in ["hello", "create flutter todo app", "fix it", "x"] {
            assert_eq!(engine.classify(turn, true).mode, IntentMode::Continue);
        }
    }

    #[test]
    fn test_classification_is_deterministic() {
        let engine = IntentEngine::new();
        let turn = "generate a vue shop with cart";
        assert_eq!(engine.classify(turn, false), engine.classify(turn, false));
    }

    #[test]
    fn test_long_unmatched_turn_is_dialog() {
        let engine = IntentEngine::new();
        let intent = engine.classify("what do you think about the weather today", false);
        assert_eq!(intent.mode, IntentMode::Dialog);
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!(Platform::from_str("Flutter"), Some(Platform::Flutter));
        assert_eq!(Platform::from_str("nextjs"), Some(Platform::Next));
        assert_eq!(Platform::from_str("cobol"), None);
    }
}
