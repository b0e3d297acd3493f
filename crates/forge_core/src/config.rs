//! Configuration.
//!
//! `ForgeConfig` is read from `<project_root>/.forge/config.toml` when it
//! exists, then overridden by `FORGE_*` environment variables. Command-line
//! flags are applied last by the binary.
//!
//! `RuntimeConfig` is the per-session record persisted with the state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::events::BusOptions;
use crate::snapshot::MIN_SNAPSHOTS;

/// Directory holding config and sessions, relative to the project root.
pub const FORGE_DIR: &str = ".forge";
pub const CONFIG_FILE: &str = "config.toml";

/// Which commands the terminal and git modes may run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Any command.
    Permissive,
    /// Anything except known destructive commands.
    Standard,
    /// Only the package/build tool allow-list.
    Strict,
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::Standard
    }
}

impl SecurityLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "permissive" => Some(Self::Permissive),
            "standard" => Some(Self::Standard),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Standard => "standard",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much the kernel may do without a human.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Arbitrated fixes run unless the decision itself asks for approval.
    Autonomous,
    /// Every arbitrated fix waits for approval.
    Supervised,
}

impl Default for ControlMode {
    fn default() -> Self {
        Self::Autonomous
    }
}

/// State store backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Json,
    Sqlite,
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::Json
    }
}

impl StoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "sqlite" | "sql" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

/// Which post-generation steps run as graph nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PostSteps {
    pub install: bool,
    pub build: bool,
    pub preview: bool,
    pub commit: bool,
}

impl Default for PostSteps {
    fn default() -> Self {
        Self {
            install: true,
            build: true,
            preview: false,
            commit: false,
        }
    }
}

impl PostSteps {
    pub fn none() -> Self {
        Self {
            install: false,
            build: false,
            preview: false,
            commit: false,
        }
    }
}

/// Settings for one orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForgeConfig {
    /// Root the generated project is written under.
    pub project_root: PathBuf,
    /// Divides every pacing delay; 0 disables pacing entirely.
    pub typing_speed: f64,
    pub deterministic: bool,
    /// Fix attempts per file.
    pub max_retries: u32,
    pub snapshot_capacity: usize,
    /// Events persisted with the state.
    pub events_tail: usize,
    pub subscriber_capacity: usize,
    pub stall_timeout_ms: u64,
    pub tool_timeout_secs: u64,
    /// Highest model cost tier the router may pick (`low`, `medium`, `high`).
    pub cost_tier: String,
    pub latency_budget_ms: u64,
    /// Preferred model, tried before the task priority list.
    pub model: Option<String>,
    pub store: StoreBackend,
    pub security_level: SecurityLevel,
    pub control_mode: ControlMode,
    /// Directory with `<platform>/template.yaml` manifests.
    pub templates_dir: Option<PathBuf>,
    pub post_steps: PostSteps,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            typing_speed: 1.0,
            deterministic: false,
            max_retries: 3,
            snapshot_capacity: MIN_SNAPSHOTS,
            events_tail: 200,
            subscriber_capacity: 1024,
            stall_timeout_ms: 2000,
            tool_timeout_secs: 300,
            cost_tier: "high".to_string(),
            latency_budget_ms: 60_000,
            model: None,
            store: StoreBackend::Json,
            post_steps: PostSteps::default(),
            security_level: SecurityLevel::Standard,
            control_mode: ControlMode::Autonomous,
            templates_dir: None,
        }
    }
}

impl ForgeConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Load the config file (if any) for `project_root`, then apply the
    /// environment.
    pub fn load(project_root: &Path) -> CoreResult<Self> {
        let mut config = Self::from_file(project_root)?;
        config.apply_env();
        Ok(config)
    }

    /// Read `<project_root>/.forge/config.toml`, or defaults when absent.
    pub fn from_file(project_root: &Path) -> CoreResult<Self> {
        let path = Self::config_path(project_root);
        let mut config = if path.exists() {
            debug!("Loading config from {}", path.display());
            let text = std::fs::read_to_string(&path)?;
            toml::from_str::<Self>(&text)
                .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.project_root = project_root.to_path_buf();
        config.normalize();
        Ok(config)
    }

    pub fn config_path(project_root: &Path) -> PathBuf {
        project_root.join(FORGE_DIR).join(CONFIG_FILE)
    }

    /// Apply `FORGE_*` variables from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable source.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FORGE_TYPING_SPEED") {
            match v.parse::<f64>() {
                Ok(speed) => self.typing_speed = speed,
                Err(_) => warn!("Ignoring invalid FORGE_TYPING_SPEED: {}", v),
            }
        }
        if let Some(v) = lookup("FORGE_DETERMINISTIC") {
            self.deterministic = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = lookup("FORGE_MAX_RETRIES") {
            match v.parse::<u32>() {
                Ok(n) => self.max_retries = n,
                Err(_) => warn!("Ignoring invalid FORGE_MAX_RETRIES: {}", v),
            }
        }
        if let Some(v) = lookup("FORGE_STORE") {
            match StoreBackend::parse(&v) {
                Some(store) => self.store = store,
                None => warn!("Ignoring invalid FORGE_STORE: {}", v),
            }
        }
        if let Some(v) = lookup("FORGE_MODEL") {
            if !v.trim().is_empty() {
                self.model = Some(v.trim().to_string());
            }
        }
        if let Some(v) = lookup("FORGE_SECURITY_LEVEL") {
            match SecurityLevel::parse(&v) {
                Some(level) => self.security_level = level,
                None => warn!("Ignoring invalid FORGE_SECURITY_LEVEL: {}", v),
            }
        }
        if let Some(v) = lookup("FORGE_TOOL_TIMEOUT_SECS") {
            match v.parse::<u64>() {
                Ok(secs) if secs > 0 => self.tool_timeout_secs = secs,
                _ => warn!("Ignoring invalid FORGE_TOOL_TIMEOUT_SECS: {}", v),
            }
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        if !self.typing_speed.is_finite() || self.typing_speed < 0.0 {
            self.typing_speed = 1.0;
        }
        self.snapshot_capacity = self.snapshot_capacity.max(MIN_SNAPSHOTS);
        self.subscriber_capacity = self.subscriber_capacity.max(1);
    }

    /// Where sessions are persisted.
    pub fn sessions_dir(&self) -> PathBuf {
        self.project_root.join(FORGE_DIR).join("sessions")
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn bus_options(&self) -> BusOptions {
        BusOptions {
            subscriber_capacity: self.subscriber_capacity,
            stall_timeout: Duration::from_millis(self.stall_timeout_ms),
            ..BusOptions::default()
        }
    }

    /// Write the config file for `project_root`.
    pub fn save(&self) -> CoreResult<PathBuf> {
        let path = Self::config_path(&self.project_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))?;
        std::fs::write(&path, text)?;
        Ok(path)
    }
}

/// Per-session runtime record, persisted with the state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    pub security_level: SecurityLevel,
    pub control_mode: ControlMode,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub restart_count: u32,
    pub kernel_version: String,
}

impl RuntimeConfig {
    /// Fresh session with a random id.
    pub fn new(config: &ForgeConfig) -> Self {
        Self::with_session(Uuid::new_v4().to_string(), config)
    }

    pub fn with_session(session_id: impl Into<String>, config: &ForgeConfig) -> Self {
        Self {
            security_level: config.security_level,
            control_mode: config.control_mode,
            session_id: session_id.into(),
            started_at: Utc::now(),
            restart_count: 0,
            kernel_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// The record for a process that resumed this session.
    pub fn restarted(mut self) -> Self {
        self.restart_count += 1;
        self
    }
}
