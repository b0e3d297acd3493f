//! Project planner.
//!
//! Asks the planning model for a JSON list of files and falls back to the
//! platform's default file set when the model is offline, fails or answers
//! with nothing usable.

use std::collections::BTreeSet;
use std::path::Path;

use forge_core::{CancellationToken, Event, EventBus, EventType, Platform};
use forge_llm::{ChatMessage, LlmError, ModelRouter, TaskType};
use forge_templates::{normalize_path, order_by_priority, planning_prompt, FileSpec, TemplateLibrary};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::codeblock::extract_code_block;
use crate::error::{PipelineError, PipelineResult};
use crate::settings::ModelSettings;

/// Directories never scanned for existing project files.
const SCAN_SKIP: &[&str] = &[".forge", ".git", "node_modules", "build", ".dart_tool", "target", "__pycache__"];

/// Where a plan's file list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Model,
    Fallback,
}

/// The ordered list of files to produce for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPlan {
    pub platform: Platform,
    pub project_name: String,
    pub description: String,
    pub features: Vec<String>,
    pub files: Vec<FileSpec>,
    /// Planned files not yet present under the project path.
    pub missing: Vec<FileSpec>,
    pub source: PlanSource,
}

impl GenerationPlan {
    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }

    pub fn is_complete_on_disk(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Two-tier planner: model plan first, template defaults second.
#[derive(Clone)]
pub struct ProjectPlanner {
    router: ModelRouter,
    templates: TemplateLibrary,
    settings: ModelSettings,
    bus: EventBus,
}

impl ProjectPlanner {
    pub fn new(router: ModelRouter, templates: TemplateLibrary, bus: EventBus) -> Self {
        Self {
            router,
            templates,
            settings: ModelSettings::default(),
            bus,
        }
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Plan the files of `project_name`.
    ///
    /// Only cancellation is an error; every other model failure lands on
    /// the fallback plan.
    pub async fn plan(
        &self,
        platform: Platform,
        project_name: &str,
        description: &str,
        features: &[String],
        project_path: &Path,
        cancel: &CancellationToken,
    ) -> PipelineResult<GenerationPlan> {
        info!("Planning {} project {}", platform, project_name);

        let (files, source) = match self.model_plan(platform, project_name, description, features, cancel).await {
            Ok(files) if !files.is_empty() => (files, PlanSource::Model),
            Ok(_) => {
                self.note_fallback("the model returned no usable files");
                (self.templates.file_plan(platform), PlanSource::Fallback)
            }
            Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(e) => {
                self.note_fallback(&e.to_string());
                (self.templates.file_plan(platform), PlanSource::Fallback)
            }
        };

        let missing = missing_files(&files, project_path);
        let plan = GenerationPlan {
            platform,
            project_name: project_name.to_string(),
            description: description.to_string(),
            features: features.to_vec(),
            files,
            missing,
            source,
        };

        self.bus.emit(
            Event::new(
                EventType::Plan,
                format!("Planned {} files for {}", plan.files.len(), plan.project_name),
            )
            .with_data(json!({
                "platform": plan.platform,
                "project": plan.project_name,
                "files": plan.files,
                "missing": plan.missing.iter().map(|f| &f.path).collect::<Vec<_>>(),
                "source": plan.source,
            })),
        );
        Ok(plan)
    }

    async fn model_plan(
        &self,
        platform: Platform,
        project_name: &str,
        description: &str,
        features: &[String],
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<FileSpec>> {
        if !self.router.is_online() {
            return Ok(Vec::new());
        }
        let prompt = planning_prompt(platform, project_name, description, features)?;
        let decision = self.router.decide(TaskType::Planning, &self.settings.request(false))?;
        let messages = [ChatMessage::system(prompt.system), ChatMessage::user(prompt.user)];
        let completion = match self.router.execute_with_fallback(&decision, &messages, cancel).await {
            Ok(completion) => completion,
            Err(LlmError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(e) => return Err(e.into()),
        };
        debug!("Planning reply from {}: {} chars", completion.model, completion.content.len());
        parse_file_list(&completion.content)
    }

    fn note_fallback(&self, reason: &str) {
        warn!("Using default file plan: {}", reason);
        self.bus.emit(
            Event::new(EventType::ThoughtInternal, "Using the default project layout")
                .internal()
                .with("reason", reason),
        );
    }
}

/// Parse a model reply into file specs in priority order.
///
/// Accepts a JSON array of paths or of `{path, description}` objects, bare
/// or inside a fenced block, or an object with a `files` array. Unsafe or
/// duplicate paths are dropped.
pub fn parse_file_list(reply: &str) -> PipelineResult<Vec<FileSpec>> {
    let block = extract_code_block(reply);
    let text = block.content.trim();
    let start = text
        .find(|c| c == '[' || c == '{')
        .ok_or_else(|| PipelineError::Plan("no JSON in planning reply".into()))?;
    // Trailing prose after the JSON is tolerated.
    let end = text
        .rfind(|c| c == ']' || c == '}')
        .filter(|&end| end > start)
        .unwrap_or(text.len() - 1);
    let value: Value = serde_json::from_str(&text[start..=end])
        .map_err(|e| PipelineError::Plan(format!("invalid planning JSON: {}", e)))?;

    let entries = match &value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .get("files")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| PipelineError::Plan("planning reply has no files".into()))?,
        _ => return Err(PipelineError::Plan("planning reply is not a list".into())),
    };

    let files = entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(path) => Some((path.clone(), String::new())),
            Value::Object(obj) => obj.get("path").and_then(Value::as_str).map(|path| {
                let description = obj.get("description").and_then(Value::as_str).unwrap_or_default();
                (path.to_string(), description.to_string())
            }),
            _ => None,
        })
        .filter(|(path, _)| is_safe_path(path))
        .map(|(path, description)| FileSpec::new(path, description))
        .collect();
    Ok(order_by_priority(files))
}

fn is_safe_path(path: &str) -> bool {
    let trimmed = path.trim();
    !trimmed.is_empty()
        && !Path::new(trimmed).is_absolute()
        && !trimmed.contains(':')
        && !normalize_path(trimmed).split('/').any(|part| part == "..")
        && !trimmed.ends_with('/')
}

/// Relative paths of the files under `root`.
pub fn scan_project(root: &Path) -> BTreeSet<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !e.file_type().is_dir() || !SCAN_SKIP.contains(&e.file_name().to_string_lossy().as_ref())
        })
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect()
}

/// Planned files that are not on disk yet.
pub fn missing_files(files: &[FileSpec], root: &Path) -> Vec<FileSpec> {
    let present = scan_project(root);
    files
        .iter()
        .filter(|f| !present.contains(&f.path))
        .cloned()
        .collect()
}
