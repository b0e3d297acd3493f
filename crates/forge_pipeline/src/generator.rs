//! Live generator.
//!
//! Per file: announce, open in the editor, generate, stream characters,
//! write atomically, validate and repair. Events for one file always follow
//! `file_announced`, `code_streaming_started`, `code_character_written`*,
//! `code_streaming_complete`, `file_created`.
//!
//! A repair restarts that lifecycle for the same path after `file_created`:
//! `file_opened_in_editor`, a fresh stream, then `file_modified`. A file is
//! only final once its last `file_created` or `file_modified` is seen.

use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{CancellationToken, ErrorRecord, Event, EventBus, EventType, InstantPacer, Pacer, Platform};
use forge_llm::{ChatMessage, ChunkStream, LlmError, LlmResult, ModelRouter, TaskType};
use futures::StreamExt;
use forge_templates::{fence_language, file_prompt, fix_prompt, FileContext, FileSpec, Prompt, TemplateLibrary};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::codeblock::extract_for_path;
use crate::error::{PipelineError, PipelineResult};
use crate::planner::GenerationPlan;
use crate::recovery::{FileFixer, RecoveryEngine};
use crate::settings::ModelSettings;
use crate::streamer::CodeStreamer;
use crate::validator::SyntaxValidator;
use crate::writer::{FileWriter, WriteOutcome};

/// Result of generating one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub outcome: WriteOutcome,
    pub chars: usize,
    /// Validation failed at first and a fix made it pass.
    pub repaired: bool,
}

/// Runs the per-file generation pipeline.
#[derive(Clone)]
pub struct LiveGenerator {
    router: ModelRouter,
    templates: TemplateLibrary,
    settings: ModelSettings,
    bus: EventBus,
    writer: FileWriter,
    streamer: CodeStreamer,
    validator: SyntaxValidator,
    recovery: Arc<RecoveryEngine>,
}

impl LiveGenerator {
    pub fn new(
        router: ModelRouter,
        templates: TemplateLibrary,
        bus: EventBus,
        writer: FileWriter,
        recovery: Arc<RecoveryEngine>,
    ) -> Self {
        let streamer = CodeStreamer::new(bus.clone(), Arc::new(InstantPacer));
        Self {
            router,
            templates,
            settings: ModelSettings::default(),
            bus,
            writer,
            streamer,
            validator: SyntaxValidator::new(),
            recovery,
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.streamer = CodeStreamer::new(self.bus.clone(), pacer);
        self
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn writer(&self) -> &FileWriter {
        &self.writer
    }

    /// Generate file `index` of `plan`.
    pub async fn generate(
        &self,
        plan: &GenerationPlan,
        index: usize,
        cancel: &CancellationToken,
    ) -> PipelineResult<GeneratedFile> {
        let file = plan
            .files
            .get(index)
            .ok_or_else(|| PipelineError::Plan(format!("no file at step {}", index + 1)))?;
        let path = file.path.as_str();
        let total = plan.files.len();

        self.bus.emit(
            Event::new(EventType::FileAnnounced, format!("Creating {}", path)).with_data(json!({
                "path": path,
                "type": file.file_type,
                "role": file.role().as_str(),
                "description": file.description,
                "step": index + 1,
                "total": total,
            })),
        );

        // Resolve first so an unsafe path fails before any streaming.
        self.writer.resolve(path)?;
        if self.writer.should_preserve(path) {
            let outcome = self.writer.preserve(path);
            return Ok(GeneratedFile {
                path: path.to_string(),
                outcome,
                chars: 0,
                repaired: false,
            });
        }

        self.open_in_editor(path);
        let content = self.content_for(plan, file, cancel).await?;

        let streamed = self.streamer.stream(path, &content, cancel).await;
        if streamed.cancelled {
            return Err(PipelineError::Cancelled);
        }

        let outcome = self.writer.write(path, &content)?;
        let lines = content.lines().count();
        self.bus.emit(
            Event::new(EventType::FileCreated, format!("Created {}", path)).with_data(json!({
                "path": path,
                "type": file.file_type,
                "chars": streamed.total,
                "lines": lines,
                "replaced": outcome == WriteOutcome::Replaced,
            })),
        );
        info!("Generated {} ({} lines)", path, lines);

        let records = self.validator.validate(path, &content);
        let repaired = if records.is_empty() {
            false
        } else {
            self.repair(plan.platform, path, records, cancel).await?;
            true
        };

        Ok(GeneratedFile {
            path: path.to_string(),
            outcome,
            chars: streamed.total,
            repaired,
        })
    }

    /// Report validation errors and run the bounded fix loop. Errors that
    /// survive every attempt fail the file.
    async fn repair(
        &self,
        platform: Platform,
        path: &str,
        records: Vec<ErrorRecord>,
        cancel: &CancellationToken,
    ) -> PipelineResult<()> {
        self.recovery.report(&records);
        let fixer = self.fixer(platform);
        if self.recovery.repair_file(&fixer, path, records, cancel).await? {
            return Ok(());
        }
        let content = self.writer.read(path)?;
        Err(PipelineError::Validation {
            path: path.to_string(),
            records: self.validator.validate(path, &content),
        })
    }

    /// A [`FileFixer`] regenerating files of `platform`.
    pub fn fixer(&self, platform: Platform) -> PlatformFixer<'_> {
        PlatformFixer {
            generator: self,
            platform,
        }
    }

    /// Rewrite `path` with an error-aware prompt, stream the rewrite and
    /// return what validation still finds.
    pub async fn regenerate(
        &self,
        platform: Platform,
        path: &str,
        errors: &[ErrorRecord],
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<ErrorRecord>> {
        let current = self.writer.read(path).unwrap_or_default();
        let content = match self.ask_fix(platform, path, &current, errors, cancel).await {
            Ok(content) if !content.trim().is_empty() => content,
            Ok(_) => self.skeleton_for(platform, path, "model returned an empty fix"),
            Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(e) => self.skeleton_for(platform, path, &e.to_string()),
        };

        self.open_in_editor(path);
        let streamed = self.streamer.stream(path, &content, cancel).await;
        if streamed.cancelled {
            return Err(PipelineError::Cancelled);
        }
        self.writer.rewrite(path, &content)?;
        self.bus.emit(
            Event::new(EventType::FileModified, format!("Updated {}", path))
                .with_data(json!({ "path": path, "chars": streamed.total })),
        );
        Ok(self.validator.validate(path, &content))
    }

    fn open_in_editor(&self, path: &str) {
        self.bus.emit(
            Event::new(EventType::FileOpenedInEditor, format!("Opened {}", path)).with_data(json!({
                "path": path,
                "language": fence_language(path),
                "typing": true,
            })),
        );
    }

    /// Model content for a file, or template skeleton content when the
    /// model is offline or fails.
    async fn content_for(
        &self,
        plan: &GenerationPlan,
        file: &FileSpec,
        cancel: &CancellationToken,
    ) -> PipelineResult<String> {
        if !self.router.is_online() {
            return Ok(self.templates.skeleton(plan.platform, file, &plan.project_name, &plan.description));
        }
        let prompt = file_prompt(&FileContext {
            platform: plan.platform,
            project: &plan.project_name,
            description: &plan.description,
            file,
            plan: &plan.files,
        })?;
        match self.ask(TaskType::CodeGeneration, &prompt, &file.path, cancel).await {
            Ok(content) if !content.trim().is_empty() => Ok(content),
            Ok(_) => {
                self.note_skeleton(&file.path, "model returned no content");
                Ok(self.templates.skeleton(plan.platform, file, &plan.project_name, &plan.description))
            }
            Err(PipelineError::Cancelled) => Err(PipelineError::Cancelled),
            Err(e) => {
                self.note_skeleton(&file.path, &e.to_string());
                Ok(self.templates.skeleton(plan.platform, file, &plan.project_name, &plan.description))
            }
        }
    }

    async fn ask_fix(
        &self,
        platform: Platform,
        path: &str,
        current: &str,
        errors: &[ErrorRecord],
        cancel: &CancellationToken,
    ) -> PipelineResult<String> {
        if !self.router.is_online() {
            return Err(PipelineError::Llm(LlmError::NoCandidate("offline".into())));
        }
        let prompt = fix_prompt(platform, path, current, errors)?;
        self.ask(TaskType::Fixing, &prompt, path, cancel).await
    }

    /// Stream a reply for `prompt` and keep the code block for `path`.
    async fn ask(
        &self,
        task: TaskType,
        prompt: &Prompt,
        path: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<String> {
        let decision = self.router.decide(task, &self.settings.request(true))?;
        debug!("Generating {} with {}", path, decision.selected);
        let messages = [
            ChatMessage::system(prompt.system.clone()),
            ChatMessage::user(prompt.user.clone()),
        ];
        let reply = match self.router.stream_with_fallback(&decision, &messages, cancel).await {
            Ok(stream) => read_reply(stream, cancel).await,
            Err(e) => Err(e),
        };
        match reply {
            Ok(reply) => Ok(extract_for_path(&reply, path).content),
            Err(LlmError::Cancelled) => Err(PipelineError::Cancelled),
            Err(e) => Err(e.into()),
        }
    }

    fn skeleton_for(&self, platform: Platform, path: &str, reason: &str) -> String {
        self.note_skeleton(path, reason);
        self.templates.skeleton(platform, &FileSpec::new(path, ""), "app", "")
    }

    fn note_skeleton(&self, path: &str, reason: &str) {
        warn!("Using template content for {}: {}", path, reason);
        self.bus.emit(
            Event::new(EventType::ThoughtInternal, format!("Using template content for {}", path))
                .internal()
                .with_data(json!({ "path": path, "reason": reason })),
        );
    }
}

/// Drain a model stream, checking `cancel` before every chunk.
async fn read_reply(mut stream: ChunkStream, cancel: &CancellationToken) -> LlmResult<String> {
    let mut text = String::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            next = stream.next() => next,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk?;
        if let Some(delta) = &chunk.delta {
            text.push_str(delta);
        }
        if chunk.done {
            if let Some(full) = chunk.content_so_far {
                if full.len() >= text.len() {
                    text = full;
                }
            }
            break;
        }
    }
    Ok(text)
}

/// [`FileFixer`] bound to one platform.
pub struct PlatformFixer<'a> {
    generator: &'a LiveGenerator,
    platform: Platform,
}

#[async_trait]
impl<'a> FileFixer for PlatformFixer<'a> {
    async fn fix_once(
        &self,
        path: &str,
        errors: &[ErrorRecord],
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<ErrorRecord>> {
        self.generator.regenerate(self.platform, path, errors, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlanSource;
    use crate::writer::PRESERVE_THRESHOLD;
    use forge_llm::{ProviderRegistry, ScriptedProvider};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        bus: EventBus,
        generator: LiveGenerator,
    }

    fn fixture(provider: Option<ScriptedProvider>) -> Fixture {
        let temp = TempDir::new().unwrap();
        let bus = EventBus::new();
        let registry = match provider {
            Some(p) => ProviderRegistry::scripted(Arc::new(p)),
            None => ProviderRegistry::with_default_catalog(),
        };
        let writer = FileWriter::new(temp.path().join("app"), bus.clone());
        let recovery = Arc::new(RecoveryEngine::new(bus.clone(), 50, 3));
        let generator = LiveGenerator::new(
            ModelRouter::new(registry),
            TemplateLibrary::builtin(),
            bus.clone(),
            writer,
            recovery,
        );
        Fixture {
            _temp: temp,
            bus,
            generator,
        }
    }

    fn plan(platform: Platform, paths: &[&str]) -> GenerationPlan {
        let files: Vec<FileSpec> = paths.iter().map(|p| FileSpec::new(*p, "")).collect();
        GenerationPlan {
            platform,
            project_name: "todo".into(),
            description: "a todo app".into(),
            features: Vec::new(),
            missing: files.clone(),
            files,
            source: PlanSource::Fallback,
        }
    }

    fn lifecycle(bus: &EventBus, path: &str) -> Vec<EventType> {
        let mut seen: Vec<EventType> = bus
            .history()
            .iter()
            .filter(|e| e.path() == Some(path) && e.event_type != EventType::CodeChunkWritten)
            .map(|e| e.event_type)
            .collect();
        seen.dedup();
        seen
    }

    #[tokio::test]
    async fn test_offline_file_lifecycle() {
        let f = fixture(None);
        let plan = plan(Platform::Flutter, &["pubspec.yaml", "lib/main.dart"]);
        let result = f.generator.generate(&plan, 1, &CancellationToken::new()).await.unwrap();
        assert_eq!(result.outcome, WriteOutcome::Created);
        assert!(!result.repaired);

        assert_eq!(
            lifecycle(&f.bus, "lib/main.dart"),
            vec![
                EventType::FileAnnounced,
                EventType::FileOpenedInEditor,
                EventType::CodeStreamingStarted,
                EventType::CodeCharacterWritten,
                EventType::CodeStreamingComplete,
                EventType::FileCreated,
            ]
        );
        let announced = f.bus.events_of(EventType::FileAnnounced);
        assert_eq!(announced[0].data["step"], 2);
        assert_eq!(announced[0].data["total"], 2);
    }

    #[tokio::test]
    async fn test_model_reply_outside_fence_is_discarded() {
        let reply = "Sure!\n```python main.py\nprint('hello')\n```\nHope this helps.";
        let f = fixture(Some(ScriptedProvider::with_reply(reply)));
        let plan = plan(Platform::Python, &["main.py"]);
        f.generator.generate(&plan, 0, &CancellationToken::new()).await.unwrap();
        assert_eq!(f.generator.writer().read("main.py").unwrap(), "print('hello')\n");
    }

    #[tokio::test]
    async fn test_long_existing_file_is_preserved() {
        let f = fixture(None);
        let user_work = format!("// mine\n{}", "x".repeat(PRESERVE_THRESHOLD));
        f.generator.writer().rewrite("lib/main.dart", &user_work).unwrap();

        let plan = plan(Platform::Flutter, &["lib/main.dart"]);
        let result = f.generator.generate(&plan, 0, &CancellationToken::new()).await.unwrap();
        assert_eq!(result.outcome, WriteOutcome::Preserved);
        assert!(f.bus.events_of(EventType::CodeStreamingStarted).is_empty());
        assert!(f.bus.events_of(EventType::FileCreated).is_empty());
        assert_eq!(f.generator.writer().read("lib/main.dart").unwrap(), user_work);
    }

    #[tokio::test]
    async fn test_invalid_output_is_repaired() {
        // First answer is broken, the fix is valid.
        let provider = ScriptedProvider::new(|req| {
            if req.system().contains("fixing") {
                "```python main.py\nprint('fixed')\n```".to_string()
            } else {
                "```python main.py\nprint('broken'\n```".to_string()
            }
        });
        let f = fixture(Some(provider));
        let plan = plan(Platform::Python, &["main.py"]);
        let result = f.generator.generate(&plan, 0, &CancellationToken::new()).await.unwrap();

        assert!(result.repaired);
        assert_eq!(f.generator.writer().read("main.py").unwrap(), "print('fixed')\n");
        assert!(!f.bus.events_of(EventType::ErrorDetected).is_empty());
        assert_eq!(f.bus.events_of(EventType::ErrorFixStarted).len(), 1);
        assert_eq!(f.bus.events_of(EventType::ErrorFixed).len(), 1);
        assert_eq!(f.bus.events_of(EventType::FileModified).len(), 1);
    }

    #[tokio::test]
    async fn test_repair_restarts_lifecycle_after_created() {
        let provider = ScriptedProvider::new(|req| {
            if req.system().contains("fixing") {
                "```python main.py\nprint('fixed')\n```".to_string()
            } else {
                "```python main.py\nprint('broken'\n```".to_string()
            }
        });
        let f = fixture(Some(provider));
        let plan = plan(Platform::Python, &["main.py"]);
        f.generator.generate(&plan, 0, &CancellationToken::new()).await.unwrap();

        let file_events = [
            EventType::FileAnnounced,
            EventType::FileOpenedInEditor,
            EventType::CodeStreamingStarted,
            EventType::CodeCharacterWritten,
            EventType::CodeStreamingComplete,
            EventType::FileCreated,
            EventType::FileModified,
        ];
        let mut seen: Vec<EventType> = lifecycle(&f.bus, "main.py")
            .into_iter()
            .filter(|t| file_events.contains(t))
            .collect();
        seen.dedup();
        assert_eq!(
            seen,
            vec![
                EventType::FileAnnounced,
                EventType::FileOpenedInEditor,
                EventType::CodeStreamingStarted,
                EventType::CodeCharacterWritten,
                EventType::CodeStreamingComplete,
                EventType::FileCreated,
                EventType::FileOpenedInEditor,
                EventType::CodeStreamingStarted,
                EventType::CodeCharacterWritten,
                EventType::CodeStreamingComplete,
                EventType::FileModified,
            ]
        );
    }

    #[tokio::test]
    async fn test_unfixable_output_fails_with_records() {
        let f = fixture(Some(ScriptedProvider::with_reply("```python main.py\ndef f(:\n```")));
        let plan = plan(Platform::Python, &["main.py"]);
        let err = f.generator.generate(&plan, 0, &CancellationToken::new()).await.unwrap_err();
        match err {
            PipelineError::Validation { path, records } => {
                assert_eq!(path, "main.py");
                assert!(!records.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(f.bus.events_of(EventType::ErrorFixStarted).len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_slow_model_stream() {
        let reply = format!("```python main.py\n{}\n```", "print('x')\n".repeat(40));
        let provider = ScriptedProvider::with_reply(reply)
            .with_chunk_size(4)
            .with_chunk_delay(std::time::Duration::from_millis(50));
        let f = fixture(Some(provider));
        let plan = plan(Platform::Python, &["main.py"]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(120)).await;
            trigger.cancel();
        });

        // The full reply would take several seconds to drain.
        let err = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            f.generator.generate(&plan, 0, &cancel),
        )
        .await
        .expect("generation should stop once cancelled")
        .unwrap_err();
        assert!(err.is_cancelled());
        assert!(f.bus.events_of(EventType::CodeStreamingStarted).is_empty());
        assert!(f.bus.events_of(EventType::FileCreated).is_empty());
        assert!(!f.generator.writer().exists("main.py"));
    }

    #[tokio::test]
    async fn test_cancelled_before_streaming() {
        let f = fixture(None);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let plan = plan(Platform::Flutter, &["lib/main.dart"]);
        let err = f.generator.generate(&plan, 0, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(f.bus.events_of(EventType::FileCreated).is_empty());
        let complete = f.bus.events_of(EventType::CodeStreamingComplete);
        assert_eq!(complete.len(), 1);
        assert!(complete[0].flag("cancelled"));
    }
}
