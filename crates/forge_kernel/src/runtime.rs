//! Per-session runtime container.
//!
//! Everything the orchestrator talks to (bus, model router, templates,
//! tool runner, state store, recovery) is created once here and passed by
//! reference. There are no process-wide singletons in the kernel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use forge_core::{EventBus, ForgeConfig, InstantPacer, JitteredPacer, Pacer};
use forge_llm::{ModelRouter, ProviderRegistry, TelemetrySink};
use forge_pipeline::{FileWriter, LiveGenerator, ModelSettings, ProjectPlanner, RecoveryEngine};
use forge_runner::{ShellRunner, ToolRunner};
use forge_store::{open_store, StateStore};
use forge_templates::TemplateLibrary;
use tracing::info;

use crate::error::KernelResult;

/// Services shared by one orchestrator session.
pub struct Runtime {
    config: ForgeConfig,
    bus: EventBus,
    router: ModelRouter,
    templates: TemplateLibrary,
    runner: Arc<dyn ToolRunner>,
    store: Arc<dyn StateStore>,
    recovery: Arc<RecoveryEngine>,
    pacer: Arc<dyn Pacer>,
}

impl Runtime {
    pub fn builder(config: ForgeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    pub fn runner(&self) -> Arc<dyn ToolRunner> {
        Arc::clone(&self.runner)
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn recovery(&self) -> &Arc<RecoveryEngine> {
        &self.recovery
    }

    /// Directory a project is generated into.
    pub fn project_path(&self, project: &str) -> PathBuf {
        self.config.project_root.join(project)
    }

    /// Model settings from the config, with an optional per-turn model.
    pub fn model_settings(&self, model_hint: Option<&str>) -> ModelSettings {
        let mut settings = ModelSettings::from_config(&self.config);
        if let Some(model) = model_hint.filter(|m| !m.trim().is_empty()) {
            settings.model = Some(model.trim().to_string());
        }
        settings
    }

    pub fn planner(&self, settings: ModelSettings) -> ProjectPlanner {
        ProjectPlanner::new(self.router.clone(), self.templates.clone(), self.bus.clone()).with_settings(settings)
    }

    /// A live generator writing under `project_path`.
    pub fn generator(&self, project_path: &Path, settings: ModelSettings) -> LiveGenerator {
        let writer = FileWriter::new(project_path, self.bus.clone());
        LiveGenerator::new(
            self.router.clone(),
            self.templates.clone(),
            self.bus.clone(),
            writer,
            Arc::clone(&self.recovery),
        )
        .with_pacer(Arc::clone(&self.pacer))
        .with_settings(settings)
    }
}

/// Builds a [`Runtime`]; every service can be swapped before `build`.
pub struct RuntimeBuilder {
    config: ForgeConfig,
    bus: Option<EventBus>,
    router: Option<ModelRouter>,
    templates: Option<TemplateLibrary>,
    runner: Option<Arc<dyn ToolRunner>>,
    store: Option<Arc<dyn StateStore>>,
    pacer: Option<Arc<dyn Pacer>>,
}

impl RuntimeBuilder {
    pub fn new(config: ForgeConfig) -> Self {
        Self {
            config,
            bus: None,
            router: None,
            templates: None,
            runner: None,
            store: None,
            pacer: None,
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_router(mut self, router: ModelRouter) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_templates(mut self, templates: TemplateLibrary) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    /// Fill in defaults: providers from the environment, the shell runner,
    /// the configured store and jittered pacing.
    pub fn build(self) -> KernelResult<Runtime> {
        let config = self.config;
        let bus = self.bus.unwrap_or_else(|| EventBus::with_options(config.bus_options()));
        let router = self
            .router
            .unwrap_or_else(|| ModelRouter::new(ProviderRegistry::from_env()).with_telemetry(TelemetrySink::new()));
        let templates = self.templates.unwrap_or_else(|| match &config.templates_dir {
            Some(dir) => TemplateLibrary::load(dir),
            None => TemplateLibrary::builtin(),
        });
        let runner = self.runner.unwrap_or_else(|| Arc::new(ShellRunner::new()));
        let store = match self.store {
            Some(store) => store,
            None => open_store(&config)?,
        };
        let pacer = self.pacer.unwrap_or_else(|| -> Arc<dyn Pacer> {
            if config.typing_speed == 0.0 {
                Arc::new(InstantPacer)
            } else {
                Arc::new(JitteredPacer::new(config.typing_speed))
            }
        });
        let recovery = Arc::new(RecoveryEngine::new(
            bus.clone(),
            config.snapshot_capacity,
            config.max_retries,
        ));

        info!(
            "Runtime ready (store={:?}, online={}, security={})",
            store.backend(),
            router.is_online(),
            config.security_level
        );
        Ok(Runtime {
            config,
            bus,
            router,
            templates,
            runner,
            store,
            recovery,
            pacer,
        })
    }
}
