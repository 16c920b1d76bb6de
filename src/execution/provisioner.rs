//! Provisioning entry point
//!
//! Wires a [`ProvisionConfig`] to the planner, the process launcher and the
//! progress sinks, and starts the pipeline on the current tokio runtime.

use crate::core::config::ProvisionConfig;
use crate::core::{
    Command, CommandPlanner, Environment, InterpreterLocator, PackageSpec, PathResolver,
    ProvisionError,
};
use crate::execution::bootstrap::{BootstrapRepair, HttpScriptFetcher, ScriptFetcher};
use crate::execution::executor::{PipelineExecutor, PipelineHandle};
use crate::execution::launcher::{ProcessLauncher, TokioProcessLauncher};
use crate::execution::progress::{LogMessageSink, MessageSink, ProgressReporter, ProgressSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Provisions one environment described by a [`ProvisionConfig`]
pub struct Provisioner {
    config: ProvisionConfig,
    resolver: PathResolver,
    locator: InterpreterLocator,
    launcher: Arc<dyn ProcessLauncher>,
    fetcher: Arc<dyn ScriptFetcher>,
    messages: Arc<dyn MessageSink>,
}

impl Provisioner {
    pub fn new(config: ProvisionConfig) -> Self {
        let locator = InterpreterLocator::default().with_configured(config.interpreter.clone());
        Self {
            config,
            resolver: PathResolver::default(),
            locator,
            launcher: Arc::new(TokioProcessLauncher),
            fetcher: Arc::new(HttpScriptFetcher),
            messages: Arc::new(LogMessageSink),
        }
    }

    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the interpreter locator. The configured interpreter is not
    /// carried over.
    pub fn with_locator(mut self, locator: InterpreterLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ScriptFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_message_sink(mut self, messages: Arc<dyn MessageSink>) -> Self {
        self.messages = messages;
        self
    }

    /// Current on-disk view of the target environment
    pub fn environment(&self) -> Environment {
        self.resolver
            .resolve(&self.config.resolved_base_dir(), &self.config.name)
    }

    /// Reject manifests whose name would resolve outside `base_dir`
    pub fn validate(&self) -> Result<(), ProvisionError> {
        self.config
            .validate()
            .map_err(|e| ProvisionError::Config(format!("{:#}", e)))
    }

    /// Commands that would run right now, without running anything
    pub fn plan(&self) -> Result<Vec<Command>, ProvisionError> {
        self.validate()?;
        let environment = self.environment();
        CommandPlanner::new(self.locator.clone()).plan(&environment, &self.config.packages)
    }

    /// Start provisioning without blocking the caller.
    ///
    /// Must be called from within a tokio runtime. `on_done` runs on the
    /// pipeline task exactly once unless the pipeline is cancelled.
    pub fn start<F>(&self, progress: Arc<dyn ProgressSink>, on_done: F) -> PipelineHandle
    where
        F: FnOnce(bool, PathBuf, String) + Send + 'static,
    {
        let base_dir = self.config.resolved_base_dir();
        let environment = self.resolver.resolve(&base_dir, &self.config.name);

        let planned = self.validate().and_then(|()| {
            CommandPlanner::new(self.locator.clone()).plan(&environment, &self.config.packages)
        });
        let (commands, preflight) = match planned {
            Ok(commands) => (commands, None),
            Err(e) => {
                warn!("Planning failed for {:?}: {}", environment.root_path, e);
                (Vec::new(), Some(e))
            }
        };
        debug!("Planned commands: {:?}", commands);

        let reporter = ProgressReporter::new(progress, commands.len(), self.config.progress);
        let repair = BootstrapRepair::new(self.fetcher.clone(), self.config.bootstrap_url.clone());

        let mut executor = PipelineExecutor::new(
            environment,
            base_dir,
            self.config.name.clone(),
            commands,
            self.launcher.clone(),
            repair,
            reporter,
            self.messages.clone(),
        )
        .with_resolver(self.resolver)
        .with_packages(self.config.packages.clone())
        .on_done(Box::new(on_done));

        if let Some(error) = preflight {
            executor = executor.with_preflight_error(error);
        }

        executor.start()
    }
}

/// Provision `base_dir/env_name` with `packages` using the default stack.
///
/// Returns immediately; progress goes to `on_progress` and the outcome to
/// `on_done`.
pub fn start_provisioning<F>(
    base_dir: impl Into<PathBuf>,
    env_name: impl Into<String>,
    packages: Vec<PackageSpec>,
    on_progress: Arc<dyn ProgressSink>,
    on_done: F,
) -> PipelineHandle
where
    F: FnOnce(bool, PathBuf, String) + Send + 'static,
{
    let mut config = ProvisionConfig::new(env_name);
    config.base_dir = Some(base_dir.into());
    config.packages = packages;
    Provisioner::new(config).start(on_progress, on_done)
}
