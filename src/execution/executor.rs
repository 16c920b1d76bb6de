//! Pipeline executor - drives the planned commands one at a time
//!
//! The executor owns the [`PipelineState`] and runs on its own task. Each
//! command is launched only after the previous one terminated with exit code
//! 0, so at most one child process is alive at any time. Environment creation
//! is followed by an installer probe that may bootstrap pip before the next
//! command runs.

use crate::core::{
    output_tail, Command, Environment, PackageSpec, PathResolver, PipelineState, PipelineStatus,
    ProvisionError, OUTPUT_TAIL_LINES,
};
use crate::execution::bootstrap::{BootstrapRepair, RepairOutcome};
use crate::execution::launcher::ProcessLauncher;
use crate::execution::progress::{MessageLevel, MessageSink, ProgressReporter};
use crate::execution::runner::{StepOutcome, StepRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

/// Receives `(success, environment_path, accumulated_output)` exactly once
/// when the pipeline succeeds or fails. Never called for a cancelled run.
pub type CompletionCallback = Box<dyn FnOnce(bool, PathBuf, String) + Send + 'static>;

/// Runs one planned pipeline to a terminal state
pub struct PipelineExecutor {
    state: PipelineState,
    environment: Environment,
    base_dir: PathBuf,
    env_name: String,
    resolver: PathResolver,
    launcher: Arc<dyn ProcessLauncher>,
    repair: BootstrapRepair,
    progress: ProgressReporter,
    messages: Arc<dyn MessageSink>,
    packages: Vec<PackageSpec>,
    on_done: Option<CompletionCallback>,
    preflight_error: Option<ProvisionError>,
}

impl PipelineExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        environment: Environment,
        base_dir: impl Into<PathBuf>,
        env_name: impl Into<String>,
        commands: Vec<Command>,
        launcher: Arc<dyn ProcessLauncher>,
        repair: BootstrapRepair,
        progress: ProgressReporter,
        messages: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            state: PipelineState::new(commands),
            environment,
            base_dir: base_dir.into(),
            env_name: env_name.into(),
            resolver: PathResolver::default(),
            launcher,
            repair,
            progress,
            messages,
            packages: Vec::new(),
            on_done: None,
            preflight_error: None,
        }
    }

    /// Resolver used to refresh the environment after creation
    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Packages named in the success log
    pub fn with_packages(mut self, packages: Vec<PackageSpec>) -> Self {
        self.packages = packages;
        self
    }

    pub fn on_done(mut self, callback: CompletionCallback) -> Self {
        self.on_done = Some(callback);
        self
    }

    /// Fail immediately with `error` instead of running any command.
    ///
    /// Planning errors are reported through the same completion path as
    /// command failures, from the executor task.
    pub fn with_preflight_error(mut self, error: ProvisionError) -> Self {
        self.preflight_error = Some(error);
        self
    }

    /// Spawn the pipeline on the current runtime
    pub fn start(self) -> PipelineHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(PipelineStatus::Pending);
        let environment_path = self.environment.root_path.clone();
        let execution_id = self.state.execution_id;

        info!(
            "Starting provisioning {} for {:?} ({} commands)",
            execution_id,
            environment_path,
            self.state.total_steps()
        );
        let task = tokio::spawn(self.run(cancel_rx, status_tx));

        PipelineHandle {
            cancel: cancel_tx,
            status: status_rx,
            environment_path,
            task,
        }
    }

    async fn run(
        mut self,
        cancel: watch::Receiver<bool>,
        status: watch::Sender<PipelineStatus>,
    ) -> PipelineState {
        let mut runner = StepRunner::new(self.launcher.clone(), cancel);

        self.state.start();
        status.send_replace(self.state.status());

        if runner.is_cancelled() {
            self.cancelled(&status);
            return self.state;
        }

        if let Some(preflight) = self.preflight_error.take() {
            self.state.append_output(&format!("{}\n", preflight));
            self.failed(preflight, &status);
            return self.state;
        }

        let first = self
            .state
            .current_command()
            .map(|c| c.kind().label())
            .unwrap_or_else(|| "Preparing environment".to_string());
        self.progress.show_start(&first);

        while let Some(command) = self.state.current_command().cloned() {
            let step = self.state.current_index();

            match runner.run(&command, &mut self.state).await {
                StepOutcome::Cancelled => {
                    self.cancelled(&status);
                    return self.state;
                }
                StepOutcome::SpawnFailed(_) => {
                    let failure = self.command_failure(step, None);
                    self.failed(failure, &status);
                    return self.state;
                }
                StepOutcome::Completed { exit_code: Some(0) } => {}
                StepOutcome::Completed { exit_code } => {
                    let failure = self.command_failure(step, exit_code);
                    self.failed(failure, &status);
                    return self.state;
                }
            }

            if command.is_environment_creation() {
                self.environment = self.resolver.resolve(&self.base_dir, &self.env_name);
                match self
                    .repair
                    .probe_and_repair(&self.environment, &mut runner, &mut self.state)
                    .await
                {
                    Ok(RepairOutcome::Cancelled) => {
                        self.cancelled(&status);
                        return self.state;
                    }
                    Ok(outcome) => info!("Installer check after creation: {:?}", outcome),
                    Err(e) => {
                        self.state.append_output(&format!("{}\n", e));
                        self.failed(e, &status);
                        return self.state;
                    }
                }
            }

            self.state.advance();
            let next = self.state.current_command().map(|c| c.kind().label());
            self.progress.advance(next.as_deref());
        }

        self.succeeded(&status);
        self.state
    }

    fn command_failure(&self, step: usize, exit_code: Option<i32>) -> ProvisionError {
        ProvisionError::CommandFailed {
            step,
            exit_code,
            output_tail: output_tail(self.state.accumulated_output(), OUTPUT_TAIL_LINES),
        }
    }

    fn succeeded(&mut self, status: &watch::Sender<PipelineStatus>) {
        self.state.succeed();
        status.send_replace(self.state.status());

        let packages = self
            .packages
            .iter()
            .map(|p| p.requirement())
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            "Environment updated at {:?} with packages: {}",
            self.environment.root_path, packages
        );

        self.progress.show_success();
        self.complete(true);
    }

    fn failed(&mut self, failure: ProvisionError, status: &watch::Sender<PipelineStatus>) {
        self.state.fail();
        status.send_replace(self.state.status());

        let message = match &failure {
            ProvisionError::CommandFailed { .. } => failure.to_string(),
            other => format!(
                "{}. Last output:\n{}",
                other,
                output_tail(self.state.accumulated_output(), OUTPUT_TAIL_LINES)
            ),
        };
        error!(
            "Provisioning failed at command {} of {}: {}",
            self.state.current_index(),
            self.state.total_steps(),
            message
        );

        self.progress.show_failure(&message);
        self.messages
            .notify(MessageLevel::Critical, "Venv update failed", &message);
        self.complete(false);
    }

    fn cancelled(&mut self, status: &watch::Sender<PipelineStatus>) {
        self.state.cancel();
        status.send_replace(self.state.status());
        info!(
            "Provisioning of {:?} cancelled at command {}",
            self.environment.root_path,
            self.state.current_index()
        );
        self.progress.abandon();
        // A cancelled run never reports completion.
        self.on_done = None;
    }

    fn complete(&mut self, success: bool) {
        if let Some(callback) = self.on_done.take() {
            callback(
                success,
                self.environment.root_path.clone(),
                self.state.accumulated_output().to_string(),
            );
        }
    }
}

/// Handle to a running pipeline
///
/// Dropping the handle detaches the pipeline: it keeps running and still
/// reports completion through its callback.
pub struct PipelineHandle {
    cancel: watch::Sender<bool>,
    status: watch::Receiver<PipelineStatus>,
    environment_path: PathBuf,
    task: JoinHandle<PipelineState>,
}

impl PipelineHandle {
    pub fn status(&self) -> PipelineStatus {
        *self.status.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Request teardown. Kills the in-flight process; no callback fires.
    pub fn cancel(&self) {
        if !self.is_finished() {
            info!("Cancellation requested for {:?}", self.environment_path);
        }
        self.cancel.send_replace(true);
    }

    pub fn environment_path(&self) -> &Path {
        &self.environment_path
    }

    /// Wait for the terminal state
    pub async fn wait(self) -> Result<PipelineState, JoinError> {
        self.task.await
    }
}
