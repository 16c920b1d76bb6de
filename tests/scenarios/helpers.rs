//! Test utilities for provisioning scenarios
//!
//! Scenarios never launch real processes. [`ScriptedLauncher`] answers each
//! command according to its [`StepKind`] and records every launch, exit and
//! kill so tests can assert ordering.

use venv_pipeline::core::config::ProvisionConfig;
use venv_pipeline::core::{
    Command, InterpreterLocator, PathResolver, PipelineState, PipelineStatus, Platform,
    ProvisionError, StepKind,
};
use venv_pipeline::execution::{
    LaunchedProcess, MessageLevel, MessageSink, OutputStream, PipelineHandle, ProcessEvent,
    ProcessLauncher, ProgressEvent, ProgressSink, Provisioner, ScriptFetcher,
};
use venv_pipeline::core::ProgressSnapshot;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};

/// How a scripted command behaves
#[derive(Debug, Clone, Default)]
pub struct StepScript {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// Files written just before the process exits
    pub creates: Vec<PathBuf>,
    /// Never exit on its own; only a kill ends it
    pub hang: bool,
    pub spawn_error: bool,
}

impl StepScript {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn spawn_error() -> Self {
        Self {
            spawn_error: true,
            ..Self::default()
        }
    }

    pub fn stdout(mut self, line: &str) -> Self {
        self.stdout.push(line.to_string());
        self
    }

    pub fn stderr(mut self, line: &str) -> Self {
        self.stderr.push(line.to_string());
        self
    }

    pub fn creates(mut self, path: impl Into<PathBuf>) -> Self {
        self.creates.push(path.into());
        self
    }
}

/// One observation made by the scripted launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchRecord {
    Launched(StepKind),
    Exited(StepKind, i32),
    Killed(StepKind),
}

/// Process launcher that follows per-step scripts
#[derive(Default)]
pub struct ScriptedLauncher {
    scripts: Mutex<Vec<(StepKind, StepScript)>>,
    log: Arc<Mutex<Vec<LaunchRecord>>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behavior of every command of `kind`
    pub fn on(&self, kind: StepKind, script: StepScript) -> &Self {
        self.scripts.lock().unwrap().push((kind, script));
        self
    }

    pub fn log(&self) -> Vec<LaunchRecord> {
        self.log.lock().unwrap().clone()
    }

    /// Kinds in launch order
    pub fn launched(&self) -> Vec<StepKind> {
        self.log()
            .into_iter()
            .filter_map(|r| match r {
                LaunchRecord::Launched(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    fn script_for(&self, kind: &StepKind) -> StepScript {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, s)| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    async fn launch(&self, command: &Command) -> Result<LaunchedProcess, ProvisionError> {
        let kind = command.kind().clone();
        let script = self.script_for(&kind);

        if script.spawn_error {
            return Err(ProvisionError::Spawn {
                program: command.program().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn failure"),
            });
        }

        self.log.lock().unwrap().push(LaunchRecord::Launched(kind.clone()));

        let (tx, rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let log = self.log.clone();

        tokio::spawn(async move {
            for line in &script.stdout {
                let _ = tx.send(ProcessEvent::Output {
                    stream: OutputStream::Stdout,
                    line: line.clone(),
                });
            }
            for line in &script.stderr {
                let _ = tx.send(ProcessEvent::Output {
                    stream: OutputStream::Stderr,
                    line: line.clone(),
                });
            }

            if script.hang {
                let _ = kill_rx.await;
                log.lock().unwrap().push(LaunchRecord::Killed(kind));
                let _ = tx.send(ProcessEvent::Killed);
                return;
            }

            for path in &script.creates {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).unwrap();
                }
                std::fs::write(path, b"").unwrap();
            }

            log.lock()
                .unwrap()
                .push(LaunchRecord::Exited(kind, script.exit_code));
            let _ = tx.send(ProcessEvent::Exited {
                code: Some(script.exit_code),
            });
        });

        Ok(LaunchedProcess::new(rx, kill_tx))
    }
}

/// Serves a fixed bootstrap script and counts downloads
#[derive(Default)]
pub struct StaticFetcher {
    pub fetches: AtomicUsize,
}

#[async_trait]
impl ScriptFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, ProvisionError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(b"print('installing pip')\n".to_vec())
    }
}

/// Records every progress event
#[derive(Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgressSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn dismissed(&self) -> bool {
        self.events().contains(&ProgressEvent::Dismissed)
    }
}

impl ProgressSink for RecordingProgressSink {
    fn report_progress(&self, snapshot: &ProgressSnapshot) {
        self.events.lock().unwrap().push(ProgressEvent::Progress {
            snapshot: snapshot.clone(),
        });
    }

    fn report_success(&self, snapshot: &ProgressSnapshot) {
        self.events.lock().unwrap().push(ProgressEvent::Success {
            snapshot: snapshot.clone(),
        });
    }

    fn report_failure(&self, snapshot: &ProgressSnapshot, message: &str) {
        self.events.lock().unwrap().push(ProgressEvent::Failure {
            snapshot: snapshot.clone(),
            message: message.to_string(),
        });
    }

    fn dismiss(&self) {
        self.events.lock().unwrap().push(ProgressEvent::Dismissed);
    }
}

/// Records operator notifications
#[derive(Default)]
pub struct RecordingMessageSink {
    messages: Mutex<Vec<(MessageLevel, String, String)>>,
}

impl RecordingMessageSink {
    pub fn messages(&self) -> Vec<(MessageLevel, String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl MessageSink for RecordingMessageSink {
    fn notify(&self, level: MessageLevel, title: &str, body: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((level, title.to_string(), body.to_string()));
    }
}

/// One `on_done` invocation
#[derive(Debug, Clone)]
pub struct Completion {
    pub success: bool,
    pub environment_path: PathBuf,
    pub output: String,
}

/// A temporary base directory plus scripted collaborators
pub struct Fixture {
    pub dir: TempDir,
    pub launcher: Arc<ScriptedLauncher>,
    pub fetcher: Arc<StaticFetcher>,
    pub progress: Arc<RecordingProgressSink>,
    pub messages: Arc<RecordingMessageSink>,
    pub base_interpreter: Option<PathBuf>,
}

impl Fixture {
    /// Fixture with a fake base interpreter available
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base/bin/python3");
        std::fs::create_dir_all(base.parent().unwrap()).unwrap();
        std::fs::write(&base, b"").unwrap();
        Self {
            dir,
            launcher: Arc::new(ScriptedLauncher::new()),
            fetcher: Arc::new(StaticFetcher::default()),
            progress: Arc::new(RecordingProgressSink::default()),
            messages: Arc::new(RecordingMessageSink::default()),
            base_interpreter: Some(base),
        }
    }

    /// Fixture where no base interpreter can be found
    pub fn without_interpreter() -> Self {
        Self {
            base_interpreter: None,
            ..Self::new()
        }
    }

    pub fn envs_dir(&self) -> PathBuf {
        self.dir.path().join("envs")
    }

    pub fn env_root(&self) -> PathBuf {
        self.envs_dir().join("venv")
    }

    pub fn env_python(&self) -> PathBuf {
        self.env_root().join("bin/python")
    }

    pub fn env_pip(&self) -> PathBuf {
        self.env_root().join("bin/pip")
    }

    /// Lay out an already provisioned environment
    pub fn create_environment(&self, with_pip: bool) {
        std::fs::create_dir_all(self.env_root().join("bin")).unwrap();
        std::fs::write(self.env_python(), b"").unwrap();
        if with_pip {
            std::fs::write(self.env_pip(), b"").unwrap();
        }
    }

    /// Manifest YAML for the environment with `packages`
    pub fn manifest(&self, packages: &[&str]) -> String {
        let mut yaml = format!(
            "name: venv\nbase_dir: {:?}\nprogress:\n  success_linger_ms: 20\n  failure_linger_ms: 300\npackages:\n",
            self.envs_dir()
        );
        if packages.is_empty() {
            yaml = yaml.replace("packages:\n", "packages: []\n");
        }
        for package in packages {
            yaml.push_str(&format!("  - {:?}\n", package));
        }
        yaml
    }

    pub fn provisioner(&self, packages: &[&str]) -> Provisioner {
        let config = ProvisionConfig::from_yaml(&self.manifest(packages)).unwrap();
        let locator = InterpreterLocator::new(Platform::Unix)
            .with_search_path(None)
            .with_known_locations(self.base_interpreter.iter().cloned().collect());

        Provisioner::new(config)
            .with_resolver(PathResolver::new(Platform::Unix))
            .with_locator(locator)
            .with_launcher(self.launcher.clone())
            .with_fetcher(self.fetcher.clone())
            .with_message_sink(self.messages.clone())
    }

    /// Start provisioning and collect completions
    pub fn start(&self, packages: &[&str]) -> (PipelineHandle, Arc<Mutex<Vec<Completion>>>) {
        let completions = Arc::new(Mutex::new(Vec::new()));
        let recorder = completions.clone();
        let handle = self
            .provisioner(packages)
            .start(self.progress.clone(), move |success, environment_path, output| {
                recorder.lock().unwrap().push(Completion {
                    success,
                    environment_path,
                    output,
                });
            });
        (handle, completions)
    }

    /// Run to a terminal state and return the state plus every completion
    pub async fn run(&self, packages: &[&str]) -> ScenarioResult {
        let (handle, completions) = self.start(packages);
        let state = handle.wait().await.unwrap();
        let completions = completions.lock().unwrap().clone();
        ScenarioResult { state, completions }
    }
}

/// Outcome of a scenario run
#[derive(Debug)]
pub struct ScenarioResult {
    pub state: PipelineState,
    pub completions: Vec<Completion>,
}

impl ScenarioResult {
    /// The single completion; panics unless exactly one fired
    pub fn completion(&self) -> &Completion {
        assert_eq!(
            self.completions.len(),
            1,
            "expected exactly one completion, got {:?}",
            self.completions
        );
        &self.completions[0]
    }
}

/// Kinds planned for a fresh environment with `packages`
pub fn fresh_plan(packages: &[&str]) -> Vec<StepKind> {
    let mut kinds = vec![
        StepKind::CreateEnvironment,
        StepKind::UpgradeInstaller,
        StepKind::InstallPackageManager,
    ];
    kinds.extend(packages.iter().map(|p| StepKind::InstallPackage(p.to_string())));
    kinds
}

pub fn assert_succeeded(result: &ScenarioResult) {
    assert_eq!(
        result.state.status(),
        PipelineStatus::Succeeded,
        "output:\n{}",
        result.state.accumulated_output()
    );
    assert!(result.completion().success);
}

pub fn assert_failed_at(result: &ScenarioResult, index: usize) {
    assert_eq!(result.state.status(), PipelineStatus::Failed);
    assert_eq!(result.state.current_index(), index);
    assert!(!result.completion().success);
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
