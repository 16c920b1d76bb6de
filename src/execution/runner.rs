//! Step runner - runs one command to termination while watching for
//! cancellation

use crate::core::{Command, PipelineState, ProvisionError};
use crate::execution::launcher::{OutputStream, ProcessEvent, ProcessLauncher};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How a single command ended
#[derive(Debug)]
pub enum StepOutcome {
    /// The process terminated; `None` when it produced no exit code
    Completed { exit_code: Option<i32> },
    /// The process could not be started
    SpawnFailed(ProvisionError),
    /// Cancellation was requested; the process has been killed
    Cancelled,
}

/// Runs commands one at a time, appending their output to the pipeline state
pub struct StepRunner {
    launcher: Arc<dyn ProcessLauncher>,
    cancel: watch::Receiver<bool>,
    watching_cancel: bool,
}

impl StepRunner {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, cancel: watch::Receiver<bool>) -> Self {
        Self {
            launcher,
            cancel,
            watching_cancel: true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once cancellation is requested; never resolves if the owner
    /// goes away without cancelling
    pub async fn cancelled(&mut self) {
        loop {
            if *self.cancel.borrow_and_update() {
                return;
            }
            if !self.watching_cancel || self.cancel.changed().await.is_err() {
                self.watching_cancel = false;
                std::future::pending::<()>().await;
            }
        }
    }

    /// Launch `command` and wait, without blocking, for it to terminate
    pub async fn run(&mut self, command: &Command, state: &mut PipelineState) -> StepOutcome {
        if self.is_cancelled() {
            return StepOutcome::Cancelled;
        }

        info!("Running: {}", command);
        state.append_output(&format!("\n\nRunning: {}\n", command));

        let mut process = match self.launcher.launch(command).await {
            Ok(process) => process,
            Err(e) => {
                warn!("{}", e);
                state.append_output(&format!("{}\n", e));
                return StepOutcome::SpawnFailed(e);
            }
        };

        loop {
            tokio::select! {
                biased;

                changed = self.cancel.changed(), if self.watching_cancel => {
                    match changed {
                        Ok(()) if *self.cancel.borrow() => {
                            info!("Cancelling: {}", command);
                            process.kill();
                            while let Some(event) = process.next_event().await {
                                if matches!(event, ProcessEvent::Killed | ProcessEvent::Exited { .. }) {
                                    break;
                                }
                            }
                            return StepOutcome::Cancelled;
                        }
                        Ok(()) => {}
                        // Owner went away without cancelling; keep running detached.
                        Err(_) => self.watching_cancel = false,
                    }
                }

                event = process.next_event() => match event {
                    Some(ProcessEvent::Output { stream, line }) => {
                        if stream == OutputStream::Stderr && !line.is_empty() {
                            debug!("stderr: {}", line);
                        }
                        state.append_output(&line);
                        state.append_output("\n");
                    }
                    Some(ProcessEvent::Exited { code }) => {
                        info!("Command exited with code {:?}: {}", code, command);
                        return StepOutcome::Completed { exit_code: code };
                    }
                    Some(ProcessEvent::Killed) | None => {
                        warn!("Process ended without an exit code: {}", command);
                        return StepOutcome::Completed { exit_code: None };
                    }
                },
            }
        }
    }
}
