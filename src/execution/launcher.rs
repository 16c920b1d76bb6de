//! Process launching - spawns one command and streams its output and
//! termination back as events

use crate::core::{Command, ProvisionError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Which standard stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Notifications from a running process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One line of output, without its trailing newline
    Output { stream: OutputStream, line: String },
    /// The process terminated on its own. `None` when no exit code exists.
    Exited { code: Option<i32> },
    /// The process was terminated through [`LaunchedProcess::kill`]
    Killed,
}

/// A process in flight
///
/// Output events for a stream arrive in emission order; the terminal
/// `Exited`/`Killed` event is always the last one sent.
pub struct LaunchedProcess {
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    kill: Option<oneshot::Sender<()>>,
}

impl LaunchedProcess {
    pub fn new(
        events: mpsc::UnboundedReceiver<ProcessEvent>,
        kill: oneshot::Sender<()>,
    ) -> Self {
        Self {
            events,
            kill: Some(kill),
        }
    }

    /// Wait for the next event; `None` once the process side is gone
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Request forced termination. Idempotent.
    pub fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Trait for process launching - allows for different implementations
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Start `command` without waiting for it to finish
    async fn launch(&self, command: &Command) -> Result<LaunchedProcess, ProvisionError>;
}

/// Launches real OS processes through `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct TokioProcessLauncher;

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn launch(&self, command: &Command) -> Result<LaunchedProcess, ProvisionError> {
        debug!("Spawning {}", command);

        let mut child = tokio::process::Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProvisionError::Spawn {
                program: command.program().to_string(),
                source,
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        let readers: Vec<_> = [
            child
                .stdout
                .take()
                .map(|out| tokio::spawn(forward_lines(out, OutputStream::Stdout, tx.clone()))),
            child
                .stderr
                .take()
                .map(|err| tokio::spawn(forward_lines(err, OutputStream::Stderr, tx.clone()))),
        ]
        .into_iter()
        .flatten()
        .collect();

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let code = match status {
                        Ok(status) => status.code(),
                        Err(e) => {
                            warn!("Failed to wait for child process: {}", e);
                            let _ = tx.send(ProcessEvent::Output {
                                stream: OutputStream::Stderr,
                                line: format!("Failed to wait for process: {}", e),
                            });
                            None
                        }
                    };
                    // Output must be fully forwarded before the exit notification.
                    for reader in readers {
                        let _ = reader.await;
                    }
                    let _ = tx.send(ProcessEvent::Exited { code });
                }
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill child process: {}", e);
                    }
                    for reader in readers {
                        reader.abort();
                    }
                    let _ = tx.send(ProcessEvent::Killed);
                }
            }
        });

        Ok(LaunchedProcess::new(rx, kill_tx))
    }
}

async fn forward_lines<R>(reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<ProcessEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if tx.send(ProcessEvent::Output { stream, line }).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Error reading {:?}: {}", stream, e);
                break;
            }
        }
    }
}
