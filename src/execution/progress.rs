//! Progress reporting
//!
//! The pipeline never touches a UI directly. It talks to two capabilities
//! injected at construction:
//!
//! - [`ProgressSink`] receives progress snapshots and terminal states,
//! - [`MessageSink`] receives operator-facing notifications.
//!
//! Both may be called from the executor task, which is not the UI-owning
//! context. [`ChannelProgressSink`] forwards every mutation as a
//! [`ProgressEvent`] so the UI side applies it on its own task.

use crate::core::config::ProgressConfig;
use crate::core::ProgressSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Receives progress updates for one provisioning run
pub trait ProgressSink: Send + Sync {
    /// Called whenever the step counter or status text changes
    fn report_progress(&self, snapshot: &ProgressSnapshot);

    /// Called once when the run succeeds
    fn report_success(&self, snapshot: &ProgressSnapshot);

    /// Called once when the run fails
    fn report_failure(&self, snapshot: &ProgressSnapshot, message: &str);

    /// Remove the indicator
    fn dismiss(&self);
}

/// Severity of an operator notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Critical,
}

/// Receives operator-facing notifications
pub trait MessageSink: Send + Sync {
    fn notify(&self, level: MessageLevel, title: &str, body: &str);
}

/// Writes notifications to the log
#[derive(Debug, Clone, Default)]
pub struct LogMessageSink;

impl MessageSink for LogMessageSink {
    fn notify(&self, level: MessageLevel, title: &str, body: &str) {
        match level {
            MessageLevel::Info => info!("{}: {}", title, body),
            MessageLevel::Warning => warn!("{}: {}", title, body),
            MessageLevel::Critical => error!("{}: {}", title, body),
        }
    }
}

/// Writes progress to the log
#[derive(Debug, Clone, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn report_progress(&self, snapshot: &ProgressSnapshot) {
        info!(
            "[{}/{}] {}",
            snapshot.done_steps, snapshot.total_steps, snapshot.message
        );
    }

    fn report_success(&self, snapshot: &ProgressSnapshot) {
        info!("{}", snapshot.message);
    }

    fn report_failure(&self, _snapshot: &ProgressSnapshot, message: &str) {
        error!("{}", message);
    }

    fn dismiss(&self) {}
}

/// Progress mutation to be applied by the UI-owning task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress { snapshot: ProgressSnapshot },
    Success { snapshot: ProgressSnapshot },
    Failure { snapshot: ProgressSnapshot, message: String },
    Dismissed,
}

/// Forwards progress over a channel to whoever owns the UI
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProgressEvent) {
        // The UI side may already be gone during shutdown.
        let _ = self.tx.send(event);
    }
}

impl ProgressSink for ChannelProgressSink {
    fn report_progress(&self, snapshot: &ProgressSnapshot) {
        self.send(ProgressEvent::Progress {
            snapshot: snapshot.clone(),
        });
    }

    fn report_success(&self, snapshot: &ProgressSnapshot) {
        self.send(ProgressEvent::Success {
            snapshot: snapshot.clone(),
        });
    }

    fn report_failure(&self, snapshot: &ProgressSnapshot, message: &str) {
        self.send(ProgressEvent::Failure {
            snapshot: snapshot.clone(),
            message: message.to_string(),
        });
    }

    fn dismiss(&self) {
        self.send(ProgressEvent::Dismissed);
    }
}

/// Maps pipeline progress onto a [`ProgressSink`]
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    config: ProgressConfig,
    done_steps: usize,
    total_steps: usize,
    message: String,
    finished: bool,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>, total_steps: usize, config: ProgressConfig) -> Self {
        Self {
            sink,
            config,
            done_steps: 0,
            total_steps,
            message: String::new(),
            finished: false,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            done_steps: self.done_steps,
            total_steps: self.total_steps,
            message: self.message.clone(),
        }
    }

    pub fn show_start(&mut self, message: &str) {
        self.message = message.to_string();
        self.sink.report_progress(&self.snapshot());
    }

    /// Count one more finished step, never past the total
    pub fn advance(&mut self, message: Option<&str>) {
        if self.finished {
            return;
        }
        self.done_steps = (self.done_steps + 1).min(self.total_steps);
        if let Some(message) = message {
            self.message = message.to_string();
        }
        self.sink.report_progress(&self.snapshot());
    }

    /// Mark complete and remove the indicator after the success delay
    pub fn show_success(&mut self) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        self.done_steps = self.total_steps;
        self.message = "Venv update completed!".to_string();
        self.sink.report_success(&self.snapshot());
        self.schedule_dismiss(self.config.success_linger());
    }

    /// Mark failed and remove the indicator after the longer failure delay
    pub fn show_failure(&mut self, message: &str) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        self.message = format!("Venv update failed: {}", message);
        self.sink.report_failure(&self.snapshot(), &self.message);
        self.schedule_dismiss(self.config.failure_linger());
    }

    /// Remove the indicator now, without a terminal state
    pub fn abandon(&mut self) {
        self.finished = true;
        self.sink.dismiss();
    }

    fn schedule_dismiss(&self, delay: Duration) {
        let sink = self.sink.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    sink.dismiss();
                });
            }
            Err(_) => {
                warn!("No async runtime available; dismissing progress immediately");
                sink.dismiss();
            }
        }
    }
}
