//! Execution state models

use crate::core::command::Command;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    /// Pipeline has not started
    Pending,
    /// A command is in flight
    Running,
    /// Every command exited with status 0
    Succeeded,
    /// A command failed; no further commands run
    Failed,
    /// Torn down by the owner; no completion callback fires
    Cancelled,
}

impl PipelineStatus {
    /// Check if status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Succeeded | PipelineStatus::Failed | PipelineStatus::Cancelled
        )
    }
}

/// State of one provisioning run
///
/// `current_index` only moves forward and freezes, together with
/// `accumulated_output`, once `status` becomes terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Commands in execution order
    commands: Vec<Command>,

    /// Index of the command currently running (or that failed)
    current_index: usize,

    /// Combined stdout/stderr of every command run so far
    accumulated_output: String,

    /// Current status
    status: PipelineStatus,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineState {
    /// Create a pending state for a planned command list
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            commands,
            current_index: 0,
            accumulated_output: String::new(),
            status: PipelineStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn accumulated_output(&self) -> &str {
        &self.accumulated_output
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    /// Command at `current_index`, if any remain
    pub fn current_command(&self) -> Option<&Command> {
        self.commands.get(self.current_index)
    }

    pub fn total_steps(&self) -> usize {
        self.commands.len()
    }

    /// Pending -> Running
    pub fn start(&mut self) {
        if self.status == PipelineStatus::Pending {
            self.status = PipelineStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Append process output; ignored once terminal
    pub fn append_output(&mut self, text: &str) {
        if !self.status.is_terminal() {
            self.accumulated_output.push_str(text);
        }
    }

    /// Move past the current command. Returns whether commands remain.
    pub fn advance(&mut self) -> bool {
        if self.status == PipelineStatus::Running && self.current_index < self.commands.len() {
            self.current_index += 1;
        }
        self.current_index < self.commands.len()
    }

    /// Running -> Succeeded
    pub fn succeed(&mut self) {
        self.finish(PipelineStatus::Succeeded);
    }

    /// Running -> Failed, freezing `current_index`
    pub fn fail(&mut self) {
        self.finish(PipelineStatus::Failed);
    }

    /// Running -> Cancelled
    pub fn cancel(&mut self) {
        self.finish(PipelineStatus::Cancelled);
    }

    fn finish(&mut self, status: PipelineStatus) {
        if !self.status.is_terminal() {
            self.status = status;
            self.completed_at = Some(Utc::now());
        }
    }
}

/// Caller-visible progress, recomputed on every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub done_steps: usize,
    pub total_steps: usize,
    pub message: String,
}

impl ProgressSnapshot {
    /// Progress fraction (0.0 to 1.0)
    pub fn fraction(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.done_steps as f64 / self.total_steps as f64
    }
}
