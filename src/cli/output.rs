//! CLI output formatting

use crate::core::{Command, Environment, PipelineStatus};
use crate::execution::ProgressEvent;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(template.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Apply one progress event to the bar.
///
/// Returns `true` once the indicator has been dismissed.
pub fn apply_progress_event(progress: &ProgressBar, event: &ProgressEvent) -> bool {
    match event {
        ProgressEvent::Progress { snapshot } => {
            progress.set_length(snapshot.total_steps as u64);
            progress.set_position(snapshot.done_steps as u64);
            progress.set_message(snapshot.message.clone());
            false
        }
        ProgressEvent::Success { snapshot } => {
            progress.set_position(snapshot.total_steps as u64);
            progress.set_message(format!("{}", style(&snapshot.message).green()));
            false
        }
        ProgressEvent::Failure { message, .. } => {
            progress.abandon_with_message(format!("{}", style(message).red()));
            false
        }
        ProgressEvent::Dismissed => {
            if !progress.is_finished() {
                progress.finish_and_clear();
            }
            true
        }
    }
}

/// Whether `event` reports the final outcome, before any dismissal delay
pub fn is_terminal_event(event: &ProgressEvent) -> bool {
    matches!(event, ProgressEvent::Success { .. } | ProgressEvent::Failure { .. })
}

/// Format a pipeline status for display
pub fn format_status(status: PipelineStatus) -> String {
    match status {
        PipelineStatus::Pending => style("PENDING").dim().to_string(),
        PipelineStatus::Running => style("RUNNING").yellow().to_string(),
        PipelineStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        PipelineStatus::Failed => style("FAILED").red().to_string(),
        PipelineStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format one planned command for display
pub fn format_command(index: usize, command: &Command) -> String {
    format!(
        "  {} {}\n      {}",
        style(format!("{}.", index + 1)).dim(),
        style(command.kind().label()).bold(),
        style(command).dim()
    )
}

/// Format an environment snapshot for display
pub fn format_environment(environment: &Environment) -> String {
    let executable = match &environment.executable_path {
        Some(path) => style(path.display().to_string()).cyan().to_string(),
        None => style("unresolved").yellow().to_string(),
    };
    let exists = if environment.exists {
        style("yes").green()
    } else {
        style("no").red()
    };
    format!(
        "  Path: {}\n  Exists: {}\n  Interpreter: {}",
        style(environment.root_path.display()).bold(),
        exists,
        executable
    )
}

/// One interpreter candidate with its lookup verdict
pub fn format_candidate(candidate: &Path, selected: bool, excluded: bool, exists: bool) -> String {
    let verdict = if selected {
        style("selected").green().bold()
    } else if excluded {
        style("excluded").yellow()
    } else if exists {
        style("found").dim()
    } else {
        style("missing").red()
    };
    format!("  {} [{}]", candidate.display(), verdict)
}

/// Last `max_lines` lines of `output`
pub fn format_output_tail(output: &str, max_lines: usize) -> String {
    let tail = crate::core::output_tail(output, max_lines);
    let total = output.trim().lines().count();
    if total > max_lines {
        format!(
            "{}\n{}",
            style(format!("[{} earlier lines omitted]", total - max_lines)).dim(),
            tail
        )
    } else {
        tail
    }
}

/// A horizontal rule spanning the terminal width
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    "─".repeat(width)
}
