//! Error types for provisioning

use std::path::PathBuf;
use thiserror::Error;

/// Number of trailing output lines carried in failure reports
pub const OUTPUT_TAIL_LINES: usize = 20;

/// Errors raised while planning or running a provisioning pipeline
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(
        "No suitable Python installation found (checked {}). Please install Python 3.12 from https://python.org (user install, no admin needed).",
        format_candidates(.searched)
    )]
    NoInterpreterFound { searched: Vec<PathBuf> },

    #[error("Command failed with exit code {}. Last output:\n{output_tail}", format_exit_code(.exit_code))]
    CommandFailed {
        step: usize,
        exit_code: Option<i32>,
        output_tail: String,
    },

    #[error("Bootstrap repair failed: {0}")]
    BootstrapRepairFailed(String),

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download error: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn format_candidates(searched: &[PathBuf]) -> String {
    if searched.is_empty() {
        return "no candidates".to_string();
    }
    searched
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal or failed to start)".to_string(),
    }
}

/// Last `max_lines` non-blank lines of `output`, joined by newlines
pub fn output_tail(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.trim().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
