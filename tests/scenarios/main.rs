//! Scenario-based tests for venv-pipeline

mod helpers;

mod cancellation;
mod no_interpreter;
mod progress;
