//! Pipeline execution
//!
//! Launches planned commands as child processes, one at a time, and reports
//! progress and completion back to the caller.

pub mod bootstrap;
pub mod executor;
pub mod launcher;
pub mod progress;
pub mod provisioner;
pub mod runner;

pub use bootstrap::{BootstrapRepair, HttpScriptFetcher, RepairOutcome, ScriptFetcher};
pub use executor::{CompletionCallback, PipelineExecutor, PipelineHandle};
pub use launcher::{LaunchedProcess, OutputStream, ProcessEvent, ProcessLauncher, TokioProcessLauncher};
pub use progress::{
    ChannelProgressSink, LogMessageSink, LogProgressSink, MessageLevel, MessageSink,
    ProgressEvent, ProgressReporter, ProgressSink,
};
pub use provisioner::{start_provisioning, Provisioner};
pub use runner::{StepOutcome, StepRunner};
