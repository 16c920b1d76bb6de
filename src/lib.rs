//! venv-pipeline - Non-blocking Python environment provisioning

pub mod cli;
pub mod core;
pub mod execution;

// Re-export commonly used types
pub use crate::core::config::{ProgressConfig, ProvisionConfig};
pub use crate::core::{
    Command, Environment, PackageSpec, PipelineState, PipelineStatus, ProvisionError,
};
pub use crate::execution::{
    start_provisioning, PipelineHandle, ProgressEvent, ProgressSink, Provisioner,
};
