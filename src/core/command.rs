//! Planned command model

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a planned command does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "package", rename_all = "snake_case")]
pub enum StepKind {
    /// Create the environment from the base interpreter
    CreateEnvironment,
    /// Upgrade the installer and build backends
    UpgradeInstaller,
    /// Install the secondary package manager
    InstallPackageManager,
    /// Install or upgrade one declared package
    InstallPackage(String),
    /// Run the installer bootstrap script
    BootstrapInstaller,
}

impl StepKind {
    /// Short human-readable label for progress messages
    pub fn label(&self) -> String {
        match self {
            StepKind::CreateEnvironment => "Creating environment".to_string(),
            StepKind::UpgradeInstaller => "Upgrading pip".to_string(),
            StepKind::InstallPackageManager => "Installing uv".to_string(),
            StepKind::InstallPackage(name) => format!("Installing {}", name),
            StepKind::BootstrapInstaller => "Bootstrapping pip".to_string(),
        }
    }
}

/// One external process invocation. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    kind: StepKind,
    argv: Vec<String>,
}

impl Command {
    pub fn new(kind: StepKind, argv: Vec<String>) -> Self {
        Self { kind, argv }
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Program to launch (first argv entry)
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    /// Arguments after the program
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    pub fn is_environment_creation(&self) -> bool {
        self.kind == StepKind::CreateEnvironment
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}
