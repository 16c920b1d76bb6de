//! Provisioning manifest loaded from YAML

use crate::core::package::PackageSpec;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Well-known location of the pip bootstrap script
pub const DEFAULT_BOOTSTRAP_URL: &str = "https://bootstrap.pypa.io/get-pip.py";

/// Top-level provisioning manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Environment directory name under `base_dir`
    pub name: String,

    /// Directory the environment lives in
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Explicit base interpreter, checked before any other candidate
    #[serde(default)]
    pub interpreter: Option<PathBuf>,

    /// Where the installer bootstrap script is fetched from
    #[serde(default = "default_bootstrap_url")]
    pub bootstrap_url: String,

    /// Packages to install or upgrade, in order
    #[serde(default)]
    pub packages: Vec<PackageSpec>,

    /// Progress indicator timing
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// How long terminal progress states stay visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_success_linger_ms")]
    pub success_linger_ms: u64,

    #[serde(default = "default_failure_linger_ms")]
    pub failure_linger_ms: u64,
}

impl ProgressConfig {
    pub fn success_linger(&self) -> Duration {
        Duration::from_millis(self.success_linger_ms)
    }

    pub fn failure_linger(&self) -> Duration {
        Duration::from_millis(self.failure_linger_ms)
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            success_linger_ms: default_success_linger_ms(),
            failure_linger_ms: default_failure_linger_ms(),
        }
    }
}

fn default_bootstrap_url() -> String {
    DEFAULT_BOOTSTRAP_URL.to_string()
}

fn default_success_linger_ms() -> u64 {
    2000
}

fn default_failure_linger_ms() -> u64 {
    10000
}

/// Default directory for environments when the manifest names none
pub fn default_base_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("venv-pipeline")
}

impl ProvisionConfig {
    /// Manifest for `name` with defaults everywhere else
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_dir: None,
            interpreter: None,
            bootstrap_url: default_bootstrap_url(),
            packages: Vec::new(),
            progress: ProgressConfig::default(),
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProvisionConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            anyhow::bail!("Environment name must not be empty");
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            anyhow::bail!("Environment name '{}' must be a single directory name", self.name);
        }

        if !self.bootstrap_url.starts_with("https://") {
            anyhow::bail!(
                "Bootstrap URL must use https: {}",
                self.bootstrap_url
            );
        }

        if self.progress.success_linger_ms == 0 || self.progress.failure_linger_ms == 0 {
            anyhow::bail!("Progress linger durations must be positive");
        }

        let mut seen = std::collections::HashSet::new();
        for package in &self.packages {
            if !seen.insert(package.name()) {
                tracing::warn!(
                    "Package '{}' is declared more than once; each entry is installed in order",
                    package.name()
                );
            }
        }

        Ok(())
    }

    /// Base directory, falling back to the per-user data directory
    pub fn resolved_base_dir(&self) -> PathBuf {
        self.base_dir.clone().unwrap_or_else(default_base_dir)
    }
}
