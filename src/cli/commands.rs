//! CLI command definitions

use crate::core::config::ProvisionConfig;
use crate::core::PackageSpec;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Where an environment description comes from: a manifest file, or
/// arguments given directly on the command line
#[derive(Debug, Args, Clone)]
pub struct TargetArgs {
    /// Path to a provisioning manifest (YAML)
    #[arg(short, long, conflicts_with = "name")]
    pub file: Option<PathBuf>,

    /// Environment name (directory under the base directory)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Directory the environment lives in
    #[arg(short, long)]
    pub base_dir: Option<PathBuf>,

    /// Base interpreter used to create the environment
    #[arg(long)]
    pub interpreter: Option<PathBuf>,

    /// Packages to install, e.g. `requests` or `numpy>=2`
    #[arg(short, long = "package", value_parser = parse_package)]
    pub packages: Vec<PackageSpec>,
}

impl TargetArgs {
    /// Build the manifest, letting command-line values override the file
    pub fn to_config(&self) -> Result<ProvisionConfig> {
        let mut config = match (&self.file, &self.name) {
            (Some(file), _) => ProvisionConfig::from_file(file)
                .with_context(|| format!("Failed to load manifest {}", file.display()))?,
            (None, Some(name)) => ProvisionConfig::new(name.clone()),
            (None, None) => anyhow::bail!("Either --file or --name is required"),
        };

        if let Some(base_dir) = &self.base_dir {
            config.base_dir = Some(base_dir.clone());
        }
        if let Some(interpreter) = &self.interpreter {
            config.interpreter = Some(interpreter.clone());
        }
        config.packages.extend(self.packages.iter().cloned());

        config.validate()?;
        Ok(config)
    }
}

/// Create or update an environment
#[derive(Debug, Args, Clone)]
pub struct ProvisionCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Number of trailing output lines printed on failure
    #[arg(long, default_value_t = crate::core::OUTPUT_TAIL_LINES)]
    pub tail: usize,
}

/// Print the commands a provision run would execute
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a provisioning manifest
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to manifest YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show where an environment lives and what it contains
#[derive(Debug, Args, Clone)]
pub struct LocateCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse a package requirement
pub fn parse_package(s: &str) -> Result<PackageSpec, String> {
    s.parse::<PackageSpec>().map_err(|e| e.to_string())
}
