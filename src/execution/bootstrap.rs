//! Installer bootstrap repair
//!
//! Some base interpreters create environments without pip. When that happens
//! right after environment creation, the bootstrap script is downloaded into
//! the environment and run with the environment's own interpreter.
//!
//! The script's exit code is advisory: a non-zero exit is tolerated when the
//! installer binary exists afterwards. Only a missing binary is fatal.

use crate::core::{Command, Environment, PipelineState, ProvisionError, StepKind};
use crate::execution::runner::{StepOutcome, StepRunner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// File name the bootstrap script is saved under
pub const BOOTSTRAP_SCRIPT_NAME: &str = "get-pip.py";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Fetches the bootstrap script
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProvisionError>;
}

/// Downloads the script over HTTPS
#[derive(Debug, Clone, Default)]
pub struct HttpScriptFetcher;

#[async_trait]
impl ScriptFetcher for HttpScriptFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProvisionError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| ProvisionError::Download(e.to_string()))?;

        info!("Downloading bootstrap script from {}", url);
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ProvisionError::Download(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ProvisionError::Download(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProvisionError::Download(format!("{}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

/// Result of a probe-and-repair pass that did not fail fatally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The installer was already there; nothing ran
    InstallerPresent,
    /// The bootstrap script ran cleanly and the installer exists
    Repaired,
    /// The script reported failure but the installer exists anyway
    Tolerated { exit_code: Option<i32> },
    /// Cancellation arrived while downloading or running the script
    Cancelled,
}

/// Removes the downloaded script however the repair ends
struct ScriptGuard(PathBuf);

impl Drop for ScriptGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove bootstrap script {:?}: {}", self.0, e);
            }
        }
    }
}

/// Detects a missing installer in a fresh environment and repairs it
pub struct BootstrapRepair {
    fetcher: Arc<dyn ScriptFetcher>,
    url: String,
}

impl BootstrapRepair {
    pub fn new(fetcher: Arc<dyn ScriptFetcher>, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }

    /// Whether the environment's installer binary is on disk
    pub fn installer_present(environment: &Environment) -> bool {
        environment.installer_binary().is_file()
    }

    /// Where the script is written: next to the environment's interpreter
    pub fn script_path(environment: &Environment) -> PathBuf {
        let interpreter = environment.interpreter();
        interpreter
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| environment.root_path.clone())
            .join(BOOTSTRAP_SCRIPT_NAME)
    }

    /// Probe for the installer and bootstrap it when absent.
    ///
    /// Script output is appended to the pipeline output through `runner`.
    pub async fn probe_and_repair(
        &self,
        environment: &Environment,
        runner: &mut StepRunner,
        state: &mut PipelineState,
    ) -> Result<RepairOutcome, ProvisionError> {
        if Self::installer_present(environment) {
            return Ok(RepairOutcome::InstallerPresent);
        }

        let installer = environment.installer_binary();
        warn!("Installer missing at {:?}; bootstrapping from {}", installer, self.url);
        state.append_output(&format!(
            "\nInstaller not found at {}; bootstrapping from {}\n",
            installer.display(),
            self.url
        ));

        let script_path = Self::script_path(environment);
        let _guard = ScriptGuard(script_path.clone());

        let downloaded = tokio::select! {
            biased;
            _ = runner.cancelled() => {
                info!("Bootstrap download cancelled");
                return Ok(RepairOutcome::Cancelled);
            }
            result = self.download(&script_path) => result,
        };

        let exit_code = match downloaded {
            Ok(()) => {
                let command = Command::new(
                    StepKind::BootstrapInstaller,
                    vec![
                        environment.interpreter().to_string_lossy().into_owned(),
                        script_path.to_string_lossy().into_owned(),
                    ],
                );
                match runner.run(&command, state).await {
                    StepOutcome::Cancelled => return Ok(RepairOutcome::Cancelled),
                    StepOutcome::Completed { exit_code } => exit_code,
                    StepOutcome::SpawnFailed(_) => None,
                }
            }
            Err(e) => {
                warn!("Failed to download bootstrap script: {}", e);
                state.append_output(&format!("Failed to download bootstrap script: {}\n", e));
                return if Self::installer_present(environment) {
                    Ok(RepairOutcome::Tolerated { exit_code: None })
                } else {
                    Err(ProvisionError::BootstrapRepairFailed(format!(
                        "could not download {}: {}",
                        self.url, e
                    )))
                };
            }
        };

        let present = Self::installer_present(environment);
        match (exit_code, present) {
            (Some(0), true) => {
                info!("Installer bootstrapped at {:?}", installer);
                Ok(RepairOutcome::Repaired)
            }
            (code, true) => {
                warn!(
                    "{} exited with {:?} but the installer is now present",
                    BOOTSTRAP_SCRIPT_NAME, code
                );
                state.append_output(&format!(
                    "{} reported an error but {} is now present\n",
                    BOOTSTRAP_SCRIPT_NAME,
                    installer.display()
                ));
                Ok(RepairOutcome::Tolerated { exit_code: code })
            }
            (code, false) => Err(ProvisionError::BootstrapRepairFailed(format!(
                "{} exited with {} and {} is still missing",
                BOOTSTRAP_SCRIPT_NAME,
                code.map(|c| c.to_string()).unwrap_or_else(|| "no exit code".to_string()),
                installer.display()
            ))),
        }
    }

    async fn download(&self, script_path: &Path) -> Result<(), ProvisionError> {
        let script = self.fetcher.fetch(&self.url).await?;
        if let Some(parent) = script_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(script_path, script).await?;
        Ok(())
    }
}
