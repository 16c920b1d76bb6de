//! Command planning - turns on-disk state plus declared packages into an
//! ordered command list

use crate::core::{
    command::{Command, StepKind},
    environment::Environment,
    error::ProvisionError,
    interpreter::InterpreterLocator,
    package::PackageSpec,
};
use std::path::Path;
use tracing::debug;

/// Module name of the secondary package manager
pub const PACKAGE_MANAGER: &str = "uv";

/// Plans the commands that bring an environment to its declared state
#[derive(Debug, Clone, Default)]
pub struct CommandPlanner {
    locator: InterpreterLocator,
}

impl CommandPlanner {
    pub fn new(locator: InterpreterLocator) -> Self {
        Self { locator }
    }

    /// Plan the full command sequence.
    ///
    /// The base interpreter is only looked up when the environment has to be
    /// created. Planning has no side effects.
    pub fn plan(
        &self,
        environment: &Environment,
        packages: &[PackageSpec],
    ) -> Result<Vec<Command>, ProvisionError> {
        let mut commands = Vec::with_capacity(packages.len() + 3);

        if !environment.exists {
            let base = self.locator.locate()?;
            commands.push(Command::new(
                StepKind::CreateEnvironment,
                vec![
                    path_arg(&base),
                    "-m".to_string(),
                    "venv".to_string(),
                    path_arg(&environment.root_path),
                ],
            ));
        }

        let python = path_arg(&environment.interpreter());

        commands.push(Command::new(
            StepKind::UpgradeInstaller,
            strings(&[&python, "-m", "pip", "install", "--upgrade", "pip", "setuptools", "wheel"]),
        ));

        commands.push(Command::new(
            StepKind::InstallPackageManager,
            strings(&[&python, "-m", "pip", "install", PACKAGE_MANAGER]),
        ));

        for package in packages {
            let requirement = package.requirement();
            commands.push(Command::new(
                StepKind::InstallPackage(package.name().to_string()),
                strings(&[
                    &python,
                    "-m",
                    PACKAGE_MANAGER,
                    "pip",
                    "install",
                    "--python",
                    &python,
                    "--upgrade",
                    &requirement,
                ]),
            ));
        }

        debug!("Planned {} commands for {:?}", commands.len(), environment.root_path);
        Ok(commands)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
