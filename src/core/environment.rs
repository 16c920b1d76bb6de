//! Environment layout and path resolution
//!
//! [`PathResolver`] maps a base directory and environment name onto an
//! [`Environment`] snapshot. The snapshot reflects the filesystem at the
//! moment of resolution and is never cached: resolve again whenever freshness
//! matters.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, warn};

/// Operating system family, which decides the environment layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// `Scripts\python.exe`, `Scripts\pip.exe`
    Windows,
    /// `bin/python`, `bin/pip`
    Unix,
}

impl Platform {
    /// Platform of the running binary
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Directory holding executables inside an environment
    pub fn scripts_dir(self) -> &'static str {
        match self {
            Platform::Windows => "Scripts",
            Platform::Unix => "bin",
        }
    }

    /// Add the platform executable suffix to a program name
    pub fn executable_name(self, stem: &str) -> String {
        match self {
            Platform::Windows => format!("{}.exe", stem),
            Platform::Unix => stem.to_string(),
        }
    }

    fn other(self) -> Self {
        match self {
            Platform::Windows => Platform::Unix,
            Platform::Unix => Platform::Windows,
        }
    }
}

/// An isolated environment on disk, as observed at resolution time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// `base_dir/env_name`
    pub root_path: PathBuf,

    /// Interpreter inside the environment, `None` when unresolved
    pub executable_path: Option<PathBuf>,

    /// Whether `root_path` is an existing directory
    pub exists: bool,

    /// Layout family used to resolve paths
    pub platform: Platform,
}

impl Environment {
    /// Conventional interpreter location for this platform
    pub fn conventional_executable(&self) -> PathBuf {
        self.root_path
            .join(self.platform.scripts_dir())
            .join(self.platform.executable_name("python"))
    }

    /// Interpreter used for commands run inside the environment.
    ///
    /// Falls back to the conventional location when the environment does not
    /// exist yet, since that is where creation will place it.
    pub fn interpreter(&self) -> PathBuf {
        self.executable_path
            .clone()
            .unwrap_or_else(|| self.conventional_executable())
    }

    /// Expected location of the package installer binary
    pub fn installer_binary(&self) -> PathBuf {
        let interpreter = self.interpreter();
        let dir = interpreter
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root_path.join(self.platform.scripts_dir()));
        dir.join(self.platform.executable_name("pip"))
    }

    /// An environment is usable once it exists and its interpreter resolved
    pub fn is_usable(&self) -> bool {
        self.exists && self.executable_path.is_some()
    }
}

/// Resolves environment locations for one platform family
#[derive(Debug, Clone, Copy)]
pub struct PathResolver {
    platform: Platform,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl PathResolver {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Resolve `base_dir/env_name` against the current filesystem state
    pub fn resolve(&self, base_dir: &Path, env_name: &str) -> Environment {
        let root_path = base_dir.join(env_name);
        let exists = root_path.is_dir();
        let executable_path = if exists {
            self.find_executable(&root_path)
        } else {
            None
        };

        debug!(
            "Resolved environment {:?} (exists: {}, executable: {:?})",
            root_path, exists, executable_path
        );

        Environment {
            root_path,
            executable_path,
            exists,
            platform: self.platform,
        }
    }

    fn find_executable(&self, root: &Path) -> Option<PathBuf> {
        self.executable_candidates(root)
            .into_iter()
            .find(|candidate| candidate.is_file())
    }

    /// Executable locations probed in order: the platform convention first,
    /// then the alternative layouts some interpreters produce.
    fn executable_candidates(&self, root: &Path) -> Vec<PathBuf> {
        let own = self.platform;
        let other = own.other();
        vec![
            root.join(own.scripts_dir()).join(own.executable_name("python")),
            root.join(own.scripts_dir()).join(own.executable_name("python3")),
            root.join(other.scripts_dir()).join(other.executable_name("python")),
            root.join(other.scripts_dir()).join(other.executable_name("python3")),
        ]
    }

    /// Locate the environment's site-packages directory.
    ///
    /// Checks the well-known layouts first, then asks the environment's own
    /// interpreter. Returns `None` when neither yields an existing directory.
    pub async fn site_packages(&self, env: &Environment) -> Option<PathBuf> {
        let root = &env.root_path;
        let mut candidates = Vec::new();
        if let Ok(entries) = std::fs::read_dir(root.join("lib")) {
            let mut versioned: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("python"))
                })
                .map(|p| p.join("site-packages"))
                .collect();
            versioned.sort();
            candidates.extend(versioned);
        }
        candidates.push(root.join("Lib").join("site-packages"));
        candidates.push(root.join("lib").join("site-packages"));

        if let Some(found) = candidates.into_iter().find(|p| p.is_dir()) {
            return Some(found);
        }

        if let Some(interpreter) = &env.executable_path {
            match query_site_packages(interpreter).await {
                Some(found) => return Some(found),
                None => debug!("Interpreter {:?} reported no usable site-packages", interpreter),
            }
        }

        warn!("No site-packages found in environment {:?}", root);
        None
    }
}

async fn query_site_packages(interpreter: &Path) -> Option<PathBuf> {
    let output = tokio::process::Command::new(interpreter)
        .args(["-c", "import site; print('\\n'.join(site.getsitepackages()))"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            warn!("Failed to query site-packages from {:?}: {}", interpreter, e);
            return None;
        }
    };

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| PathBuf::from(line.trim()))
        .find(|p| p.is_dir())
}
