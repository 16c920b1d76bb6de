//! Base interpreter discovery
//!
//! Candidates are checked in a fixed priority order:
//!
//! 1. an explicitly configured interpreter,
//! 2. `python3` then `python` on `PATH` (`python.exe` on Windows),
//! 3. well-known install locations for the platform.
//!
//! On Windows the host application ships an embedded interpreter that cannot
//! build redistributable environments; any candidate that looks like it is
//! rejected outright.

use crate::core::environment::Platform;
use crate::core::error::ProvisionError;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Python versions probed in well-known Windows install locations, newest first
const WINDOWS_VERSIONS: &[&str] = &["313", "312", "311", "310"];

fn embedded_interpreter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)qgis|python_embed").expect("embedded interpreter pattern is valid")
    })
}

/// Finds a base interpreter to create environments from
#[derive(Debug, Clone)]
pub struct InterpreterLocator {
    platform: Platform,
    configured: Option<PathBuf>,
    search_path: Option<OsString>,
    known_locations: Vec<PathBuf>,
}

impl Default for InterpreterLocator {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl InterpreterLocator {
    /// Locator searching the process `PATH` and the platform's well-known locations
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            configured: None,
            search_path: std::env::var_os("PATH"),
            known_locations: default_known_locations(platform),
        }
    }

    /// Check an explicitly configured interpreter before anything else
    pub fn with_configured(mut self, interpreter: Option<PathBuf>) -> Self {
        self.configured = interpreter;
        self
    }

    /// Replace the `PATH` value searched for interpreters
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Replace the well-known install locations
    pub fn with_known_locations(mut self, locations: Vec<PathBuf>) -> Self {
        self.known_locations = locations;
        self
    }

    fn path_names(&self) -> &'static [&'static str] {
        match self.platform {
            Platform::Windows => &["python.exe"],
            Platform::Unix => &["python3", "python"],
        }
    }

    /// Whether a candidate is the host's embedded interpreter
    pub fn is_excluded(&self, candidate: &Path) -> bool {
        self.platform == Platform::Windows
            && embedded_interpreter_pattern().is_match(&candidate.to_string_lossy())
    }

    /// All candidates in priority order, before existence checks
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(configured) = &self.configured {
            candidates.push(configured.clone());
        }

        if let Some(search_path) = &self.search_path {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            for name in self.path_names() {
                if let Ok(found) = which::which_in(name, Some(search_path), &cwd) {
                    candidates.push(found);
                }
            }
        }

        candidates.extend(self.known_locations.iter().cloned());
        candidates
    }

    /// First acceptable interpreter, or `NoInterpreterFound`
    pub fn locate(&self) -> Result<PathBuf, ProvisionError> {
        let candidates = self.candidates();
        for candidate in &candidates {
            if self.is_excluded(candidate) {
                debug!("Skipping embedded host interpreter {:?}", candidate);
                continue;
            }
            if candidate.is_file() {
                info!("Using base interpreter {:?}", candidate);
                return Ok(candidate.clone());
            }
        }

        Err(ProvisionError::NoInterpreterFound {
            searched: candidates,
        })
    }
}

fn default_known_locations(platform: Platform) -> Vec<PathBuf> {
    match platform {
        Platform::Windows => {
            let local_programs = dirs::data_local_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join("AppData").join("Local")))
                .map(|d| d.join("Programs").join("Python"));

            let mut locations = Vec::new();
            for version in WINDOWS_VERSIONS {
                let folder = format!("Python{}", version);
                if let Some(base) = &local_programs {
                    locations.push(base.join(&folder).join("python.exe"));
                }
                locations.push(PathBuf::from(format!("C:/{}/python.exe", folder)));
                locations.push(PathBuf::from(format!("C:/Program Files/{}/python.exe", folder)));
            }
            locations
        }
        Platform::Unix => vec![
            PathBuf::from("/usr/bin/python3"),
            PathBuf::from("/usr/local/bin/python3"),
            PathBuf::from("/opt/homebrew/bin/python3"),
        ],
    }
}
