//! Declared package requirements

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const OPERATOR_CHARS: &[char] = &['=', '<', '>', '!', '~'];

/// A package to install or upgrade, with an optional version constraint
///
/// Parsed from requirement strings such as `requests`, `shapely>=2.0` or
/// `numpy==1.26.4`. A bare version (`1.2`) is treated as an exact pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageSpec {
    name: String,
    version_constraint: Option<String>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_constraint: None,
        }
    }

    /// Attach a version constraint; bare versions become `==` pins
    pub fn with_version(mut self, constraint: impl Into<String>) -> Self {
        let constraint = constraint.into();
        let constraint = constraint.trim();
        self.version_constraint = if constraint.is_empty() {
            None
        } else if constraint.starts_with(OPERATOR_CHARS) {
            Some(constraint.to_string())
        } else {
            Some(format!("=={}", constraint))
        };
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version_constraint(&self) -> Option<&str> {
        self.version_constraint.as_deref()
    }

    /// Requirement string passed to the package manager
    pub fn requirement(&self) -> String {
        match &self.version_constraint {
            Some(constraint) => format!("{}{}", self.name, constraint),
            None => self.name.clone(),
        }
    }
}

impl FromStr for PackageSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, constraint) = match s.find(OPERATOR_CHARS) {
            Some(idx) => (s[..idx].trim(), Some(s[idx..].trim())),
            None => (s, None),
        };

        if name.is_empty() {
            return Err(format!("Invalid package requirement: '{}'", s));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(format!("Package name contains whitespace: '{}'", name));
        }

        let spec = PackageSpec::new(name);
        Ok(match constraint {
            Some(c) => spec.with_version(c),
            None => spec,
        })
    }
}

impl TryFrom<String> for PackageSpec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PackageSpec> for String {
    fn from(spec: PackageSpec) -> Self {
        spec.requirement()
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.requirement())
    }
}
