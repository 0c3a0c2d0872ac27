//! Locally installed packages.
//!
//! This module provides:
//! - `PackageName` - validated package identity
//! - `version` - version parsing and ordering
//! - `dpkg` - the local package database (query, remove, install)

mod dpkg;
pub mod version;

use std::fmt;
use std::str::FromStr;

pub use dpkg::{DEFAULT_MANAGER_COMMAND, DEFAULT_QUERY_COMMAND, Dpkg, PackageDatabase};
#[cfg(test)]
pub use dpkg::MockPackageDatabase;
pub use version::{Version, VersionError};

/// File extension of artifacts the package database can install.
pub const NATIVE_PACKAGE_EXTENSION: &str = ".deb";

/// Name of a package known to the local package database.
///
/// Always non-empty and free of surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(String);

impl PackageName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackageName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            anyhow::bail!("package is a required parameter and should not be blank")
        }
        Ok(PackageName(trimmed.to_string()))
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
