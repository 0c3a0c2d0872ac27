//! Settings file and the monitored-package registry.
//!
//! Settings are read once at startup and never change afterwards. The
//! registry is handed to the upgrade service explicitly.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{LevelFilter, debug, warn};
use serde::Deserialize;

use crate::package::{DEFAULT_MANAGER_COMMAND, DEFAULT_QUERY_COMMAND, PackageName};
use crate::provider::DEFAULT_API_URL;
use crate::runtime::Runtime;

pub const SETTINGS_FILE_NAME: &str = "appupgrade.yaml";
pub const DEFAULT_PORT: u16 = 3007;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Package name to repository URL.
    pub packages: BTreeMap<String, String>,
    pub server: ServerSettings,
    pub log: LogSettings,
    pub github: GitHubSettings,
    pub package_database: PackageDatabaseSettings,
    pub swap: SwapSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Interface to bind; empty means all interfaces.
    pub bind: String,
    /// Origins allowed to call the API from a browser; `*` allows any.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: String::new(),
            allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LogSettings {
    /// Unknown levels fall back to `warn`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Warn,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    pub api_url: String,
    pub strict_decode: bool,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            strict_decode: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PackageDatabaseSettings {
    pub query_command: String,
    pub manager_command: String,
}

impl Default for PackageDatabaseSettings {
    fn default() -> Self {
        Self {
            query_command: DEFAULT_QUERY_COMMAND.to_string(),
            manager_command: DEFAULT_MANAGER_COMMAND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SwapSettings {
    pub step_timeout_secs: Option<u64>,
}

impl SwapSettings {
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }
}

impl Settings {
    /// Parse settings from YAML text. Empty text yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("Malformed settings")
    }

    /// Load settings from `explicit` if given, otherwise from the first
    /// `appupgrade.yaml` found in the home directory or the working directory.
    ///
    /// An explicit path must exist. When nothing is found by searching, the
    /// defaults apply and no package is monitored.
    pub fn load<R: Runtime>(runtime: &R, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !runtime.exists(path) {
                    bail!("Settings file {:?} does not exist", path);
                }
                path.to_path_buf()
            }
            None => match Self::search(runtime)? {
                Some(path) => path,
                None => {
                    debug!("No {} found, using defaults", SETTINGS_FILE_NAME);
                    return Ok(Self::default());
                }
            },
        };

        debug!("Loading settings from {:?}", path);
        let text = runtime
            .read_to_string(&path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        Self::from_yaml(&text).with_context(|| format!("Failed to load settings file {:?}", path))
    }

    fn search<R: Runtime>(runtime: &R) -> Result<Option<PathBuf>> {
        let mut candidates = Vec::new();
        if let Some(home) = runtime.home_dir() {
            candidates.push(home.join(SETTINGS_FILE_NAME));
        }
        candidates.push(runtime.current_dir()?.join(SETTINGS_FILE_NAME));

        Ok(candidates.into_iter().find(|path| runtime.exists(path)))
    }

    pub fn registry(&self) -> PackageRegistry {
        PackageRegistry::new(self.packages.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

/// Monitored packages and the repository each one is released from.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    repositories: HashMap<String, String>,
}

impl PackageRegistry {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut repositories = HashMap::new();
        for (name, url) in entries {
            let name = name.trim();
            if name.is_empty() {
                warn!("Ignoring monitored package with a blank name ({})", url);
                continue;
            }
            if let Some(previous) = repositories.insert(name.to_string(), url.trim().to_string()) {
                warn!(
                    "Package {} is listed more than once; {} replaces {}",
                    name,
                    url.trim(),
                    previous
                );
            }
        }
        Self { repositories }
    }

    /// Repository URL configured for `package`.
    pub fn lookup(&self, package: &PackageName) -> Option<&str> {
        self.repositories.get(package.as_str()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
