//! Registry configuration.

use crate::error::{RegistryError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Registry configuration.
///
/// Can be built in code or loaded from a JSON file; missing fields take
/// their defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Path of the subscription table file.
    pub subscriptions_path: PathBuf,

    /// Path of the alias table file.
    pub aliases_path: PathBuf,

    /// Cooldown for listing subjects and aliases, in seconds.
    /// Default: 60
    pub list_cooldown_secs: u64,

    /// Cooldown for per-actor scans (unsubscribe-all, my-notices), in seconds.
    /// Default: 30
    pub scan_cooldown_secs: u64,

    /// Interval between background syncs, in seconds. Zero disables the
    /// sync daemon.
    /// Default: 900
    pub sync_interval_secs: u64,

    /// Emit trace messages for key resolution.
    pub verbose: bool,

    /// Actors that bypass cooldowns.
    pub owners: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            subscriptions_path: PathBuf::from("./subscriptions.db"),
            aliases_path: PathBuf::from("./aliases.db"),
            list_cooldown_secs: 60,
            scan_cooldown_secs: 30,
            sync_interval_secs: 15 * 60,
            verbose: false,
            owners: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Config with both tables placed in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            subscriptions_path: dir.join("subscriptions.db"),
            aliases_path: dir.join("aliases.db"),
            ..Default::default()
        }
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the two tables are distinct files.
    pub fn validate(&self) -> Result<()> {
        if self.subscriptions_path == self.aliases_path {
            return Err(RegistryError::Config(format!(
                "subscriptions and aliases share one file: {}",
                self.subscriptions_path.display()
            )));
        }
        Ok(())
    }

    pub fn list_cooldown(&self) -> Duration {
        Duration::from_secs(self.list_cooldown_secs)
    }

    pub fn scan_cooldown(&self) -> Duration {
        Duration::from_secs(self.scan_cooldown_secs)
    }

    /// Sync interval, or `None` if background sync is disabled.
    pub fn sync_interval(&self) -> Option<Duration> {
        (self.sync_interval_secs > 0).then(|| Duration::from_secs(self.sync_interval_secs))
    }
}
