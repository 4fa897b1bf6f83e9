//! Engine configuration

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{FieldTestError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Storage root for curves, forms and settings
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Entries kept per recent-value field
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    #[serde(default)]
    pub staleness: StalenessConfig,

    /// Hex SHA-256 of the admin passcode, used until one is stored
    #[serde(default = "default_admin_digest")]
    pub admin_passcode_sha256: String,

    /// Hex SHA-256 of the master passcode (passcode changes)
    #[serde(default = "default_master_digest")]
    pub master_passcode_sha256: String,
}

/// Age thresholds for flagging idle Incomplete forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StalenessConfig {
    #[serde(default = "default_low_hours")]
    pub low_hours: i64,

    #[serde(default = "default_medium_hours")]
    pub medium_hours: i64,

    #[serde(default = "default_high_hours")]
    pub high_hours: i64,
}

impl StalenessConfig {
    pub fn low(&self) -> Duration {
        Duration::hours(self.low_hours)
    }

    pub fn medium(&self) -> Duration {
        Duration::hours(self.medium_hours)
    }

    pub fn high(&self) -> Duration {
        Duration::hours(self.high_hours)
    }
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            low_hours: default_low_hours(),
            medium_hours: default_medium_hours(),
            high_hours: default_high_hours(),
        }
    }
}

// Defaults
fn default_base_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fieldtests")
}
fn default_recent_limit() -> usize { 5 }
fn default_low_hours() -> i64 { 24 }
fn default_medium_hours() -> i64 { 72 }
fn default_high_hours() -> i64 { 168 }
fn default_admin_digest() -> String {
    "4dea5c7cb70f50322ec9d734aa4aa078be9227c05251e18991c596f387552370".to_string()
}
fn default_master_digest() -> String {
    "475368189e17ec9d12cf43f873f4ba27b0ae9ccbd0686fa21f5caad89ed57243".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            recent_limit: default_recent_limit(),
            staleness: StalenessConfig::default(),
            admin_passcode_sha256: default_admin_digest(),
            master_passcode_sha256: default_master_digest(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.recent_limit == 0 {
            return Err(FieldTestError::Config("recent_limit must be at least 1".into()));
        }
        let s = &self.staleness;
        if !(0 < s.low_hours && s.low_hours <= s.medium_hours && s.medium_hours <= s.high_hours) {
            return Err(FieldTestError::Config(
                "staleness thresholds must be positive and ascending".into(),
            ));
        }
        Ok(())
    }
}
