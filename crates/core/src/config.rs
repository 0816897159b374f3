//! CPU and logging configuration, loaded from JSON.
//!
//! Every field is optional in the JSON form; missing fields take their defaults.
//!
//! ```json
//! {
//!   "jump_indirect_page_wrap": false,
//!   "log": { "level": "warn", "cpu": "debug", "rate_limit": 0, "file": "cpu.log" }
//! }
//! ```

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Level for categories without their own override.
    pub level: LogLevel,
    pub cpu: Option<LogLevel>,
    pub bus: Option<LogLevel>,
    pub fault: Option<LogLevel>,
    /// Messages per second per category, 0 for unlimited.
    pub rate_limit: usize,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Off,
            cpu: None,
            bus: None,
            fault: None,
            rate_limit: 60,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Reproduce the NMOS `JMP ($xxFF)` bug: the pointer's high byte is read
    /// from the start of the same page instead of the next page.
    pub jump_indirect_page_wrap: bool,
    pub log: LogSettings,
}

impl CpuConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}
