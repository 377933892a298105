use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use log::{debug, info};
use serde::Deserialize;

use super::types::{SeqAnchor, StatusFilter};
use crate::error_handling::types::ConfigError;

/// Application configuration, read from a TOML file.
///
/// The file is split into four sections; every key is optional and falls
/// back to its default.
///
/// ```toml
/// [system]
/// log_write = true
/// timeout = 300
/// seq_anchor = "start"
///
/// [log]
/// log_dir = "/var/log/httpd/"
/// file_prefix = "http_header_log"
/// file_suffix = "%Y-%m-%d"
///
/// [status]
/// get_status = "ALL"
///
/// [command]
/// tcpdump = "/sbin/tcpdump -i eth0 port 80 -Anns 2000 -l"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub system: SystemSection,
    pub log: LogSection,
    pub status: StatusSection,
    pub command: CommandSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemSection {
    /// Write to a dated log file when set, to stdout otherwise.
    pub log_write: bool,
    /// Seconds an unmatched request or response is kept before it is
    /// flushed as a timeout.
    pub timeout: u64,
    pub seq_anchor: SeqAnchor,
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            log_write: true,
            timeout: 300,
            seq_anchor: SeqAnchor::Start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub log_dir: PathBuf,
    pub file_prefix: String,
    /// `strftime` pattern appended to the file name; a new file is started
    /// whenever its rendering changes.
    pub file_suffix: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("/var/log/httpd/"),
            file_prefix: String::from("http_header_log"),
            file_suffix: String::from("%Y-%m-%d"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusSection {
    pub get_status: StatusFilter,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandSection {
    /// Shell command line producing the textual capture.
    pub tcpdump: String,
}

impl Default for CommandSection {
    fn default() -> Self {
        Self {
            tcpdump: String::from("/sbin/tcpdump -i eth0 port 80 -Anns 2000 -l"),
        }
    }
}

impl Config {
    /// Reads, parses and validates the configuration file at `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the configuration file at `path` without validating
    /// it, so values can still be overridden before [`validate`](Self::validate).
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        info!(
            "Loaded configuration from {} (timeout={}s, status={})",
            path.display(),
            config.system.timeout,
            config.status.get_status
        );
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    /// Checks the values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.system.timeout == 0 {
            return Err(ConfigError::NotInRange(String::from(
                "system.timeout must be at least 1 second",
            )));
        }
        if self.command.tcpdump.trim().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        if StrftimeItems::new(&self.log.file_suffix).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::BadFileSuffix(self.log.file_suffix.clone()));
        }
        if self.system.log_write && !self.log.log_dir.is_dir() {
            return Err(ConfigError::DirectoryDoesNotExist(format!(
                "log.log_dir {} is not a directory",
                self.log.log_dir.display()
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> chrono::Duration {
        i64::try_from(self.system.timeout)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}
