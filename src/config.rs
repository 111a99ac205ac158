//! Runtime settings
//!
//! Settings are layered: built-in defaults from [`crate::constants`], then an
//! optional JSON file, then environment overrides. The tool path table is
//! what lets tests (and unusual installs) point every external tool
//! somewhere else.

use crate::constants::*;
use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Location of every external tool the core shells out to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub dsconfigad: PathBuf,
    pub dscl: PathBuf,
    pub scutil: PathBuf,
    pub dig: PathBuf,
    pub klist: PathBuf,
    pub kinit: PathBuf,
    pub security: PathBuf,
    pub ldapsearch: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            dsconfigad: PathBuf::from(DSCONFIGAD_PATH),
            dscl: PathBuf::from(DSCL_PATH),
            scutil: PathBuf::from(SCUTIL_PATH),
            dig: PathBuf::from(DIG_PATH),
            klist: PathBuf::from(KLIST_PATH),
            kinit: PathBuf::from(KINIT_PATH),
            security: PathBuf::from(SECURITY_PATH),
            ldapsearch: PathBuf::from(LDAPSEARCH_PATH),
        }
    }
}

/// Everything configurable about macad
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub tools: ToolPaths,
    /// Bound on each external tool invocation
    pub command_timeout_secs: u64,
    /// Lifetime passed to kinit (`-l`)
    pub ticket_lifetime: String,
    /// Keychain creator code for stored passwords
    pub service_label: String,
    /// Explicit keychain file; `None` uses the user's default keychain
    pub keychain: Option<PathBuf>,
    /// Tickets ending within this many minutes are reported as expiring
    pub renewal_window_mins: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            ticket_lifetime: DEFAULT_TICKET_LIFETIME.to_string(),
            service_label: KEYCHAIN_SERVICE_LABEL.to_string(),
            keychain: None,
            renewal_window_mins: DEFAULT_RENEWAL_WINDOW_MINS,
        }
    }
}

impl Settings {
    /// Load settings from an optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|var| std::env::var(var).ok())?;
        Ok(settings)
    }

    /// Read a JSON settings file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            self.command_timeout_secs = match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Env {
                        var: ENV_TIMEOUT_SECS,
                        value,
                    })
                }
            };
        }

        if let Some(value) = lookup(ENV_TICKET_LIFETIME) {
            let trimmed = value.trim();
            if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
                return Err(ConfigError::Env {
                    var: ENV_TICKET_LIFETIME,
                    value,
                });
            }
            self.ticket_lifetime = trimmed.to_string();
        }

        if let Some(value) = lookup(ENV_KEYCHAIN) {
            let trimmed = value.trim();
            self.keychain = if trimmed.is_empty() {
                None
            } else {
                Some(PathBuf::from(trimmed))
            };
        }

        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn renewal_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.renewal_window_mins as i64)
    }
}
