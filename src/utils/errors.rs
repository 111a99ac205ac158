//! Error types for macad
//!
//! All error types use thiserror for clean error handling.
//! SECURITY: Error messages MUST NOT contain passwords or sensitive data.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for identity operations
///
/// Every variant names the operation that failed so callers can decide
/// whether to fall back to interactive credential entry.
#[derive(Debug, thiserror::Error)]
pub enum AdError {
    #[error("{operation}: computer is not bound to Active Directory")]
    NotBound { operation: &'static str },

    #[error("{operation}: domain '{domain}' is unreachable")]
    DomainUnreachable {
        operation: &'static str,
        domain: String,
    },

    #[error("{operation}: malformed principal '{input}'")]
    MalformedPrincipal {
        operation: &'static str,
        input: String,
    },

    #[error("{operation}: {source}")]
    ProcessFailure {
        operation: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("{operation} for '{principal}' failed: {detail}")]
    CredentialStoreFailure {
        operation: &'static str,
        principal: String,
        detail: String,
    },
}

impl AdError {
    /// Build a closure that wraps a [`CommandError`] for `operation`
    pub fn process(operation: &'static str) -> impl FnOnce(CommandError) -> AdError {
        move |source| AdError::ProcessFailure { operation, source }
    }

    pub fn malformed(operation: &'static str, input: impl Into<String>) -> Self {
        AdError::MalformedPrincipal {
            operation,
            input: input.into(),
        }
    }

    pub fn is_not_bound(&self) -> bool {
        matches!(self, AdError::NotBound { .. })
    }
}

/// Errors from a single external tool invocation
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("{program} exited with {}: {stderr}", describe_status(*code))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unexpected output from {program}: {detail}")]
    Output { program: String, detail: String },
}

fn describe_status(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

/// Errors from loading settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },
}
