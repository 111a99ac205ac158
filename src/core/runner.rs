//! External tool invocation seam
//!
//! Every directory, DNS, keychain and ticket-cache query goes through a
//! [`CommandRunner`]. The real implementation lives in
//! `crate::platform::process`; tests substitute a scripted runner so no
//! subprocess is ever spawned.

use crate::config::{Settings, ToolPaths};
use crate::models::SecureString;
use crate::utils::{AdError, CommandError};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One external tool invocation
///
/// The optional stdin payload is a [`SecureString`] so that passwords handed
/// to a tool are zeroed once the invocation is dropped. It is never logged.
#[derive(Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    stdin: Option<SecureString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed `payload` to the tool's stdin
    pub fn stdin(mut self, payload: SecureString) -> Self {
        self.stdin = Some(payload);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// File name of the program, used in log lines and error messages
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_stdin(&self) -> Option<&SecureString> {
        self.stdin.as_ref()
    }
}

impl fmt::Debug for Invocation {
    // SECURITY: stdin may carry a password; only its presence is shown
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("stdin", &self.stdin.is_some())
            .finish()
    }
}

/// Captured result of a tool that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`CommandError::Exit`]
    pub fn check(self, program: &str) -> Result<CommandOutput, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CommandError::Exit {
                program: program.to_string(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs external tools
///
/// Implementations return `Ok` for any process that ran to completion,
/// whatever its exit status; `Err` is reserved for spawn failures, I/O
/// errors and timeouts.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;
}

/// A command runner paired with the settings that say which tools to run
#[derive(Clone)]
pub struct Tools {
    runner: Arc<dyn CommandRunner>,
    settings: Arc<Settings>,
}

impl Tools {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: Arc<Settings>) -> Self {
        Self { runner, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn paths(&self) -> &ToolPaths {
        &self.settings.tools
    }

    /// Run a tool on behalf of `operation`, accepting any exit status
    pub async fn run(
        &self,
        operation: &'static str,
        invocation: Invocation,
    ) -> Result<CommandOutput, AdError> {
        debug!(
            operation,
            program = %invocation.program().display(),
            args = ?invocation.get_args(),
            "running tool"
        );
        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(AdError::process(operation))?;
        debug!(operation, code = ?output.code, "tool finished");
        Ok(output)
    }

    /// Run a tool on behalf of `operation`, failing on a non-zero exit
    pub async fn run_checked(
        &self,
        operation: &'static str,
        invocation: Invocation,
    ) -> Result<CommandOutput, AdError> {
        let program = invocation.program_name();
        self.run(operation, invocation)
            .await?
            .check(&program)
            .map_err(AdError::process(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let invocation = Invocation::new("/usr/bin/kinit")
            .args(["-l", "10h"])
            .arg("--renewable")
            .stdin(SecureString::new("hunter2\n"));

        assert_eq!(invocation.program_name(), "kinit");
        assert_eq!(invocation.get_args(), ["-l", "10h", "--renewable"]);
        assert_eq!(invocation.get_stdin().map(|s| s.as_str()), Some("hunter2\n"));
    }

    #[test]
    fn test_invocation_debug_hides_stdin() {
        let invocation = Invocation::new("/usr/bin/kinit").stdin(SecureString::new("hunter2"));
        let debug_output = format!("{:?}", invocation);
        assert!(!debug_output.contains("hunter2"));
        assert!(debug_output.contains("stdin: true"));
    }

    #[test]
    fn test_output_check() {
        let ok = CommandOutput {
            code: Some(0),
            stdout: "fine".to_string(),
            stderr: String::new(),
        };
        assert!(ok.check("dig").is_ok());

        let failed = CommandOutput {
            code: Some(9),
            stdout: String::new(),
            stderr: "  connection timed out; no servers could be reached\n".to_string(),
        };
        match failed.check("dig") {
            Err(CommandError::Exit { program, code, stderr }) => {
                assert_eq!(program, "dig");
                assert_eq!(code, Some(9));
                assert_eq!(stderr, "connection timed out; no servers could be reached");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
