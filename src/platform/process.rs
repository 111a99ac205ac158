//! Subprocess runner backed by `tokio::process`
//!
//! Each invocation is bounded by a timeout; on expiry the child is killed
//! (`kill_on_drop`) and the call fails with [`CommandError::Timeout`].

use crate::core::runner::{CommandOutput, CommandRunner, Invocation};
use crate::utils::CommandError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let program = invocation.program_name();

        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.get_args())
            .stdin(if invocation.get_stdin().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdin_payload = invocation.get_stdin();
        let mut stdin = child.stdin.take();
        let name = program.clone();

        let interaction = async move {
            if let (Some(payload), Some(pipe)) = (stdin_payload, stdin.as_mut()) {
                let written = match pipe.write_all(payload.as_str().as_bytes()).await {
                    Ok(()) => pipe.shutdown().await,
                    Err(err) => Err(err),
                };
                // A tool may exit (or stop reading) before taking its input;
                // its status and stderr still say what happened
                match written {
                    Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                        debug!(program = %name, "tool closed stdin early");
                    }
                    other => other?,
                }
            }
            // Close our end so tools reading to EOF can finish
            drop(stdin);
            child.wait_with_output().await
        };

        let output = timeout(self.timeout, interaction)
            .await
            .map_err(|_| CommandError::Timeout {
                program: program.clone(),
                after: self.timeout,
            })?
            .map_err(|source| CommandError::Io {
                program: program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
