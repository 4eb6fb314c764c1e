//! External command execution for daemon-style providers
//!
//! Providers such as Ollama are driven through their own CLI (`ollama list`,
//! `ollama pull`). The [`CommandRunner`] trait lets sessions run those commands on the host
//! while tests substitute scripted responses.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors from running an external command
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program is not installed or not on PATH
    #[error("{program} is not installed or not recognized as a command")]
    NotFound { program: String },

    /// The program ran and reported failure
    #[error("`{command}` failed{}", exit_detail(.exit_code, .stderr))]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The program could not be started for another reason
    #[error("Failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

fn exit_detail(exit_code: &Option<i32>, stderr: &str) -> String {
    let mut detail = match exit_code {
        Some(code) => format!(" with exit code {}", code),
        None => " (terminated by signal)".to_string(),
    };
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        detail.push_str(": ");
        detail.push_str(stderr);
    }
    detail
}

impl CommandError {
    fn spawn(program: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            CommandError::NotFound {
                program: program.to_string(),
            }
        } else {
            CommandError::Io {
                program: program.to_string(),
                source,
            }
        }
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Render `program args...` for messages
pub fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs host commands on behalf of providers
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion capturing stdout and stderr. A non-zero exit is not an error.
    async fn output(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError>;

    /// Run to completion with the terminal attached, so the user sees the command's own
    /// progress. A non-zero exit is an error.
    async fn status(&self, program: &str, args: &[&str]) -> Result<(), CommandError>;

    /// Like [`output`](Self::output) but a non-zero exit is an error
    async fn checked_output(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput, CommandError> {
        let output = self.output(program, args).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(CommandError::Failed {
                command: display_command(program, args),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}

/// Runs commands as real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn output(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        debug!("Running `{}`", display_command(program, args));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CommandError::spawn(program, e))?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn status(&self, program: &str, args: &[&str]) -> Result<(), CommandError> {
        let command = display_command(program, args);
        debug!("Running `{}` attached to the terminal", command);

        let status = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| CommandError::spawn(program, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Failed {
                command,
                exit_code: status.code(),
                stderr: String::new(),
            })
        }
    }
}
