use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::process::{Availability, ProcessError, ProcessOutput};

/// Per-invocation process settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Directory the process runs in; inherits the current one when unset.
    pub working_dir: Option<PathBuf>,
}

/// Abstraction over external process execution for testability.
///
/// Production code uses [`RealRunner`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion and capture its output. A non-zero exit
    /// is not an error here; callers inspect [`ProcessOutput::exit_code`].
    async fn execute(
        &self,
        command: &str,
        args: &[String],
        options: &ExecOptions,
    ) -> Result<ProcessOutput, ProcessError>;

    /// Look `command` up on PATH.
    fn is_available(&self, command: &str) -> Availability;
}

/// Runs processes with `tokio::process`. The child is killed when the
/// cancellation token fires.
#[derive(Debug, Clone, Default)]
pub struct RealRunner {
    cancel: CancellationToken,
}

impl RealRunner {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl ProcessRunner for RealRunner {
    async fn execute(
        &self,
        command: &str,
        args: &[String],
        options: &ExecOptions,
    ) -> Result<ProcessOutput, ProcessError> {
        use std::process::Stdio;

        if self.cancel.is_cancelled() {
            return Err(ProcessError::Cancelled {
                program: command.to_owned(),
            });
        }

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &options.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(program = command, ?args, "spawning process");
        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::NotFound {
                    program: command.to_owned(),
                    source: e,
                }
            } else {
                ProcessError::Spawn {
                    program: command.to_owned(),
                    source: e,
                }
            }
        })?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|e| ProcessError::Wait {
                program: command.to_owned(),
                source: e,
            })?,
            () = self.cancel.cancelled() => {
                tracing::warn!(program = command, "cancelled, killing process");
                return Err(ProcessError::Cancelled {
                    program: command.to_owned(),
                });
            }
        };

        let result = ProcessOutput {
            // arch-lint: allow(no-silent-result-drop) reason="killed by a signal, no exit code, and -1 is never a success"
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(program = command, exit_code = result.exit_code, "process finished");
        Ok(result)
    }

    fn is_available(&self, command: &str) -> Availability {
        match which::which(command) {
            Ok(path) => Availability {
                available: true,
                path: Some(path),
            },
            Err(e) => {
                tracing::debug!(command, error = %e, "command not on PATH");
                Availability::default()
            }
        }
    }
}
