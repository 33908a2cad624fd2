/// Run the given command through the shell and turn its completion into an
/// exit code the way shells do: `N` for a normal exit, `128 + S` for death by
/// signal `S`.
use crate::signals::{IgnoredSignal, Restore};
use nix::sys::signal::Signal;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Errors that can occur while running the command.
#[derive(Debug)]
pub enum RunError {
    /// Failed to start the interpreter.
    Spawn {
        shell: PathBuf,
        source: std::io::Error,
    },
    /// Failed to ignore SIGINT/SIGQUIT while waiting.
    Signal { source: nix::Error },
    /// Failed to wait for the child.
    Wait { source: std::io::Error },
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Spawn { shell, source } => {
                write!(f, "failed to spawn {}: {}", shell.display(), source)
            }
            RunError::Signal { source } => write!(f, "sigaction error: {}", source),
            RunError::Wait { source } => write!(f, "wait error: {}", source),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Spawn { source, .. } => Some(source),
            RunError::Signal { source } => Some(source),
            RunError::Wait { source } => Some(source),
        }
    }
}

/// Map a final wait status to a shell-style exit code.
///
/// Panics on anything other than an exit or a terminating signal: a blocking
/// wait only returns once the child is gone.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        code
    } else if let Some(signal) = status.signal() {
        128 + signal
    } else {
        unreachable!("wait returned a non-final status: {status:?}")
    }
}

/// Run `command` as `<shell> -c <command>` and wait for it.
///
/// The child inherits stdio. Like `system(3)`, SIGINT and SIGQUIT are ignored
/// here (not in the child) while waiting, so an interrupt from the keyboard is
/// the child's to handle and shows up in its status.
pub fn run_given_command(shell: &Path, command: &str) -> Result<i32, RunError> {
    tracing::debug!(shell = %shell.display(), command, "running command");

    let mut child = Command::new(shell)
        .arg("-c")
        .arg(command)
        .spawn()
        .map_err(|e| RunError::Spawn {
            shell: shell.to_path_buf(),
            source: e,
        })?;

    let interrupt = IgnoredSignal::new(Signal::SIGINT, Restore::Previous)
        .map_err(|e| RunError::Signal { source: e })?;
    let quit = IgnoredSignal::new(Signal::SIGQUIT, Restore::Previous)
        .map_err(|e| RunError::Signal { source: e })?;

    let status = child.wait().map_err(|e| RunError::Wait { source: e })?;

    quit.restore().map_err(|e| RunError::Signal { source: e })?;
    interrupt
        .restore()
        .map_err(|e| RunError::Signal { source: e })?;

    let code = exit_code(status);
    tracing::debug!(pid = child.id(), %status, code, "command finished");
    Ok(code)
}
