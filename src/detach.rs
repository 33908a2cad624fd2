/// Relinquish the controlling terminal.
///
/// `TIOCNOTTY` may send SIGHUP to the caller (always, when the caller is the
/// session leader), so SIGHUP is held at `SIG_IGN` from before the device is
/// opened until after the ioctl, then put back to `SIG_DFL` so that commands
/// run afterwards see default handling.
use crate::signals::{IgnoredSignal, Restore};
use nix::sys::signal::Signal;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

nix::ioctl_none_bad!(tiocnotty, libc::TIOCNOTTY);

/// Errors that can occur while detaching.
#[derive(Debug)]
pub enum DetachError {
    /// Could not set SIGHUP to ignored.
    IgnoreHangup { source: nix::Error },
    /// Could not open the terminal device.
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The `TIOCNOTTY` ioctl failed.
    Ioctl { source: nix::Error },
    /// Could not put SIGHUP back to its default.
    RestoreHangup { source: nix::Error },
}

impl std::fmt::Display for DetachError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetachError::IgnoreHangup { source } => {
                write!(f, "sigaction error: {}", source)
            }
            DetachError::Open { path, source } => {
                write!(f, "error opening {}: {}", path.display(), source)
            }
            DetachError::Ioctl { source } => write!(f, "ioctl error: {}", source),
            DetachError::RestoreHangup { source } => {
                write!(f, "sigaction error: {}", source)
            }
        }
    }
}

impl std::error::Error for DetachError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DetachError::IgnoreHangup { source } => Some(source),
            DetachError::Open { source, .. } => Some(source),
            DetachError::Ioctl { source } => Some(source),
            DetachError::RestoreHangup { source } => Some(source),
        }
    }
}

/// Open `device` without letting it become our controlling terminal.
///
/// std opens with `O_CLOEXEC`, so the handle never reaches a child even if it
/// outlived the detach.
fn open_device(device: &Path) -> Result<File, DetachError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(device)
        .map_err(|e| DetachError::Open {
            path: device.to_path_buf(),
            source: e,
        })
}

/// Drop the controlling terminal reached through `device` (normally `/dev/tty`).
///
/// SIGHUP is ignored for the whole open + ioctl sequence. On success it is
/// restored to `SIG_DFL`. On failure the guard still restores it while the
/// error propagates.
pub fn relinquish_controlling_tty(device: &Path) -> Result<(), DetachError> {
    let hangup = IgnoredSignal::new(Signal::SIGHUP, Restore::Default)
        .map_err(|e| DetachError::IgnoreHangup { source: e })?;

    {
        let tty = open_device(device)?;
        tracing::debug!(device = %device.display(), fd = tty.as_raw_fd(), "terminal opened");

        // SAFETY: `tty` is an open descriptor for the lifetime of this call and
        // TIOCNOTTY takes no argument.
        unsafe { tiocnotty(tty.as_raw_fd()) }.map_err(|e| DetachError::Ioctl { source: e })?;
    }

    tracing::debug!(signal = %hangup.signal(), "controlling terminal relinquished");
    hangup
        .restore()
        .map_err(|e| DetachError::RestoreHangup { source: e })
}
