/// Scoped signal dispositions.
///
/// `IgnoredSignal` sets a signal to `SIG_IGN` on creation and puts a chosen
/// disposition back when it is restored or dropped. Only the built-in
/// `SIG_IGN`/`SIG_DFL` handlers or a previously installed action are ever
/// installed here, which keeps the `unsafe` `sigaction` calls sound.
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

/// What to put back when the guard ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restore {
    /// `SIG_DFL`, whatever was installed before.
    Default,
    /// The action that was installed before the guard.
    Previous,
}

/// Guard holding `signal` at `SIG_IGN` until restored or dropped.
#[derive(Debug)]
pub struct IgnoredSignal {
    signal: Signal,
    restore_to: SigAction,
    active: bool,
}

impl IgnoredSignal {
    /// Ignore `signal` for the lifetime of the returned guard.
    pub fn new(signal: Signal, restore: Restore) -> nix::Result<Self> {
        let previous = install(signal, SigHandler::SigIgn)?;
        tracing::debug!(%signal, ?restore, "signal ignored");

        let restore_to = match restore {
            Restore::Default => action(SigHandler::SigDfl),
            Restore::Previous => previous,
        };
        Ok(Self {
            signal,
            restore_to,
            active: true,
        })
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Put the saved disposition back, reporting failure to the caller.
    pub fn restore(mut self) -> nix::Result<()> {
        self.active = false;
        self.reinstate()
    }

    fn reinstate(&self) -> nix::Result<()> {
        // SAFETY: `restore_to` is either SIG_DFL or an action the process had
        // already installed for this signal.
        unsafe { sigaction(self.signal, &self.restore_to) }?;
        tracing::debug!(signal = %self.signal, "signal disposition restored");
        Ok(())
    }
}

impl Drop for IgnoredSignal {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.reinstate() {
                tracing::warn!(signal = %self.signal, error = %e, "failed to restore signal disposition");
            }
        }
    }
}

fn action(handler: SigHandler) -> SigAction {
    SigAction::new(handler, SaFlags::empty(), SigSet::empty())
}

fn install(signal: Signal, handler: SigHandler) -> nix::Result<SigAction> {
    // SAFETY: only the built-in SIG_IGN and SIG_DFL handlers go through here.
    unsafe { sigaction(signal, &action(handler)) }
}

/// Current handler for `signal`, without changing it.
#[cfg(test)]
pub fn current_handler(signal: Signal) -> nix::Result<SigHandler> {
    // Swap in SIG_DFL and immediately put the old action back; POSIX offers
    // no read-only query through nix.
    let old = install(signal, SigHandler::SigDfl)?;
    // SAFETY: reinstalls the action that was in place a moment ago.
    unsafe { sigaction(signal, &old) }?;
    Ok(old.handler())
}

/// Serializes tests that touch SIGHUP, SIGINT or SIGQUIT: dispositions are
/// process-wide and the harness runs tests on parallel threads.
#[cfg(test)]
pub fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
