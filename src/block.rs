/// Block forever without spinning.
///
/// Waits on a process-private POSIX semaphore that starts at zero and that
/// nobody ever posts, leaving the process asleep until a signal ends it.
use std::cell::UnsafeCell;
use std::io;
use std::mem::MaybeUninit;

/// Errors that can occur while blocking.
#[derive(Debug)]
pub enum BlockError {
    Init { source: io::Error },
    Wait { source: io::Error },
}

impl std::fmt::Display for BlockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockError::Init { source } => write!(f, "sem_init error: {}", source),
            BlockError::Wait { source } => write!(f, "sem_wait error: {}", source),
        }
    }
}

impl std::error::Error for BlockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlockError::Init { source } => Some(source),
            BlockError::Wait { source } => Some(source),
        }
    }
}

/// Unnamed, process-private counting semaphore.
///
/// Boxed so the `sem_t` never moves after `sem_init`.
pub struct Semaphore {
    inner: Box<UnsafeCell<MaybeUninit<libc::sem_t>>>,
}

impl Semaphore {
    pub fn new(value: u32) -> io::Result<Self> {
        let inner = Box::new(UnsafeCell::new(MaybeUninit::<libc::sem_t>::uninit()));
        // SAFETY: the pointer targets heap storage that lives as long as `Self`;
        // pshared = 0 keeps the semaphore private to this process.
        let r = unsafe { libc::sem_init(inner.get().cast(), 0, value) };
        if r != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { inner })
    }

    fn as_ptr(&self) -> *mut libc::sem_t {
        self.inner.get().cast()
    }

    /// Decrement, sleeping while the count is zero. Not retried on `EINTR`.
    pub fn wait(&self) -> io::Result<()> {
        // SAFETY: initialized in `new`, destroyed only in `drop`.
        if unsafe { libc::sem_wait(self.as_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn post(&self) -> io::Result<()> {
        // SAFETY: initialized in `new`, destroyed only in `drop`.
        if unsafe { libc::sem_post(self.as_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // SAFETY: initialized in `new`; `&mut self` means no waiter remains.
        unsafe {
            libc::sem_destroy(self.as_ptr());
        }
    }
}

/// Sleep until a signal ends the process.
///
/// Only returns if the wait somehow completes; an interrupted or failed wait
/// is reported as an error, not retried.
pub fn block_forever() -> Result<(), BlockError> {
    let sem = Semaphore::new(0).map_err(|e| BlockError::Init { source: e })?;
    tracing::debug!("blocking until signaled");
    sem.wait().map_err(|e| BlockError::Wait { source: e })
}
