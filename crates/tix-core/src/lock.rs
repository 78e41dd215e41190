use crate::error::ErrorCode;
use std::{
    sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError},
    thread,
    time::{Duration, Instant},
};

/// Delay between lock attempts while waiting for a contended guard.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// In-process lock errors for store records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    Timeout {
        resource: &'static str,
        waited: Duration,
    },
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::StoreUnavailable,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    #[must_use]
    pub const fn waited(&self) -> Duration {
        match self {
            Self::Timeout { waited, .. } => *waited,
        }
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { resource, waited } => write!(
                f,
                "{}: {resource} lock timed out after {waited:?}",
                self.code().code()
            ),
        }
    }
}

impl std::error::Error for LockError {}

/// Poll `attempt` until it yields a guard or `timeout` elapses.
/// Poisoned locks are recovered.
fn acquire<G>(
    resource: &'static str,
    timeout: Duration,
    mut attempt: impl FnMut() -> Result<G, TryLockError<G>>,
) -> Result<G, LockError> {
    let start = Instant::now();
    loop {
        match attempt() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {}
        }

        if start.elapsed() >= timeout {
            return Err(LockError::Timeout {
                resource,
                waited: start.elapsed(),
            });
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Acquire `mutex` within `timeout`.
///
/// # Errors
///
/// Returns [`LockError::Timeout`] when the lock stays contended.
pub fn lock_mutex<'a, T>(
    mutex: &'a Mutex<T>,
    resource: &'static str,
    timeout: Duration,
) -> Result<MutexGuard<'a, T>, LockError> {
    acquire(resource, timeout, || mutex.try_lock())
}

/// Acquire a shared guard on `lock` within `timeout`.
///
/// # Errors
///
/// Returns [`LockError::Timeout`] when a writer holds the lock too long.
pub fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    resource: &'static str,
    timeout: Duration,
) -> Result<RwLockReadGuard<'a, T>, LockError> {
    acquire(resource, timeout, || lock.try_read())
}

/// Acquire an exclusive guard on `lock` within `timeout`.
///
/// # Errors
///
/// Returns [`LockError::Timeout`] when readers or a writer hold the lock too long.
pub fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    resource: &'static str,
    timeout: Duration,
) -> Result<RwLockWriteGuard<'a, T>, LockError> {
    acquire(resource, timeout, || lock.try_write())
}
