//! Advisory lock around store writes

use crate::io::error::StoreError;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Default retry budget for store locks
pub const DEFAULT_LOCK_RETRIES: u32 = 5;

/// First backoff step; doubles on every retry
const BASE_BACKOFF: Duration = Duration::from_millis(50);

/// Exclusive lock on a store's lock file, released on drop
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

/// Take the store lock at `path`, retrying with exponential backoff.
///
/// # Errors
///
/// Returns `StoreError::LockTimeout` if another holder keeps the lock through
/// `max_retries` retries, or `StoreError::Io` if the lock file cannot be
/// opened or locked.
pub fn acquire_lock(path: &Path, max_retries: u32) -> Result<StoreLock, StoreError> {
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut delay = BASE_BACKOFF;
    for attempt in 0..=max_retries {
        let locked = try_lock(&file).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if locked {
            return Ok(StoreLock { file });
        }
        if attempt < max_retries {
            std::thread::sleep(delay);
            delay *= 2;
        }
    }

    Err(StoreError::LockTimeout {
        path: path.to_path_buf(),
        retries: max_retries,
    })
}

/// Ok(false) when someone else holds the lock
#[cfg(unix)]
fn try_lock(file: &File) -> std::io::Result<bool> {
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == libc::EWOULDBLOCK || code == libc::EAGAIN => Ok(false),
        _ => Err(err),
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

// No advisory locking here; the atomic rename keeps readers consistent.
#[cfg(not(unix))]
fn try_lock(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
