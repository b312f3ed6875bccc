//! File-based project locking for mutual exclusion.
//!
//! Two runs against one project would fight over the target folder and the
//! descriptor backup. The lock is advisory (`flock` on unix) and released when
//! the holder drops it or the process exits.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Project is locked by another build (PID {pid})\n  lock file: {}", .lock_path.display())]
    Contention { pid: String, lock_path: PathBuf },

    #[error("Failed to create lock directory: {0}")]
    CreateDir(#[source] io::Error),

    #[error("Failed to open lock file: {0}")]
    OpenFile(#[source] io::Error),

    #[error("Failed to acquire lock: {0}")]
    LockFailed(#[source] io::Error),
}

/// Held for the duration of one run
#[derive(Debug)]
pub struct ProjectLock {
    file: File,
    lock_path: PathBuf,
}

impl ProjectLock {
    /// Take the lock without blocking
    pub fn acquire(lock_path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(LockError::CreateDir)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(LockError::OpenFile)?;

        if let Err(err) = try_lock(&file) {
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(LockError::Contention {
                    pid: read_holder(lock_path),
                    lock_path: lock_path.to_path_buf(),
                });
            }
            return Err(LockError::LockFailed(err));
        }

        // Holder PID is informational only
        let _ = file
            .set_len(0)
            .and_then(|_| writeln!(file, "{}", std::process::id()));

        Ok(ProjectLock {
            file,
            lock_path: lock_path.to_path_buf(),
        })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        // The file descriptor closes right after, releasing the flock
    }
}

fn read_holder(lock_path: &Path) -> String {
    let mut contents = String::new();
    match File::open(lock_path).and_then(|mut f| f.read_to_string(&mut contents)) {
        Ok(_) if !contents.trim().is_empty() => contents.trim().to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
    use rustix::fs::{flock, FlockOperation};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
        .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> io::Result<()> {
    // Screensaver builds only run on macOS; elsewhere the in-process guard is all we have
    Ok(())
}
