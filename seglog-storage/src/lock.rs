//! Advisory cross-process lock.
//!
//! The lock for `target` is the link `<target>.lock`, created atomically.
//! The holder also creates a uniquely named marker directory under the
//! system temp directory and records its path in `<target>.lock-signal`.
//! A lock whose marker no longer exists was left behind by a holder that
//! crashed (or by a reboot, which clears the temp directory) and may be
//! reclaimed. So may a lock whose signal file is still missing after a
//! short grace period, which is what a crash between creating the link and
//! writing the signal file leaves behind.
//!
//! The lock only detects a second writer. A process that skips
//! [`FileMutex::acquire`] is not stopped by it.

use crate::error::StorageError;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Suffix of the lock link.
pub const LOCK_SUFFIX: &str = ".lock";

/// Suffix of the signal file.
pub const SIGNAL_SUFFIX: &str = ".lock-signal";

/// Name prefix of marker directories.
pub const MARKER_PREFIX: &str = "lock-signal-";

/// How long a lock without a signal file is given before it is reclaimed.
const SIGNAL_GRACE: Duration = Duration::from_millis(50);

/// Held advisory lock on a target path.
#[derive(Debug)]
pub struct FileMutex {
    target: PathBuf,
    link: PathBuf,
    signal: PathBuf,
    marker: PathBuf,
    locked: bool,
}

impl FileMutex {
    /// Tries to acquire the lock on `target`.
    ///
    /// Returns `Ok(None)` if a live process holds the lock.
    pub fn acquire(target: impl AsRef<Path>) -> Result<Option<Self>, StorageError> {
        let target = target.as_ref().to_path_buf();
        let link = with_suffix(&target, LOCK_SUFFIX);
        let signal = with_suffix(&target, SIGNAL_SUFFIX);

        for attempt in 0..3 {
            match create_link(&target, &link) {
                Ok(()) => return Self::publish(target, link, signal).map(Some),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    match holder_status(&signal)? {
                        Holder::Alive => return Ok(None),
                        Holder::Gone => {}
                        Holder::Unknown if attempt == 0 => {
                            // The holder may not have written its signal file yet.
                            std::thread::sleep(SIGNAL_GRACE);
                            continue;
                        }
                        Holder::Unknown => {
                            tracing::warn!(
                                "Lock signal {} is still missing",
                                signal.display()
                            );
                        }
                    }
                    tracing::warn!("Reclaiming stale lock {}", link.display());
                    remove_ignoring_missing(std::fs::remove_file(&link))?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Creates the marker and signal file for a freshly created link.
    ///
    /// On failure the link is removed again so the target is not left locked.
    fn publish(target: PathBuf, link: PathBuf, signal: PathBuf) -> Result<Self, StorageError> {
        let marker = marker_root().join(format!("{}{}", MARKER_PREFIX, Uuid::new_v4().simple()));

        let published = std::fs::create_dir(&marker)
            .and_then(|()| std::fs::write(&signal, marker.to_string_lossy().as_bytes()));
        if let Err(e) = published {
            tracing::warn!("Failed to publish lock {}: {}", link.display(), e);
            let _ = std::fs::remove_dir(&marker);
            let _ = std::fs::remove_file(&signal);
            let _ = std::fs::remove_file(&link);
            return Err(e.into());
        }

        tracing::debug!("Acquired lock {}", link.display());
        Ok(Self {
            target,
            link,
            signal,
            marker,
            locked: true,
        })
    }

    /// Returns the locked target path.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Returns the marker directory recorded for this holder.
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Returns whether the lock is still held.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Releases the lock. Calling it again is a no-op.
    pub fn release(&mut self) -> Result<(), StorageError> {
        if !self.locked {
            return Ok(());
        }

        let recorded = match std::fs::read_to_string(&self.signal) {
            Ok(content) => PathBuf::from(content.trim()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::CorruptedLock(self.signal.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        if !in_marker_namespace(&recorded) {
            return Err(StorageError::CorruptedLock(self.signal.clone()));
        }

        self.locked = false;
        remove_ignoring_missing(std::fs::remove_dir(&self.marker))?;

        if recorded != self.marker {
            // Our marker went away and someone else reclaimed the lock.
            tracing::warn!(
                "Lock {} is now held by another owner, leaving it in place",
                self.link.display()
            );
            return Ok(());
        }

        remove_ignoring_missing(std::fs::remove_file(&self.signal))?;
        remove_ignoring_missing(std::fs::remove_file(&self.link))?;
        tracing::debug!("Released lock {}", self.link.display());
        Ok(())
    }
}

impl Drop for FileMutex {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("Failed to release lock {}: {}", self.link.display(), e);
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn marker_root() -> PathBuf {
    std::env::temp_dir()
}

fn in_marker_namespace(path: &Path) -> bool {
    path.parent() == Some(marker_root().as_path())
        && path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with(MARKER_PREFIX))
}

/// State of the process recorded in a signal file.
enum Holder {
    Alive,
    Gone,
    /// No signal file.
    Unknown,
}

/// Reads the signal file and checks whether the recorded marker exists.
fn holder_status(signal: &Path) -> Result<Holder, StorageError> {
    match std::fs::read_to_string(signal) {
        Ok(content) if Path::new(content.trim()).exists() => Ok(Holder::Alive),
        Ok(_) => Ok(Holder::Gone),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Holder::Unknown),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn create_link(target: &Path, link: &Path) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(link)?;
    file.write_all(target.to_string_lossy().as_bytes())
}

fn remove_ignoring_missing(result: std::io::Result<()>) -> Result<(), StorageError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("snapshot");

        let mut lock = FileMutex::acquire(&target).unwrap().unwrap();
        assert!(lock.is_locked());
        assert!(lock.marker().is_dir());
        assert!(dir.path().join("snapshot.lock-signal").exists());
        assert!(std::fs::symlink_metadata(dir.path().join("snapshot.lock")).is_ok());

        let marker = lock.marker().to_path_buf();
        lock.release().unwrap();
        assert!(!lock.is_locked());
        assert!(!marker.exists());
        assert!(!dir.path().join("snapshot.lock-signal").exists());
        assert!(std::fs::symlink_metadata(dir.path().join("snapshot.lock")).is_err());

        // Idempotent.
        lock.release().unwrap();
    }

    #[test]
    fn test_live_lock_is_not_acquired() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("snapshot");

        let first = FileMutex::acquire(&target).unwrap().unwrap();
        assert!(FileMutex::acquire(&target).unwrap().is_none());

        // Still held by the first owner.
        assert!(first.marker().is_dir());
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("snapshot");

        let first = FileMutex::acquire(&target).unwrap().unwrap();
        assert!(FileMutex::acquire(&target).unwrap().is_none());

        std::fs::remove_dir(first.marker()).unwrap();
        let third = FileMutex::acquire(&target).unwrap().unwrap();
        assert_ne!(first.marker(), third.marker());

        // The displaced owner must not remove the new owner's lock.
        drop(first);
        assert!(third.marker().is_dir());
        assert!(FileMutex::acquire(&target).unwrap().is_none());
    }

    #[test]
    fn test_missing_signal_is_reclaimed_after_grace() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("snapshot");
        create_link(&target, &with_suffix(&target, LOCK_SUFFIX)).unwrap();

        let lock = FileMutex::acquire(&target).unwrap().unwrap();
        assert!(lock.marker().is_dir());
        assert!(FileMutex::acquire(&target).unwrap().is_none());
    }

    #[test]
    fn test_failed_publish_leaves_no_lock() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("snapshot");
        let signal = with_suffix(&target, SIGNAL_SUFFIX);
        std::fs::create_dir(&signal).unwrap();

        assert!(matches!(
            FileMutex::acquire(&target),
            Err(StorageError::Io(_))
        ));
        assert!(std::fs::symlink_metadata(with_suffix(&target, LOCK_SUFFIX)).is_err());

        std::fs::remove_dir(&signal).unwrap();
        let lock = FileMutex::acquire(&target).unwrap().unwrap();
        assert!(lock.is_locked());
    }

    #[test]
    fn test_release_rejects_foreign_signal() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("snapshot");
        let signal = with_suffix(&target, SIGNAL_SUFFIX);

        let mut lock = FileMutex::acquire(&target).unwrap().unwrap();
        let original = std::fs::read(&signal).unwrap();
        std::fs::write(&signal, b"/not/a/marker").unwrap();

        assert!(matches!(
            lock.release(),
            Err(StorageError::CorruptedLock(_))
        ));
        assert!(lock.is_locked());

        std::fs::write(&signal, original).unwrap();
        lock.release().unwrap();
    }
}
