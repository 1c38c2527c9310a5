//! File locking and atomic writes for the linksy data directory
//!
//! Every store in linksy is a plain file under the data directory. Writers
//! serialize on a sibling `<file>.lock` using fs2/flock, and whole-file
//! rewrites go through temp file + rename so readers never see a torn file.
//! Appends to the completion ledger rely on the lock to keep sequence
//! numbers monotonic.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// How long a store waits for its lock before giving up with `LockFailed`.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const RETRY_EVERY: Duration = Duration::from_millis(20);

/// Another process or handle holds the lock.
fn held_elsewhere(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // fs2 reports Windows sharing violations as "Other".
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// Path of the lock file guarding `path`.
pub fn lock_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

/// Exclusive hold on a `<store>.lock` file, released on drop.
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Wait up to `timeout_ms` for the lock at `lock_path`.
    ///
    /// Blocks the calling thread between attempts; async callers go through
    /// `spawn_blocking`.
    pub fn acquire(lock_path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let lock_path = lock_path.as_ref();
        if let Some(dir) = lock_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(FileLock { file }),
                Err(err) if held_elsewhere(&err) => {
                    if Instant::now() >= deadline {
                        tracing::warn!(lock = %lock_path.display(), timeout_ms, "store lock timed out");
                        return Err(Error::LockFailed(lock_path.to_path_buf()));
                    }
                    std::thread::sleep(RETRY_EVERY);
                }
                Err(err) => return Err(Error::Io(err)),
            }
        }
    }

    /// Lock guarding a store file such as `links.json` or `completions.jsonl`.
    pub fn for_file(store: &Path) -> Result<Self> {
        Self::acquire(lock_path_for(store), DEFAULT_LOCK_TIMEOUT_MS)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Replace `path` with `data` via a temp file in the same directory.
///
/// Callers hold the store's [`FileLock`]; this only guarantees readers see
/// either the old or the new contents.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(format!(".tmp.{}", std::process::id()));
    let temp_path = PathBuf::from(temp_name);

    let mut temp = File::create(&temp_path)?;
    temp.write_all(data)?;
    temp.sync_all()?;
    drop(temp);

    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn lock_is_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("links.json");
        let lock_path = lock_path_for(&store);

        let held = FileLock::for_file(&store).unwrap();
        assert!(lock_path.exists());
        assert!(matches!(
            FileLock::acquire(&lock_path, 30),
            Err(Error::LockFailed(path)) if path == lock_path
        ));

        drop(held);
        assert!(FileLock::acquire(&lock_path, 30).is_ok());
    }

    #[test]
    fn lock_path_is_sibling_with_suffix() {
        let path = Path::new("/data/completions.jsonl");
        assert_eq!(
            lock_path_for(path),
            PathBuf::from("/data/completions.jsonl.lock")
        );
    }

    #[test]
    fn atomic_write_replaces_contents_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("links.json");

        write_atomic(&store, b"{\"links\":[]}").unwrap();
        write_atomic(&store, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&store).unwrap(), "{}");

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("links.json")]);
    }

    #[test]
    fn waiter_gets_lock_once_holder_releases() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("visits.jsonl.lock");

        let held = FileLock::acquire(&lock_path, 100).unwrap();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(80));
            drop(held);
        });
        assert!(FileLock::acquire(&lock_path, 2000).is_ok());
        releaser.join().unwrap();
    }

    #[test]
    fn writers_never_overlap() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("completions.jsonl.lock");

        let writers = 8;
        let barrier = Arc::new(Barrier::new(writers));
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..writers)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                let lock_path = lock_path.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let _lock = FileLock::acquire(&lock_path, 5000).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
