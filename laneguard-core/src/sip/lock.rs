//! Advisory per-path locks.
//!
//! One lock file per target, named after the SHA-256 of the normalized
//! target path. Exclusion is an OS file lock (`fs2`) on that file, so it
//! holds across threads and processes and dies with its holder. While held,
//! the file carries a [`LockRecord`]; a holder older than the staleness age
//! is presumed hung and its lock file is unlinked so a new holder can start.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use laneguard_commons::{normalize_path, sha256_hex};
use laneguard_config::LocksConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::SipError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub target: String,
    pub acquired_at: DateTime<Utc>,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct PathLockManager {
    lock_dir: PathBuf,
    timeout: Duration,
    retry_interval: Duration,
    stale_after: Duration,
}

enum Attempt {
    Held(File),
    Busy,
    /// Locked a file that a releasing holder had already unlinked.
    Vanished,
}

impl PathLockManager {
    pub fn new(lock_dir: impl Into<PathBuf>, config: &LocksConfig) -> Self {
        Self {
            lock_dir: lock_dir.into(),
            timeout: config.acquire_timeout(),
            retry_interval: config.retry_interval(),
            stale_after: config.stale_after(),
        }
    }

    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    pub fn lock_file_for(&self, target: &Path) -> PathBuf {
        let key = normalize_path(target);
        self.lock_dir
            .join(format!("{}.lock", sha256_hex(key.to_string_lossy().as_bytes())))
    }

    /// Block until `target` is locked or the timeout elapses.
    pub fn acquire(&self, target: &Path) -> Result<PathLock, SipError> {
        fs::create_dir_all(&self.lock_dir)
            .map_err(|err| SipError::io("creating lock directory", &self.lock_dir, err))?;

        let target = normalize_path(target);
        let lock_path = self.lock_file_for(&target);
        let started = Instant::now();

        loop {
            let record = LockRecord {
                pid: std::process::id(),
                target: target.to_string_lossy().into_owned(),
                acquired_at: Utc::now(),
                token: uuid::Uuid::new_v4().to_string(),
            };
            match try_lock(&lock_path, &record) {
                Ok(Attempt::Held(file)) => {
                    debug!(path = %target.display(), lock = %lock_path.display(), "path lock acquired");
                    return Ok(PathLock {
                        file,
                        lock_path,
                        target,
                        token: record.token,
                    });
                }
                Ok(Attempt::Vanished) => continue,
                Ok(Attempt::Busy) => {
                    if self.reclaim_if_stale(&lock_path) {
                        continue;
                    }
                }
                Err(err) => return Err(SipError::io("locking", &lock_path, err)),
            }

            let waited = started.elapsed();
            if waited >= self.timeout {
                return Err(SipError::LockTimeout {
                    path: target,
                    waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                });
            }
            thread::sleep(self.retry_interval.min(self.timeout.saturating_sub(waited)));
        }
    }

    /// Lock several targets in a fixed (sorted, de-duplicated) order so two
    /// callers locking the same pair can never deadlock.
    pub fn acquire_many(&self, targets: &[&Path]) -> Result<Vec<PathLock>, SipError> {
        let mut ordered: Vec<PathBuf> = targets.iter().map(|t| normalize_path(t)).collect();
        ordered.sort();
        ordered.dedup();

        let mut held = Vec::with_capacity(ordered.len());
        for target in &ordered {
            held.push(self.acquire(target)?);
        }
        Ok(held)
    }

    /// Unlink a lock file whose holder has outlived the staleness age. The
    /// hung holder keeps its OS lock on the unlinked file and no longer
    /// excludes anyone.
    fn reclaim_if_stale(&self, lock_path: &Path) -> bool {
        let Ok(observed) = fs::read(lock_path) else {
            // Released between our lock attempt and this read.
            return !lock_path.exists();
        };
        let age = lock_age(lock_path, &observed);
        if age < self.stale_after {
            return false;
        }

        let tombstone = lock_path.with_extension(format!("stale-{}", uuid::Uuid::new_v4()));
        if fs::rename(lock_path, &tombstone).is_err() {
            return false;
        }
        let moved = fs::read(&tombstone).unwrap_or_default();
        if moved != observed {
            // Another writer replaced the stale lock before our rename; hand
            // its fresh lock back.
            if let Err(err) = fs::hard_link(&tombstone, lock_path) {
                debug!(lock = %lock_path.display(), error = %err, "could not restore replaced lock");
            }
            discard_tombstone(&tombstone);
            return false;
        }
        discard_tombstone(&tombstone);

        let holder = serde_json::from_slice::<LockRecord>(&observed).ok();
        warn!(
            lock = %lock_path.display(),
            age_secs = age.as_secs(),
            holder_pid = holder.as_ref().map(|r| r.pid),
            locked_path = holder.as_ref().map(|r| r.target.as_str()),
            "reclaimed stale path lock"
        );
        true
    }
}

fn try_lock(lock_path: &Path, record: &LockRecord) -> io::Result<Attempt> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?;
    if let Err(err) = file.try_lock_exclusive() {
        if err.kind() == ErrorKind::WouldBlock
            || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
        {
            return Ok(Attempt::Busy);
        }
        return Err(err);
    }

    let payload = serde_json::to_vec(record).map_err(io::Error::other)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&payload)?;
    file.sync_all()?;

    // Only a lock on the file currently at `lock_path` counts.
    if read_record(lock_path).is_some_and(|held| held.token == record.token) {
        Ok(Attempt::Held(file))
    } else {
        Ok(Attempt::Vanished)
    }
}

fn read_record(lock_path: &Path) -> Option<LockRecord> {
    let bytes = fs::read(lock_path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn discard_tombstone(tombstone: &Path) {
    if let Err(err) = fs::remove_file(tombstone) {
        debug!(path = %tombstone.display(), error = %err, "failed to remove stale lock tombstone");
    }
}

fn lock_age(lock_path: &Path, contents: &[u8]) -> Duration {
    if let Ok(record) = serde_json::from_slice::<LockRecord>(contents) {
        return (Utc::now() - record.acquired_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
    }
    // Half-written or foreign file: fall back to the filesystem clock.
    fs::metadata(lock_path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .unwrap_or(Duration::ZERO)
}

/// Held lock. Released on drop.
#[derive(Debug)]
pub struct PathLock {
    file: File,
    lock_path: PathBuf,
    target: PathBuf,
    token: String,
}

impl PathLock {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        // Unlink before unlocking, and only if the file is still ours; a
        // reclaimer may have taken over after we stalled past the staleness
        // age. Waiters that locked the unlinked file see it vanish and retry.
        let still_ours = read_record(&self.lock_path).is_some_and(|record| record.token == self.token);
        if still_ours && let Err(err) = fs::remove_file(&self.lock_path) {
            warn!(lock = %self.lock_path.display(), error = %err, "failed to release path lock");
        }
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!(lock = %self.lock_path.display(), error = %err, "failed to unlock path lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &Path, timeout_ms: u64, stale_secs: u64) -> PathLockManager {
        PathLockManager::new(
            dir.join("locks"),
            &LocksConfig {
                acquire_timeout_ms: timeout_ms,
                retry_interval_ms: 5,
                stale_after_secs: stale_secs,
            },
        )
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let locks = manager(dir.path(), 50, 300);
        let target = dir.path().join("a.txt");

        let held = locks.acquire(&target).unwrap();
        let err = locks.acquire(&target).unwrap_err();
        assert!(matches!(err, SipError::LockTimeout { .. }));

        drop(held);
        assert!(locks.acquire(&target).is_ok());
    }

    #[test]
    fn distinct_paths_do_not_share_locks() {
        let dir = tempfile::tempdir().unwrap();
        let locks = manager(dir.path(), 50, 300);
        let _a = locks.acquire(&dir.path().join("a")).unwrap();
        assert!(locks.acquire(&dir.path().join("b")).is_ok());
    }

    #[test]
    fn lock_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let locks = manager(dir.path(), 50, 300);
        let lock_file = {
            let lock = locks.acquire(&dir.path().join("a")).unwrap();
            assert!(lock.lock_path().exists());
            lock.lock_path().to_path_buf()
        };
        assert!(!lock_file.exists());
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let locks = manager(dir.path(), 200, 1);
        let target = dir.path().join("a");
        fs::create_dir_all(locks.lock_dir()).unwrap();
        let abandoned = LockRecord {
            pid: 999_999,
            target: target.to_string_lossy().into_owned(),
            acquired_at: Utc::now() - chrono::Duration::seconds(60),
            token: "abandoned".to_string(),
        };
        fs::write(
            locks.lock_file_for(&target),
            serde_json::to_vec(&abandoned).unwrap(),
        )
        .unwrap();

        let lock = locks.acquire(&target).unwrap();
        let record: LockRecord =
            serde_json::from_slice(&fs::read(lock.lock_path()).unwrap()).unwrap();
        assert_eq!(record.pid, std::process::id());
    }

    #[test]
    fn held_lock_excludes_other_handles() {
        let dir = tempfile::tempdir().unwrap();
        let locks = manager(dir.path(), 50, 300);
        let lock = locks.acquire(&dir.path().join("a")).unwrap();

        let other = OpenOptions::new().read(true).write(true).open(lock.lock_path()).unwrap();
        assert!(FileExt::try_lock_exclusive(&other).is_err());
        drop(other);

        let lock_file = lock.lock_path().to_path_buf();
        drop(lock);
        assert!(!lock_file.exists());
    }

    #[test]
    fn hung_holder_past_staleness_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let locks = manager(dir.path(), 500, 1);
        let target = dir.path().join("a");
        fs::create_dir_all(locks.lock_dir()).unwrap();
        let lock_file = locks.lock_file_for(&target);

        let mut hung = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&lock_file)
            .unwrap();
        FileExt::lock_exclusive(&hung).unwrap();
        let old = LockRecord {
            pid: 999_999,
            target: target.to_string_lossy().into_owned(),
            acquired_at: Utc::now() - chrono::Duration::seconds(60),
            token: "hung".to_string(),
        };
        hung.write_all(&serde_json::to_vec(&old).unwrap()).unwrap();

        let lock = locks.acquire(&target).unwrap();
        let record: LockRecord =
            serde_json::from_slice(&fs::read(lock.lock_path()).unwrap()).unwrap();
        assert_eq!(record.pid, std::process::id());
        assert_ne!(record.token, "hung");
        drop(hung);
    }

    #[test]
    fn fresh_foreign_holder_is_waited_for() {
        let dir = tempfile::tempdir().unwrap();
        let locks = manager(dir.path(), 50, 300);
        let target = dir.path().join("a");
        fs::create_dir_all(locks.lock_dir()).unwrap();

        let foreign = File::create(locks.lock_file_for(&target)).unwrap();
        FileExt::lock_exclusive(&foreign).unwrap();
        let err = locks.acquire(&target).unwrap_err();
        assert!(matches!(err, SipError::LockTimeout { .. }));

        drop(foreign);
        assert!(locks.acquire(&target).is_ok());
    }

    #[test]
    fn acquire_many_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let locks = manager(dir.path(), 50, 300);
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let held = locks.acquire_many(&[b.as_path(), a.as_path(), b.as_path()]).unwrap();
        assert_eq!(held.len(), 2);
        assert_eq!(held.first().map(PathLock::target), Some(a.as_path()));
    }
}
