use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use laneguard_commons::{GENESIS_CHECKSUM, sha256_file, sha256_hex};
use serde::{Deserialize, Serialize};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info, warn};

use super::error::SipError;
use super::lock::PathLockManager;
use crate::governance::OperationKind;
use crate::sandbox::SandboxGuard;

/// Points in the apply sequence where an interceptor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SipStage {
    TempCreated,
    TempWritten,
    BeforeCommit,
    AfterCommit,
}

impl SipStage {
    pub const fn label(self) -> &'static str {
        match self {
            SipStage::TempCreated => "creating temp file for",
            SipStage::TempWritten => "writing temp file for",
            SipStage::BeforeCommit => "committing",
            SipStage::AfterCommit => "verifying",
        }
    }
}

/// Hook for fault injection and observation. An error returned before the
/// commit aborts the patch; an error at [`SipStage::AfterCommit`] is logged
/// and the engine goes on to verify the committed bytes.
pub trait SipInterceptor: Send + Sync {
    fn on_stage(&self, stage: SipStage, target: &Path) -> std::io::Result<()>;
}

/// Result of one committed patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipOutcome {
    pub path: PathBuf,
    pub operation: OperationKind,
    /// `None` when the target did not exist beforehand.
    pub checksum_before: Option<String>,
    /// `None` after a delete.
    pub checksum_after: Option<String>,
    /// Where the new bytes were staged. Gone once the patch completes.
    pub temp_file: Option<PathBuf>,
    pub bytes_written: u64,
}

impl SipOutcome {
    pub fn changed(&self) -> bool {
        self.checksum_before != self.checksum_after
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub destination: SipOutcome,
    pub source: SipOutcome,
}

/// Applies file mutations as temp-write, fsync, compliance check, atomic
/// rename, then read-back verification.
#[derive(Clone)]
pub struct SipEngine {
    locks: PathLockManager,
    guard: Arc<dyn SandboxGuard>,
    interceptor: Option<Arc<dyn SipInterceptor>>,
}

impl std::fmt::Debug for SipEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SipEngine")
            .field("locks", &self.locks)
            .field("interceptor", &self.interceptor.is_some())
            .finish()
    }
}

impl SipEngine {
    pub fn new(locks: PathLockManager, guard: Arc<dyn SandboxGuard>) -> Self {
        Self {
            locks,
            guard,
            interceptor: None,
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn SipInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn locks(&self) -> &PathLockManager {
        &self.locks
    }

    /// Apply an add, modify or delete to `path`, which must be absolute.
    pub fn apply_sip(
        &self,
        path: &Path,
        content: Option<&[u8]>,
        operation: OperationKind,
    ) -> Result<SipOutcome, SipError> {
        if operation == OperationKind::Move {
            return Err(SipError::InvalidRequest {
                path: path.to_path_buf(),
                reason: "moves go through apply_move".to_string(),
            });
        }
        let _lock = self.locks.acquire(path)?;
        self.apply_locked(path, content, operation)
    }

    /// Write `destination` from `source`'s bytes, then delete `source`.
    /// Both paths are locked for the whole move.
    pub fn apply_move(&self, source: &Path, destination: &Path) -> Result<MoveOutcome, SipError> {
        if source == destination {
            return Err(SipError::InvalidRequest {
                path: source.to_path_buf(),
                reason: "move source and destination are the same path".to_string(),
            });
        }
        let _locks = self.locks.acquire_many(&[source, destination])?;

        if !source.is_file() {
            return Err(SipError::MissingTarget {
                operation: OperationKind::Move,
                path: source.to_path_buf(),
            });
        }
        let bytes = fs::read(source).map_err(|err| SipError::io("reading move source", source, err))?;
        let write_kind = if destination.exists() {
            OperationKind::Modify
        } else {
            OperationKind::Add
        };

        let destination_outcome = self.apply_locked(destination, Some(&bytes), write_kind)?;
        let source_outcome = self.apply_locked(source, None, OperationKind::Delete)?;
        info!(
            source = %source.display(),
            destination = %destination.display(),
            "moved file through SIP"
        );
        Ok(MoveOutcome {
            destination: destination_outcome,
            source: source_outcome,
        })
    }

    fn apply_locked(
        &self,
        path: &Path,
        content: Option<&[u8]>,
        operation: OperationKind,
    ) -> Result<SipOutcome, SipError> {
        if !path.is_absolute() {
            return Err(SipError::InvalidRequest {
                path: path.to_path_buf(),
                reason: "SIP targets must be absolute".to_string(),
            });
        }
        if path.is_dir() {
            return Err(SipError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        let exists = path.is_file();
        let payload: &[u8] = match operation {
            OperationKind::Delete => {
                if !exists {
                    debug!(path = %path.display(), "delete of absent file is a no-op");
                    return Ok(SipOutcome {
                        path: path.to_path_buf(),
                        operation,
                        checksum_before: None,
                        checksum_after: None,
                        temp_file: None,
                        bytes_written: 0,
                    });
                }
                &[]
            }
            OperationKind::Modify if !exists => {
                return Err(SipError::MissingTarget {
                    operation,
                    path: path.to_path_buf(),
                });
            }
            _ => content.ok_or_else(|| SipError::MissingContent {
                operation,
                path: path.to_path_buf(),
            })?,
        };

        let checksum_before = if exists {
            Some(sha256_file(path).map_err(|err| SipError::io("hashing", path, err))?)
        } else {
            None
        };

        let parent = path.parent().ok_or_else(|| SipError::InvalidRequest {
            path: path.to_path_buf(),
            reason: "target has no parent directory".to_string(),
        })?;
        fs::create_dir_all(parent)
            .map_err(|err| SipError::io("creating parent directory for", path, err))?;

        // Dropping `temp` on any early return removes it, leaving the target
        // untouched.
        let mut temp = Builder::new()
            .prefix(".sip-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|err| SipError::io(SipStage::TempCreated.label(), path, err))?;
        self.intercept(SipStage::TempCreated, path)?;

        write_payload(&mut temp, payload)
            .map_err(|err| SipError::io(SipStage::TempWritten.label(), path, err))?;
        if exists && let Ok(metadata) = fs::metadata(path) {
            temp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(|err| SipError::io("copying permissions for", path, err))?;
        }
        self.intercept(SipStage::TempWritten, path)?;

        let expected_after = match operation {
            OperationKind::Delete => None,
            _ => Some(sha256_hex(payload)),
        };
        let temp_path = temp.path().to_path_buf();
        let compliance = self.guard.validate_sip_compliance(
            path,
            Some(&temp_path),
            Some(checksum_before.as_deref().unwrap_or(GENESIS_CHECKSUM)),
            Some(expected_after.as_deref().unwrap_or(GENESIS_CHECKSUM)),
        );
        if !compliance.compliant {
            return Err(SipError::Compliance {
                path: path.to_path_buf(),
                issues: compliance.issues.join("; "),
            });
        }
        self.intercept(SipStage::BeforeCommit, path)?;

        match operation {
            OperationKind::Delete => {
                fs::remove_file(path).map_err(|err| SipError::io("deleting", path, err))?;
                if let Err(err) = temp.close() {
                    debug!(path = %temp_path.display(), error = %err, "failed to discard delete temp file");
                }
            }
            _ => {
                temp.persist(path)
                    .map_err(|err| SipError::io(SipStage::BeforeCommit.label(), path, err.error))?;
            }
        }
        sync_directory(parent);

        if let Err(err) = self.intercept(SipStage::AfterCommit, path) {
            warn!(path = %path.display(), error = %err, "after-commit interceptor failed");
        }

        let checksum_after = verify_committed(path, expected_after.as_deref())?;
        info!(
            path = %path.display(),
            %operation,
            before = checksum_before.as_deref().unwrap_or("absent"),
            after = checksum_after.as_deref().unwrap_or("absent"),
            "SIP committed"
        );

        Ok(SipOutcome {
            path: path.to_path_buf(),
            operation,
            checksum_before,
            checksum_after,
            temp_file: Some(temp_path),
            bytes_written: payload.len() as u64,
        })
    }

    fn intercept(&self, stage: SipStage, path: &Path) -> Result<(), SipError> {
        match &self.interceptor {
            Some(interceptor) => interceptor
                .on_stage(stage, path)
                .map_err(|err| SipError::io(stage.label(), path, err)),
            None => Ok(()),
        }
    }
}

fn write_payload(temp: &mut NamedTempFile, payload: &[u8]) -> std::io::Result<()> {
    temp.write_all(payload)?;
    temp.flush()?;
    temp.as_file_mut().sync_all()
}

/// Re-read the committed target and compare it with what was written.
fn verify_committed(path: &Path, expected: Option<&str>) -> Result<Option<String>, SipError> {
    match expected {
        Some(expected) => {
            let actual = sha256_file(path).map_err(|err| SipError::io("verifying", path, err))?;
            if actual != expected {
                return Err(SipError::Integrity {
                    path: path.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
            Ok(Some(actual))
        }
        None if path.exists() => Err(SipError::Integrity {
            path: path.to_path_buf(),
            expected: "absent".to_string(),
            actual: sha256_file(path).unwrap_or_else(|_| "present".to_string()),
        }),
        None => Ok(None),
    }
}

#[cfg(unix)]
fn sync_directory(dir: &Path) {
    if let Err(err) = fs::File::open(dir).and_then(|handle| handle.sync_all()) {
        debug!(dir = %dir.display(), error = %err, "directory fsync failed");
    }
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedGuard;
    use laneguard_config::LocksConfig;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn engine(dir: &Path) -> SipEngine {
        SipEngine::new(
            PathLockManager::new(dir.join(".locks"), &LocksConfig::default()),
            Arc::new(FixedGuard::allow_all()),
        )
    }

    struct FailAt(SipStage);

    impl SipInterceptor for FailAt {
        fn on_stage(&self, stage: SipStage, _target: &Path) -> std::io::Result<()> {
            if stage == self.0 {
                return Err(std::io::Error::other("injected"));
            }
            Ok(())
        }
    }

    struct Tamper(AtomicBool);

    impl SipInterceptor for Tamper {
        fn on_stage(&self, stage: SipStage, target: &Path) -> std::io::Result<()> {
            if stage == SipStage::AfterCommit && !self.0.swap(true, Ordering::SeqCst) {
                fs::write(target, b"tampered")?;
            }
            Ok(())
        }
    }

    fn temp_leftovers(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".sip-"))
            .count()
    }

    #[test]
    fn add_then_modify_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let target = dir.path().join("apps/a.py");

        let added = engine.apply_sip(&target, Some(b"v1"), OperationKind::Add).unwrap();
        assert_eq!(added.checksum_before, None);
        assert_eq!(added.checksum_after, Some(sha256_hex(b"v1")));
        assert!(!added.temp_file.as_ref().is_some_and(|t| t.exists()));

        let modified = engine.apply_sip(&target, Some(b"v2"), OperationKind::Modify).unwrap();
        assert_eq!(modified.checksum_before, Some(sha256_hex(b"v1")));
        assert_eq!(modified.checksum_after, Some(sha256_hex(b"v2")));
        assert_eq!(fs::read(&target).unwrap(), b"v2");
    }

    #[test]
    fn reapplying_identical_content_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let target = dir.path().join("same.txt");

        let first = engine.apply_sip(&target, Some(b"x"), OperationKind::Add).unwrap();
        let second = engine.apply_sip(&target, Some(b"x"), OperationKind::Modify).unwrap();
        assert_eq!(second.checksum_before, first.checksum_after);
        assert_eq!(second.checksum_after, first.checksum_after);
        assert!(!second.changed());
    }

    #[test]
    fn modify_of_missing_target_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = engine(dir.path())
            .apply_sip(&dir.path().join("nope"), Some(b"x"), OperationKind::Modify)
            .unwrap_err();
        assert!(matches!(err, SipError::MissingTarget { .. }));
    }

    #[test]
    fn delete_reports_before_checksum_only() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gone.txt");
        fs::write(&target, b"bye").unwrap();

        let outcome = engine(dir.path())
            .apply_sip(&target, None, OperationKind::Delete)
            .unwrap();
        assert_eq!(outcome.checksum_before, Some(sha256_hex(b"bye")));
        assert_eq!(outcome.checksum_after, None);
        assert!(!target.exists());
        assert_eq!(temp_leftovers(dir.path()), 0);

        let again = engine(dir.path())
            .apply_sip(&target, None, OperationKind::Delete)
            .unwrap();
        assert_eq!(again.checksum_before, None);
    }

    #[test]
    fn injected_faults_leave_target_untouched() {
        for stage in [SipStage::TempCreated, SipStage::TempWritten, SipStage::BeforeCommit] {
            let dir = tempfile::tempdir().unwrap();
            let target = dir.path().join("config.yaml");
            fs::write(&target, b"original").unwrap();

            let engine = engine(dir.path()).with_interceptor(Arc::new(FailAt(stage)));
            let err = engine
                .apply_sip(&target, Some(b"replacement"), OperationKind::Modify)
                .unwrap_err();
            assert!(matches!(err, SipError::Io { .. }), "{stage:?}: {err}");
            assert_eq!(fs::read(&target).unwrap(), b"original", "{stage:?}");
            assert_eq!(temp_leftovers(dir.path()), 0, "{stage:?}");
        }
    }

    #[test]
    fn tampering_after_commit_is_an_integrity_fault() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data.json");
        let engine =
            engine(dir.path()).with_interceptor(Arc::new(Tamper(AtomicBool::new(false))));
        let err = engine
            .apply_sip(&target, Some(b"{}"), OperationKind::Add)
            .unwrap_err();
        assert!(err.is_integrity_fault());
    }

    #[test]
    fn non_compliant_guard_aborts_before_commit() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.txt");
        let engine = SipEngine::new(
            PathLockManager::new(dir.path().join(".locks"), &LocksConfig::default()),
            Arc::new(FixedGuard::allow_all().non_compliant()),
        );
        let err = engine
            .apply_sip(&target, Some(b"x"), OperationKind::Add)
            .unwrap_err();
        assert!(matches!(err, SipError::Compliance { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn move_writes_destination_then_removes_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("old/name.txt");
        let destination = dir.path().join("new/name.txt");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"payload").unwrap();

        let outcome = engine(dir.path()).apply_move(&source, &destination).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read(&destination).unwrap(), b"payload");
        assert_eq!(outcome.destination.checksum_after, Some(sha256_hex(b"payload")));
        assert_eq!(outcome.source.checksum_after, None);
    }
}
