use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use laneguard_commons::{sha256_file, sha256_hex, to_slash_string};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::governance::{OperationKind, RollbackStrategy};
use crate::sip::{SipEngine, SipError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum PriorState {
    Absent,
    Present { backup: PathBuf, checksum: String },
}

#[derive(Debug, Clone)]
struct JournalEntry {
    target: PathBuf,
    prior: PriorState,
}

/// What a rollback managed to undo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub restored: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Paths left in their post-write state.
    pub unrestored: Vec<PathBuf>,
    pub failures: Vec<String>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Prior state of every path a work order touches, captured before the
/// first write to it. Replayed newest-first on failure.
#[derive(Debug)]
pub struct RollbackJournal {
    backup_dir: PathBuf,
    strategy: RollbackStrategy,
    root: PathBuf,
    entries: Vec<JournalEntry>,
}

impl RollbackJournal {
    pub fn new(backup_dir: impl Into<PathBuf>, strategy: RollbackStrategy, root: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            strategy,
            root: root.into(),
            entries: Vec::new(),
        }
    }

    pub fn strategy(&self) -> RollbackStrategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record `target`'s current state. Later captures of the same path
    /// are ignored so the journal always holds the original.
    pub fn capture(&mut self, target: &Path) -> Result<(), SipError> {
        if self.entries.iter().any(|entry| entry.target == target) {
            return Ok(());
        }

        let prior = if target.is_file() {
            fs::create_dir_all(&self.backup_dir)
                .map_err(|err| SipError::io("creating backup directory for", target, err))?;
            let name = target
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());
            let backup = self.backup_dir.join(format!("{:03}-{name}.bak", self.entries.len()));
            fs::copy(target, &backup).map_err(|err| SipError::io("backing up", target, err))?;
            let checksum = sha256_file(&backup).map_err(|err| SipError::io("hashing backup of", target, err))?;
            debug!(path = %target.display(), backup = %backup.display(), "captured prior state");
            PriorState::Present { backup, checksum }
        } else {
            PriorState::Absent
        };

        self.entries.push(JournalEntry {
            target: target.to_path_buf(),
            prior,
        });
        Ok(())
    }

    /// Undo every captured path, newest first, through `sip`.
    pub fn rollback(&self, sip: &SipEngine) -> RollbackReport {
        let mut report = RollbackReport::default();
        for entry in self.entries.iter().rev() {
            let outcome = match &entry.prior {
                PriorState::Absent => sip
                    .apply_sip(&entry.target, None, OperationKind::Delete)
                    .map(|outcome| {
                        if outcome.checksum_before.is_some() {
                            report.removed.push(entry.target.clone());
                        }
                    }),
                PriorState::Present { backup, checksum } => self
                    .restore(sip, &entry.target, backup, checksum)
                    .map(|()| report.restored.push(entry.target.clone())),
            };
            if let Err(err) = outcome {
                warn!(path = %entry.target.display(), error = %err, "rollback step failed");
                report.unrestored.push(entry.target.clone());
                report
                    .failures
                    .push(format!("failed to roll back {}: {err}", entry.target.display()));
            }
        }
        info!(
            strategy = ?self.strategy,
            restored = report.restored.len(),
            removed = report.removed.len(),
            failures = report.failures.len(),
            "rollback finished"
        );
        report
    }

    /// Write the captured bytes back through SIP. Under `git_revert` the
    /// bytes come from HEAD when HEAD holds exactly the captured state;
    /// otherwise, and for uncommitted edits, from the snapshot.
    fn restore(&self, sip: &SipEngine, target: &Path, backup: &Path, checksum: &str) -> Result<(), SipError> {
        let from_git = match self.strategy {
            RollbackStrategy::GitRevert => match self.git_show_head(target) {
                Ok(bytes) if sha256_hex(&bytes) == checksum => Some(bytes),
                Ok(_) => {
                    debug!(path = %target.display(), "captured state differs from HEAD, restoring snapshot");
                    None
                }
                Err(reason) => {
                    debug!(path = %target.display(), %reason, "git lookup failed, restoring snapshot");
                    None
                }
            },
            _ => None,
        };
        let bytes = match from_git {
            Some(bytes) => bytes,
            None => fs::read(backup).map_err(|err| SipError::io("reading backup for", target, err))?,
        };
        let operation = if target.is_file() {
            OperationKind::Modify
        } else {
            OperationKind::Add
        };
        let outcome = sip.apply_sip(target, Some(&bytes), operation)?;
        match outcome.checksum_after {
            Some(actual) if actual == checksum => Ok(()),
            actual => Err(SipError::Integrity {
                path: target.to_path_buf(),
                expected: checksum.to_string(),
                actual: actual.unwrap_or_else(|| "absent".to_string()),
            }),
        }
    }

    fn git_show_head(&self, target: &Path) -> Result<Vec<u8>, String> {
        let relative = target
            .strip_prefix(&self.root)
            .map_err(|_| "target is outside the installation root".to_string())?;
        let object = format!("HEAD:{}", to_slash_string(relative));
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(["show", &object])
            .output()
            .map_err(|err| format!("failed to run git: {err}"))?;
        if output.status.success() {
            debug!(path = %target.display(), "read prior state from git HEAD");
            Ok(output.stdout)
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }

    /// Remove the snapshot directory once it is no longer needed.
    pub fn discard(self) {
        if self.backup_dir.exists()
            && let Err(err) = fs::remove_dir_all(&self.backup_dir)
        {
            warn!(dir = %self.backup_dir.display(), error = %err, "failed to remove rollback snapshots");
        }
    }
}
