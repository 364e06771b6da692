use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{InboxError, WorkOrderError};
use super::model::WorkOrder;
use super::validation::{file_safe_id, is_work_order_file};

const ERROR_PREFIX: &str = "ERROR_";

/// A consumer's inbox plus the directories processed files are archived to.
/// Work order files are moved, never deleted.
#[derive(Debug, Clone)]
pub struct WorkOrderInbox {
    inbox: PathBuf,
    processed: PathBuf,
    error: PathBuf,
}

impl WorkOrderInbox {
    pub fn new(inbox: impl Into<PathBuf>, processed: impl Into<PathBuf>, error: impl Into<PathBuf>) -> Self {
        Self {
            inbox: inbox.into(),
            processed: processed.into(),
            error: error.into(),
        }
    }

    pub fn inbox_dir(&self) -> &Path {
        &self.inbox
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed
    }

    pub fn error_dir(&self) -> &Path {
        &self.error
    }

    /// Work order files waiting in the inbox, sorted by name. Hidden files
    /// (including in-flight enqueue temps) are skipped.
    pub fn pending(&self) -> Result<Vec<PathBuf>, InboxError> {
        let entries = match fs::read_dir(&self.inbox) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(InboxError::Io {
                    action: "listing",
                    path: self.inbox.clone(),
                    source,
                });
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_work_order_file(path))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| !name.starts_with('.'))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    pub fn load(&self, path: &Path) -> Result<WorkOrder, WorkOrderError> {
        WorkOrder::from_file(path)
    }

    /// Write `wo` into the inbox as `<wo_id>.json`. An existing file with the
    /// same name is never overwritten; a random suffix is added instead.
    pub fn enqueue(&self, wo: &WorkOrder) -> Result<PathBuf, InboxError> {
        fs::create_dir_all(&self.inbox).map_err(|source| InboxError::Io {
            action: "creating",
            path: self.inbox.clone(),
            source,
        })?;

        let payload = serde_json::to_vec_pretty(wo).map_err(|err| InboxError::Serialize {
            wo_id: wo.wo_id.clone(),
            message: err.to_string(),
        })?;

        let mut temp = tempfile::Builder::new()
            .prefix(".enqueue-")
            .suffix(".tmp")
            .tempfile_in(&self.inbox)
            .map_err(|source| InboxError::Io {
                action: "staging",
                path: self.inbox.clone(),
                source,
            })?;
        temp.write_all(&payload)
            .and_then(|()| temp.as_file_mut().sync_all())
            .map_err(|source| InboxError::Io {
                action: "writing",
                path: temp.path().to_path_buf(),
                source,
            })?;

        let name = format!("{}.json", file_safe_id(&wo.wo_id));
        let mut destination = self.inbox.join(&name);
        loop {
            match temp.persist_noclobber(&destination) {
                Ok(_) => break,
                Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    temp = err.file;
                    destination = with_suffix(&self.inbox, &name);
                    debug!(wo_id = %wo.wo_id, path = %destination.display(), "inbox name taken, retrying");
                }
                Err(err) => {
                    return Err(InboxError::Io {
                        action: "committing",
                        path: destination,
                        source: err.error,
                    });
                }
            }
        }

        info!(wo_id = %wo.wo_id, path = %destination.display(), "work order enqueued");
        Ok(destination)
    }

    /// Move a successfully handled file into `processed/`.
    pub fn archive_processed(&self, path: &Path) -> Result<PathBuf, InboxError> {
        let name = file_name(path)?;
        self.archive(path, &self.processed, &name)
    }

    /// Move a rejected or failed file into `error/` with the `ERROR_` prefix.
    pub fn archive_failed(&self, path: &Path) -> Result<PathBuf, InboxError> {
        let name = file_name(path)?;
        self.archive(path, &self.error, &format!("{ERROR_PREFIX}{name}"))
    }

    fn archive(&self, path: &Path, dir: &Path, name: &str) -> Result<PathBuf, InboxError> {
        fs::create_dir_all(dir).map_err(|source| InboxError::Io {
            action: "creating",
            path: dir.to_path_buf(),
            source,
        })?;

        let mut destination = dir.join(name);
        if destination.exists() {
            destination = with_suffix(dir, name);
        }

        if let Err(err) = fs::rename(path, &destination) {
            // Cross-device moves fall back to copy then remove.
            debug!(path = %path.display(), error = %err, "rename failed, copying instead");
            fs::copy(path, &destination).map_err(|source| InboxError::Io {
                action: "archiving",
                path: path.to_path_buf(),
                source,
            })?;
            if let Err(err) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %err, "archived copy written but original remains");
            }
        }
        info!(from = %path.display(), to = %destination.display(), "work order archived");
        Ok(destination)
    }
}

fn file_name(path: &Path) -> Result<String, InboxError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| InboxError::NoFileName {
            path: path.to_path_buf(),
        })
}

/// `dir/<stem>-<8 hex>.<ext>` for a name that is already taken.
fn with_suffix(dir: &Path, name: &str) -> PathBuf {
    let short = Uuid::new_v4().simple().to_string();
    let short = short.get(..8).unwrap_or(&short);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => dir.join(format!("{stem}-{short}.{ext}")),
        _ => dir.join(format!("{name}-{short}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::{RiskLevel, World};
    use crate::work_order::Operation;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    fn inbox(dir: &TempDir) -> WorkOrderInbox {
        WorkOrderInbox::new(dir.path().join("inbox"), dir.path().join("processed"), dir.path().join("error"))
    }

    fn order(id: &str) -> WorkOrder {
        WorkOrder::new(id, World::Background, "CLC", RiskLevel::Low, vec![Operation::add("apps/a.py", "x")])
    }

    #[test]
    fn enqueue_never_clobbers() {
        let dir = TempDir::new().unwrap();
        let inbox = inbox(&dir);
        let first = inbox.enqueue(&order("WO-7")).unwrap();
        let second = inbox.enqueue(&order("WO-7")).unwrap();
        assert_ne!(first, second);
        assert_eq!(first.file_name().unwrap(), "WO-7.json");
        assert_eq!(inbox.pending().unwrap().len(), 2);

        let loaded = inbox.load(&first).unwrap();
        assert_eq!(loaded.wo_id, "WO-7");
    }

    #[test]
    fn pending_is_sorted_and_skips_other_files() {
        let dir = TempDir::new().unwrap();
        dir.child("inbox/b.yaml").write_str("x").unwrap();
        dir.child("inbox/a.json").write_str("x").unwrap();
        dir.child("inbox/notes.txt").write_str("x").unwrap();
        dir.child("inbox/.hidden.json").write_str("x").unwrap();

        let names: Vec<String> = inbox(&dir)
            .pending()
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.yaml"]);
    }

    #[test]
    fn missing_inbox_has_nothing_pending() {
        let dir = TempDir::new().unwrap();
        assert!(inbox(&dir).pending().unwrap().is_empty());
    }

    #[test]
    fn failed_files_get_the_error_prefix() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("inbox/WO-9.yaml");
        file.write_str("broken").unwrap();

        let archived = inbox(&dir).archive_failed(file.path()).unwrap();
        assert_eq!(archived, dir.path().join("error/ERROR_WO-9.yaml"));
        file.assert(predicates::path::missing());
        dir.child("error/ERROR_WO-9.yaml").assert("broken");
    }

    #[test]
    fn processed_archive_keeps_both_copies_on_collision() {
        let dir = TempDir::new().unwrap();
        let inbox = inbox(&dir);
        dir.child("processed/WO-1.json").write_str("old").unwrap();
        let file = dir.child("inbox/WO-1.json");
        file.write_str("new").unwrap();

        let archived = inbox.archive_processed(file.path()).unwrap();
        assert_ne!(archived, dir.path().join("processed/WO-1.json"));
        dir.child("processed/WO-1.json").assert("old");
        assert_eq!(fs::read_to_string(archived).unwrap(), "new");
    }
}
