use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AuditError;
use crate::governance::RiskLevel;
use crate::work_order::{ExecutionResult, ExecutionStatus, Origin, WorkOrder, file_safe_id};

/// One execution attempt as persisted to `executions/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub wo_id: String,
    pub status: ExecutionStatus,
    pub execution_time: f64,
    pub files_modified: Vec<String>,
    pub checksums: IndexMap<String, (Option<String>, Option<String>)>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    /// `processor` or `clc`.
    pub consumer: String,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn from_result(result: &ExecutionResult, wo: Option<&WorkOrder>, consumer: &str) -> Self {
        Self {
            wo_id: result.wo_id.clone(),
            status: result.status,
            execution_time: result.execution_time,
            files_modified: result.files_modified.clone(),
            checksums: result.checksums.clone(),
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
            origin: wo.map(|wo| wo.origin.clone()),
            risk_level: wo.map(|wo| wo.risk_level),
            consumer: consumer.to_string(),
            recorded_at: Utc::now(),
        }
    }
}

/// Directory of write-once execution records.
#[derive(Debug, Clone)]
pub struct ExecutionAuditLog {
    dir: PathBuf,
}

impl ExecutionAuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `record` under a fresh name. Existing files are never
    /// opened for writing.
    pub fn write(&self, record: &ExecutionRecord) -> Result<PathBuf, AuditError> {
        fs::create_dir_all(&self.dir).map_err(|source| AuditError::io("creating", &self.dir, source))?;

        let payload = serde_json::to_vec_pretty(record).map_err(|err| AuditError::Serialize {
            message: err.to_string(),
        })?;

        let stamp = record.recorded_at.format("%Y%m%dT%H%M%S%.3fZ");
        let short = uuid::Uuid::new_v4().simple().to_string();
        let short = short.get(..8).unwrap_or(&short);
        let path = self
            .dir
            .join(format!("{}-{stamp}-{short}.json", file_safe_id(&record.wo_id)));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| AuditError::io("creating", &path, source))?;
        file.write_all(&payload)
            .and_then(|()| file.sync_all())
            .map_err(|source| AuditError::io("writing", &path, source))?;

        debug!(wo_id = %record.wo_id, path = %path.display(), "execution record written");
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<ExecutionRecord, AuditError> {
        let content = fs::read_to_string(path).map_err(|source| AuditError::io("reading", path, source))?;
        serde_json::from_str(&content).map_err(|err| AuditError::Parse {
            path: path.to_path_buf(),
            line: err.line(),
            message: err.to_string(),
        })
    }

    /// Record files for `wo_id`, oldest first.
    pub fn records_for(&self, wo_id: &str) -> Result<Vec<PathBuf>, AuditError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(AuditError::io("listing", &self.dir, source)),
        };
        let prefix = format!("{}-", file_safe_id(wo_id));
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".json"))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}
