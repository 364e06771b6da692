//! Tamper-evident log of routing decisions, admission denials and execution
//! faults. Every entry carries the hash of its predecessor.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use laneguard_commons::GENESIS_CHECKSUM;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::AuditError;
use crate::governance::{Lane, Zone};
use crate::router::RoutingDecision;
use crate::sandbox::SecurityCheckResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Routing,
    Denial,
    Fault,
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionKind::Routing => write!(f, "ROUTING"),
            DecisionKind::Denial => write!(f, "DENIAL"),
            DecisionKind::Fault => write!(f, "FAULT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: DecisionKind,
    pub path: String,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane: Option<Lane>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
    /// Short machine-readable verdict: a lane, a violation code or a fault tag.
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub previous_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_hash: Option<String>,
}

impl DecisionEntry {
    pub fn new(
        kind: DecisionKind,
        path: impl Into<String>,
        actor: impl Into<String>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            path: path.into(),
            actor: actor.into(),
            wo_id: None,
            lane: None,
            zone: None,
            outcome: outcome.into(),
            detail: None,
            previous_hash: String::new(),
            entry_hash: None,
        }
    }

    pub fn routing(path: &str, actor: &str, decision: &RoutingDecision) -> Self {
        let mut entry = Self::new(DecisionKind::Routing, path, actor, decision.lane.to_string());
        entry.lane = Some(decision.lane);
        entry.zone = Some(decision.zone);
        entry.detail = Some(decision.reason.clone());
        entry
    }

    pub fn denial(path: &str, actor: &str, check: &SecurityCheckResult) -> Self {
        let outcome = check
            .violation
            .map(|violation| violation.code().to_string())
            .unwrap_or_else(|| "DENIED".to_string());
        let mut entry = Self::new(DecisionKind::Denial, path, actor, outcome);
        entry.zone = check.zone;
        entry.detail = Some(check.reason.clone());
        entry
    }

    pub fn fault(path: &str, actor: &str, outcome: &str, detail: impl Into<String>) -> Self {
        Self::new(DecisionKind::Fault, path, actor, outcome).with_detail(detail)
    }

    pub fn with_wo_id(mut self, wo_id: impl Into<String>) -> Self {
        self.wo_id = Some(wo_id.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn finalize(mut self) -> Self {
        self.entry_hash = Some(self.compute_hash());
        self
    }

    fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hash_field(&mut hasher, self.id.as_bytes());
        hash_field(&mut hasher, self.timestamp.to_rfc3339().as_bytes());
        hash_field(&mut hasher, format!("{:?}", self.kind).as_bytes());
        hash_field(&mut hasher, self.path.as_bytes());
        hash_field(&mut hasher, self.actor.as_bytes());
        hash_optional(&mut hasher, self.wo_id.as_deref());
        hash_optional(&mut hasher, self.lane.map(|lane| format!("{lane:?}")).as_deref());
        hash_optional(&mut hasher, self.zone.map(|zone| format!("{zone:?}")).as_deref());
        hash_field(&mut hasher, self.outcome.as_bytes());
        hash_optional(&mut hasher, self.detail.as_deref());
        hash_field(&mut hasher, self.previous_hash.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn verify(&self) -> bool {
        self.entry_hash
            .as_ref()
            .is_some_and(|hash| *hash == self.compute_hash())
    }
}

// Length-prefixed so adjacent fields cannot trade bytes.
fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn hash_optional(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(value) => {
            hasher.update([1u8]);
            hash_field(hasher, value.as_bytes());
        }
        None => hasher.update([0u8]),
    }
}

/// Append-only JSON-lines decision log.
#[derive(Debug)]
pub struct DecisionLog {
    log_path: PathBuf,
    // Guards both the chain head and the file append.
    last_hash: Mutex<String>,
}

impl DecisionLog {
    /// Open (or prepare to create) the log at `log_path`, resuming the chain
    /// from its last entry.
    pub fn open(log_path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let log_path = log_path.as_ref().to_path_buf();
        let last_hash = if log_path.exists() {
            read_last_hash(&log_path)?
        } else {
            GENESIS_CHECKSUM.to_string()
        };
        Ok(Self {
            log_path,
            last_hash: Mutex::new(last_hash),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Chain, hash and append `entry`. Returns the finalized entry.
    pub fn log(&self, mut entry: DecisionEntry) -> Result<DecisionEntry, AuditError> {
        let mut last_hash = self.last_hash.lock();
        entry.previous_hash = last_hash.clone();
        let entry = entry.finalize();

        let json = serde_json::to_string(&entry).map_err(|err| AuditError::Serialize {
            message: err.to_string(),
        })?;

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| AuditError::io("creating", parent, source))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|source| AuditError::io("opening", &self.log_path, source))?;
        writeln!(file, "{json}").map_err(|source| AuditError::io("appending to", &self.log_path, source))?;
        file.sync_all()
            .map_err(|source| AuditError::io("syncing", &self.log_path, source))?;

        if let Some(hash) = &entry.entry_hash {
            *last_hash = hash.clone();
        }
        Ok(entry)
    }

    pub fn entries(&self) -> Result<Vec<DecisionEntry>, AuditError> {
        let _guard = self.last_hash.lock();
        read_entries(&self.log_path)
    }

    /// Walk the chain from genesis. `false` means an entry was edited,
    /// removed or reordered.
    pub fn verify_integrity(&self) -> Result<bool, AuditError> {
        let entries = self.entries()?;
        let mut expected_previous = GENESIS_CHECKSUM.to_string();
        for entry in entries {
            if !entry.verify() {
                warn!(entry = %entry.id, "decision log entry has an invalid hash");
                return Ok(false);
            }
            if entry.previous_hash != expected_previous {
                warn!(entry = %entry.id, "decision log chain is broken");
                return Ok(false);
            }
            expected_previous = entry.entry_hash.unwrap_or_default();
        }
        Ok(true)
    }

    pub fn entries_for_work_order(&self, wo_id: &str) -> Result<Vec<DecisionEntry>, AuditError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|entry| entry.wo_id.as_deref() == Some(wo_id))
            .collect())
    }
}

fn read_entries(log_path: &Path) -> Result<Vec<DecisionEntry>, AuditError> {
    if !log_path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(log_path).map_err(|source| AuditError::io("opening", log_path, source))?;
    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| AuditError::io("reading", log_path, source))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|err| AuditError::Parse {
            path: log_path.to_path_buf(),
            line: index + 1,
            message: err.to_string(),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

fn read_last_hash(log_path: &Path) -> Result<String, AuditError> {
    let file = File::open(log_path).map_err(|source| AuditError::io("opening", log_path, source))?;
    let mut last_hash = GENESIS_CHECKSUM.to_string();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| AuditError::io("reading", log_path, source))?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(entry) = serde_json::from_str::<DecisionEntry>(&line)
            && let Some(hash) = entry.entry_hash
        {
            last_hash = hash;
        }
    }
    Ok(last_hash)
}
