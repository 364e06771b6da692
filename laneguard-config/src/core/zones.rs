use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::constants::{mission_scope, zones};

/// Path prefixes that drive zone classification.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ZonesConfig {
    /// Relative prefixes (governance, bridge core, launch configuration).
    #[serde(default = "default_locked_prefixes")]
    pub locked_prefixes: Vec<String>,

    /// Absolute prefixes that are always DANGER. Absolute paths inside the
    /// installation root are also accepted here.
    #[serde(default = "default_danger_prefixes")]
    pub danger_prefixes: Vec<String>,

    /// Credential locations, `~` expanded at startup.
    #[serde(default = "default_credential_dirs")]
    pub credential_dirs: Vec<String>,
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            locked_prefixes: default_locked_prefixes(),
            danger_prefixes: default_danger_prefixes(),
            credential_dirs: default_credential_dirs(),
        }
    }
}

impl ZonesConfig {
    pub fn validate(&self) -> Result<()> {
        for prefix in &self.locked_prefixes {
            if prefix.trim().is_empty() || prefix.starts_with('/') {
                bail!("zones.locked_prefixes entries must be non-empty relative prefixes, got '{prefix}'");
            }
        }
        for prefix in &self.danger_prefixes {
            if !prefix.starts_with('/') {
                bail!("zones.danger_prefixes entries must be absolute, got '{prefix}'");
            }
        }
        Ok(())
    }
}

/// Mission Scope: which LOCKED paths the privileged CLI writer may
/// auto-approve. The blacklist always wins over the whitelist.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MissionScopeConfig {
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<String>,

    #[serde(default = "default_blacklist")]
    pub blacklist: Vec<String>,
}

impl Default for MissionScopeConfig {
    fn default() -> Self {
        Self {
            whitelist: default_whitelist(),
            blacklist: default_blacklist(),
        }
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn default_locked_prefixes() -> Vec<String> {
    owned(zones::LOCKED_PREFIXES)
}

fn default_danger_prefixes() -> Vec<String> {
    owned(zones::DANGER_PREFIXES)
}

fn default_credential_dirs() -> Vec<String> {
    owned(zones::CREDENTIAL_DIRS)
}

fn default_whitelist() -> Vec<String> {
    owned(mission_scope::WHITELIST)
}

fn default_blacklist() -> Vec<String> {
    owned(mission_scope::BLACKLIST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_absolute_locked_prefix() {
        let config = ZonesConfig {
            locked_prefixes: vec!["/core".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_mission_scope_blacklists_state_dir() {
        let scope = MissionScopeConfig::default();
        assert!(scope.blacklist.iter().any(|entry| entry == ".laneguard/"));
    }
}
