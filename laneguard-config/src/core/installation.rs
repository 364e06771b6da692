use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Where the governed installation lives on disk.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct InstallationConfig {
    /// Installation root. Relative values resolve against the directory of
    /// the configuration file that declared them.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Engine state directory (locks, backups), relative to `root`.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for InstallationConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            state_dir: default_state_dir(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(constants::DEFAULT_STATE_DIR)
}
