use std::collections::HashMap;

use laneguard_config::TriggersConfig;
use serde::{Deserialize, Serialize};

/// Origin of a write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum World {
    /// Interactive, a human is at the keyboard.
    #[serde(alias = "cli")]
    Cli,
    /// Unattended (schedulers, bridges, Work Orders).
    #[serde(alias = "background")]
    Background,
}

impl World {
    /// The trigger token this world is always reachable through.
    pub const fn canonical_trigger(self) -> &'static str {
        match self {
            World::Cli => "cli",
            World::Background => "background",
        }
    }
}

impl std::fmt::Display for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            World::Cli => write!(f, "CLI"),
            World::Background => write!(f, "BACKGROUND"),
        }
    }
}

/// Lower-cased trigger token to world lookup.
#[derive(Debug, Clone)]
pub struct TriggerTable {
    worlds: HashMap<String, World>,
}

impl TriggerTable {
    pub fn from_config(config: &TriggersConfig) -> Self {
        let mut worlds = HashMap::new();
        for world in [World::Cli, World::Background] {
            worlds.insert(world.canonical_trigger().to_string(), world);
        }
        for token in &config.cli {
            worlds.insert(normalize_trigger(token), World::Cli);
        }
        for token in &config.background {
            worlds.insert(normalize_trigger(token), World::Background);
        }
        Self { worlds }
    }

    /// World for a known trigger. Unknown tokens yield `None`; the caller
    /// decides whether a work-order context overrides that.
    pub fn lookup(&self, trigger: &str) -> Option<World> {
        self.worlds.get(&normalize_trigger(trigger)).copied()
    }
}

impl Default for TriggerTable {
    fn default() -> Self {
        Self::from_config(&TriggersConfig::default())
    }
}

fn normalize_trigger(token: &str) -> String {
    token.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let table = TriggerTable::default();
        assert_eq!(table.lookup(" Cursor "), Some(World::Cli));
        assert_eq!(table.lookup("LAUNCHD"), Some(World::Background));
        assert_eq!(table.lookup("carrier-pigeon"), None);
    }

    #[test]
    fn canonical_tokens_survive_custom_tables() {
        let config = TriggersConfig {
            cli: Default::default(),
            background: Default::default(),
        };
        let table = TriggerTable::from_config(&config);
        assert_eq!(table.lookup("cli"), Some(World::Cli));
        assert_eq!(table.lookup("background"), Some(World::Background));
    }
}
