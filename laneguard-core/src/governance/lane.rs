use serde::{Deserialize, Serialize};

use super::{World, Zone};

/// Execution track. Variants are ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lane {
    Fast,
    Warn,
    Strict,
    Blocked,
}

impl Lane {
    /// The fixed World x Zone table.
    pub const fn select(world: World, zone: Zone) -> Self {
        match (world, zone) {
            (_, Zone::Danger) => Lane::Blocked,
            (World::Background, _) => Lane::Strict,
            (World::Cli, Zone::Open) => Lane::Fast,
            (World::Cli, Zone::Locked) => Lane::Warn,
        }
    }

    pub fn most_restrictive(self, other: Lane) -> Lane {
        self.max(other)
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lane::Fast => write!(f, "FAST"),
            Lane::Warn => write!(f, "WARN"),
            Lane::Strict => write!(f, "STRICT"),
            Lane::Blocked => write!(f, "BLOCKED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_total() {
        let expected = [
            (World::Cli, Zone::Open, Lane::Fast),
            (World::Cli, Zone::Locked, Lane::Warn),
            (World::Cli, Zone::Danger, Lane::Blocked),
            (World::Background, Zone::Open, Lane::Strict),
            (World::Background, Zone::Locked, Lane::Strict),
            (World::Background, Zone::Danger, Lane::Blocked),
        ];
        for (world, zone, lane) in expected {
            assert_eq!(Lane::select(world, zone), lane, "{world} x {zone}");
        }
    }

    #[test]
    fn blocked_dominates() {
        assert_eq!(Lane::Fast.most_restrictive(Lane::Blocked), Lane::Blocked);
        assert_eq!(Lane::Strict.most_restrictive(Lane::Warn), Lane::Strict);
    }
}
