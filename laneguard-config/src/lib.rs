//! Startup configuration for laneguard.
//!
//! Everything the engine treats as policy (actor capabilities, trigger
//! vocabulary, zone prefixes, Mission Scope, approval limits, lock timing,
//! inbox layout) is loaded here once and shared read-only.

pub mod constants;
pub mod core;
pub mod debug;
pub mod loader;

pub use crate::core::{
    ActorsConfig, AuditConfig, InstallationConfig, LocksConfig, MissionScopeConfig,
    PolicyLimitsConfig, TriggersConfig, WorkOrdersConfig, ZonesConfig,
};
pub use debug::{DebugConfig, TraceLevel};
pub use loader::{ConfigManager, GovernanceConfig};
