pub mod identities;
pub mod installation;
pub mod limits;
pub mod storage;
pub mod zones;

pub use identities::{ActorsConfig, TriggersConfig};
pub use installation::InstallationConfig;
pub use limits::{LocksConfig, PolicyLimitsConfig};
pub use storage::{AuditConfig, WorkOrdersConfig};
pub use zones::{MissionScopeConfig, ZonesConfig};
