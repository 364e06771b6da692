//! Closed vocabulary shared by every layer: worlds, zones, lanes, actors,
//! risk and the per-request context.

mod actors;
mod context;
mod lane;
mod risk;
mod world;
mod zone;

pub use actors::{ActorRegistry, ActorRole, canonical_actor};
pub use context::{OperationKind, RequestContext, SipMetadata};
pub use lane::Lane;
pub use risk::{RiskLevel, RollbackStrategy};
pub use world::{TriggerTable, World};
pub use zone::{Zone, ZoneClassifier, ZoneResolution};
