// ── Domain model ──
//
// Host-facing entity types. Everything the router and command dispatch
// produce is expressed in these terms; vendor wire shapes stay in
// `lifesmart_api::models`.

pub mod entity;
pub mod entity_id;
pub mod state;

pub use entity::{DeviceInfo, Entity, StateDelta};
pub use entity_id::{EntityId, EntityKind, ParseEntityIdError};
pub use state::{AttributeValue, Attributes, CoverMotion, DeviceClass, EntityState, FanSpeed, HvacMode};
