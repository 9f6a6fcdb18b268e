//! Domain layer between `lifesmart-api` and a home-automation host.
//!
//! This crate turns a LifeSmart account into host-facing entities and
//! keeps them current:
//!
//! - **[`Integration`]**: per-account context. [`setup()`](Integration::setup)
//!   loads the inventory, registers entities, opens the push channel and
//!   spawns the router task. [`execute()`](Integration::execute) encodes and
//!   submits [`Command`]s; [`shutdown()`](Integration::shutdown) joins every
//!   background task.
//!
//! - **Classification** ([`classify`]): one static table from
//!   `(device type, sub-channel)` to entity kind, device class and decode
//!   strategy. [`identity`] derives the canonical entity id used both for
//!   registration and for routing live updates.
//!
//! - **Wire codec** ([`codec`], [`decode`]): type parity, packed WRGB colors,
//!   tenths-of-a-degree temperatures, lock events, cover motion.
//!
//! - **[`EntityRegistry`]**: `DashMap` of `watch` channels, one per entity,
//!   plus a snapshot and a broadcast of [`StateChanged`] events.
//!
//! - **[`DeviceApi`]**: the capability interface the integration needs from
//!   the cloud. Implemented for [`lifesmart_api::ApiClient`].

pub mod api;
pub mod classify;
pub mod codec;
pub mod command;
pub mod config;
pub mod decode;
pub mod error;
pub mod identity;
pub mod integration;
pub mod inventory;
pub mod model;
pub mod router;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use api::{DeviceApi, PushLink};
pub use classify::{Family, Rule, Strategy, classify};
pub use command::{ApiCall, Command, CommandOutcome};
pub use config::{IntegrationConfig, UserAuth};
pub use error::CoreError;
pub use identity::build_identity;
pub use integration::Integration;
pub use router::{RouteOutcome, Router};
pub use store::{DeviceStore, EntityRegistry, StateChanged};
pub use stream::{EntityStream, EntityWatch, RegistrySnapshot};

pub use model::{
    AttributeValue, Attributes, CoverMotion, DeviceClass, DeviceInfo, Entity, EntityId, EntityKind,
    EntityState, FanSpeed, HvacMode, StateDelta,
};

// Transport types that appear in this crate's public API.
pub use lifesmart_api::{AcKeys, IoMessage, IrCodes, IrKeys, PushState, RawDevice, ReconnectConfig};
