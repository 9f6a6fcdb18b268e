// lifesmart-api: Async Rust client for the LifeSmart cloud (signed REST + push channel)

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod sign;
pub mod transport;
pub mod websocket;

mod devices;
mod ir;
mod scenes;

pub use auth::{Credentials, Endpoint, Session};
pub use client::ApiClient;
pub use error::Error;
pub use devices::IoWrite;
pub use ir::{AcKeys, IrCodes, IrKeys};
pub use models::{IoMessage, IoPoint, PushFrame, RawDevice, Scene};
pub use sign::{Params, Signer};
pub use transport::TransportConfig;
pub use websocket::{PushChannel, PushState, ReconnectConfig};
