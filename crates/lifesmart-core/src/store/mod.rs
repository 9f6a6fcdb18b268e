// ── Per-integration state ──

mod devices;
mod registry;

pub use devices::DeviceStore;
pub use registry::{EntityRegistry, StateChanged};
