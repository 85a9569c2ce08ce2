//! Device identity and reported device state.
//!
//! - [`DeviceRegistry`]: create, list, look up and delete devices
//! - [`StateTracker`]: upsert and read the latest reported state blob

pub mod registry;
pub mod state;

pub use registry::{DeviceRegistry, NewDevice};
pub use state::StateTracker;
