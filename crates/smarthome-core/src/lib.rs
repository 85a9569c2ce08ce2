//! Shared vocabulary for the SmartHome control plane.
//!
//! Entity types, the error taxonomy, and the clock / id-generator seams used
//! by the storage, device and command crates.

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use types::{
    Command, CommandId, CommandStatus, Device, DeviceId, DeviceState, JsonBlob, Transition,
};
