//! Persistent entity store for devices, device state and commands.
//!
//! Backed by redb. Every conditional transition runs inside one write
//! transaction; redb admits a single writer at a time.

pub mod commands;
pub mod devices;
pub mod error;
pub mod state;
pub mod store;

pub use error::{Error, Result};
pub use store::{Store, StoreOptions, MEMORY_PATH, SCHEMA_VERSION};
