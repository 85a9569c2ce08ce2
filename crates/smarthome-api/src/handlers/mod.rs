//! API handlers organized by domain.

pub mod basic;
pub mod commands;
pub mod common;
pub mod device_state;
pub mod devices;

pub use crate::server::ServerState;
