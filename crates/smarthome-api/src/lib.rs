//! HTTP gateway for the SmartHome control plane.
//!
//! Translates JSON requests into registry, state tracker and command
//! lifecycle calls. Holds no state beyond the shared service handles.

pub mod auth;
pub mod handlers;
pub mod models;
pub mod server;
pub mod shutdown;

pub use server::{create_router, run, serve, ServerState};
