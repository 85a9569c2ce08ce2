//! Command lifecycle: dispatch, acknowledgement and expiry.
//!
//! Commands start `pending` and move exactly once to `acked`, `failed` or
//! `timeout`. Acknowledgement and expiry race; the first to reach the store
//! wins and the other becomes a no-op.

pub mod lifecycle;
pub mod sweeper;

pub use lifecycle::CommandManager;
pub use sweeper::{ExpirySweeper, SweepReport, SweeperConfig};
