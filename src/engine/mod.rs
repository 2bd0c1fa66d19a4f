//! Position lifecycle and the TP/SL exit engine.
//!
//! - [`position`]: the `Position` record and its monotonic lifecycle
//! - [`exit`]: pure exit-route policy
//! - [`orders`]: confirmed entry/exit placement
//! - [`watcher`]: the periodic evaluation task

pub mod exit;
pub mod orders;
pub mod position;
pub mod watcher;

pub use exit::{choose_exit_route, ExitRoute};
pub use position::{ExitPreference, ExitReason, Position, PositionStatus, Side};
pub use watcher::ExitWatcher;
