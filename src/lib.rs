//! NSE intraday trading helper on the Kite Connect broker API.
//!
//! A single-process web service that holds one user's MIS positions from
//! entry to exit. Trades are queued, confirmed (manually or by the
//! `auto-confirm` sidecar), placed with the broker, and then tracked by the
//! exit engine until a take-profit or stop-loss threshold closes them.
//!
//! # Lifecycle
//!
//! ```text
//! queue_order ─▶ confirm ─▶ entry order ─▶ Position OPEN
//!                                              │ price crosses TP/SL
//!                                              ▼
//!                                        PENDING_EXIT
//!                                              │ exit order fills
//!                                              ▼
//!                                           CLOSED (realized P&L)
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`broker`]: Broker trait, Kite Connect client, test mock
//! - [`engine`]: Position lifecycle and the TP/SL exit engine
//! - [`queue`]: Pending entry/exit confirmation queue
//! - [`scanner`]: EMA/RSI/pivot indicators and universe scan
//! - [`journal`]: Trade and error logs
//! - [`hours`]: IST clock and NSE session window
//! - [`api`]: HTTP API (login flow, queue/confirm, status, logs)
//! - [`state`]: Shared application state
//! - [`metrics`]: Prometheus metrics
//! - [`universe`]: NIFTY 50 trading universe
//! - [`utils`]: Utility functions

pub mod api;
pub mod broker;
pub mod config;
pub mod engine;
pub mod error;
pub mod hours;
pub mod journal;
pub mod metrics;
pub mod queue;
pub mod scanner;
pub mod state;
pub mod universe;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
