//! HTTP API module: login flow, queue/confirm workflow, status, and logs.

pub mod handlers;
pub mod routes;

pub use routes::create_router;
