//! HTTP and WebSocket transport for the lift dispatch engine.

pub mod error;
pub mod routes;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
