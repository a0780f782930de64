//! Liveness endpoint for uptime pollers

pub mod server;

pub use server::{start_web_server, AppState, WebServerConfig};
