//! WebSocket interfaces
//!
//! - `ocpp_server`: OCPP 1.6 WebSocket server
//! - `handler`: per-connection OCPP 1.6 message dispatch

pub mod handler;
pub mod ocpp_server;

pub use handler::OcppHandler;
pub use ocpp_server::OcppServer;
