//! Interfaces layer: OCPP WebSocket endpoint and REST API

pub mod http;
pub mod ws;
