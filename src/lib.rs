//! # OCPP remote authorization
//!
//! OCPP 1.6 central system that gives every charge point a `remote_id_tag`,
//! authorizes it, and exposes it as a user-editable value that survives
//! restarts.
//!
//! - **domain**: the tag value object, validation, generation and the
//!   per-charge-point authorization record
//! - **application**: the central system, sessions and the text entities
//!   that mirror tags into editable values
//! - **infrastructure**: restore-state storage
//! - **notifications**: update notices for attached entities
//! - **interfaces**: OCPP WebSocket endpoint and REST API

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod notifications;
pub mod server;
pub mod support;

pub use config::{default_config_path, AppConfig, Config};

pub use application::{CentralSystem, RemoteIdTagEntity, SharedCentralSystem, TextPlatform};

pub use interfaces::http::create_api_router;
