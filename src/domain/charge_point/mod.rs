//! Charge point authorization aggregate

pub mod auth_state;

pub use auth_state::{ChargePointAuthState, TagLifecycle, TagOrigin};
