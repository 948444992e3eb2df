//! IdTag authorization
//!
//! OCPP authorization statuses and the fallback policy for tags that are
//! not a charge point's own remote tag.

pub mod model;
pub mod policy;

pub use model::IdTagStatus;
pub use policy::{AuthorizationPolicy, DefaultAuthorizationPolicy};
