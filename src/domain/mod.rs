//! Domain layer
//!
//! Pure types and rules for remote authorization: the `remote_id_tag`
//! value object, authorization statuses and the per-charge-point
//! authoritative record. Nothing in here performs I/O.

pub mod charge_point;
pub mod error;
pub mod id_tag;
pub mod remote_id_tag;

pub use charge_point::{ChargePointAuthState, TagLifecycle, TagOrigin};
pub use error::{DomainError, DomainResult};
pub use id_tag::{AuthorizationPolicy, DefaultAuthorizationPolicy, IdTagStatus};
pub use remote_id_tag::{
    generate, normalize, NormalizeWarning, Normalized, RemoteIdTag, GENERATED_TAG_LENGTH,
    MAX_REMOTE_ID_TAG_LENGTH,
};
