//! Application layer: the central system and the entities built on top of it

pub mod central_system;
pub mod propagation;
pub mod session;
pub mod text;

// Re-export key types for convenience
pub use central_system::{CentralSystem, SharedCentralSystem};
pub use propagation::{NoopPropagator, TagPropagator};
pub use session::{ConnectionStatus, SessionRegistry, SharedSessionRegistry};
pub use text::{
    resolve_initial_value, DisplayRecord, InitialValue, RemoteIdTagEntity, SetValueOutcome,
    TextFieldDescription, TextPlatform, REMOTE_ID_TAG_FIELD, TEXT_FIELDS,
};
