//! Editable text entities
//!
//! One entity per charge point and text field. An entity mirrors the
//! authoritative `remote_id_tag` into a user-editable display value and
//! forwards edits back into the [`CentralSystem`](super::CentralSystem).

pub mod description;
pub mod entity;
pub mod platform;

pub use description::{TextFieldDescription, REMOTE_ID_TAG_FIELD, TEXT_FIELDS};
pub use entity::{
    resolve_initial_value, DisplayRecord, InitialValue, RemoteIdTagEntity, SetValueOutcome,
};
pub use platform::TextPlatform;
