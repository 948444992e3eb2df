//! Remote id tag DTOs

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::application::{RemoteIdTagEntity, REMOTE_ID_TAG_FIELD};
use crate::domain::{IdTagStatus, TagLifecycle};

/// What a client sees for one charge point
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteIdTagDto {
    pub charge_point_id: String,
    pub entity_id: String,
    /// Value on display; may be unconfirmed
    pub displayed_value: Option<String>,
    pub propagated: bool,
    pub available: bool,
    /// Value the central system currently authorizes
    pub remote_id_tag: Option<String>,
    pub lifecycle: Option<TagLifecycle>,
    /// Why the last edit was not applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl RemoteIdTagDto {
    pub fn from_entity(
        entity: &RemoteIdTagEntity,
        remote_id_tag: Option<String>,
        lifecycle: Option<TagLifecycle>,
    ) -> Self {
        let record = entity.state();
        Self {
            charge_point_id: entity.charge_point_id().to_string(),
            entity_id: entity.entity_id().to_string(),
            displayed_value: record.displayed_value,
            propagated: record.propagated,
            available: entity.available(),
            remote_id_tag,
            lifecycle,
            last_error: None,
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.last_error = error;
        self
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetRemoteIdTagRequest {
    #[validate(
        length(min = 1, max = 20, message = "must be 1 to 20 characters"),
        custom(function = "validate_ui_charset")
    )]
    pub value: String,
}

fn validate_ui_charset(value: &str) -> Result<(), ValidationError> {
    if REMOTE_ID_TAG_FIELD.accepts(value) {
        Ok(())
    } else {
        let mut error = ValidationError::new("pattern");
        error.message = Some("must match ^[A-Z0-9]+$".into());
        Err(error)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizationDto {
    pub charge_point_id: String,
    pub id_tag: String,
    pub status: IdTagStatus,
}
