//! Authoritative per-charge-point authorization record

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::id_tag::{AuthorizationPolicy, IdTagStatus};
use crate::domain::RemoteIdTag;

/// Where the remote tag of a charge point stands.
///
/// `Unresolved -> Configured | Generated -> Active`. Once `Active`, only a
/// tag replacement happens, and it stays `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagLifecycle {
    Unresolved,
    Configured,
    Generated,
    Active,
}

/// Who asked for the current tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOrigin {
    /// Operator value from configuration
    Configured,
    /// Produced by the generator
    Generated,
    /// Display value recovered at startup
    Restored,
    /// Edited through the text entity
    UserEdit,
    /// Direct API call
    Api,
}

impl TagOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Generated => "generated",
            Self::Restored => "restored",
            Self::UserEdit => "user_edit",
            Self::Api => "api",
        }
    }
}

impl std::fmt::Display for TagOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative record for one charge point.
///
/// Invariant: when `remote_id_tag` is set, `authorization_table` maps it to
/// `Accepted`.
#[derive(Debug, Clone)]
pub struct ChargePointAuthState {
    cpid: String,
    remote_id_tag: Option<RemoteIdTag>,
    lifecycle: TagLifecycle,
    authorization_table: HashMap<String, IdTagStatus>,
}

impl ChargePointAuthState {
    pub fn new(cpid: impl Into<String>) -> Self {
        Self {
            cpid: cpid.into(),
            remote_id_tag: None,
            lifecycle: TagLifecycle::Unresolved,
            authorization_table: HashMap::new(),
        }
    }

    pub fn cpid(&self) -> &str {
        &self.cpid
    }

    pub fn remote_id_tag(&self) -> Option<&RemoteIdTag> {
        self.remote_id_tag.as_ref()
    }

    pub fn lifecycle(&self) -> TagLifecycle {
        self.lifecycle
    }

    pub fn is_resolved(&self) -> bool {
        self.remote_id_tag.is_some()
    }

    /// Install `tag` as the remote tag. Returns `false` when it already was.
    ///
    /// The previous tag loses its table entry; it may still resolve through
    /// the default policy.
    pub fn apply_tag(&mut self, tag: RemoteIdTag, origin: TagOrigin) -> bool {
        if self.remote_id_tag.as_ref() == Some(&tag) {
            return false;
        }

        if let Some(previous) = self.remote_id_tag.take() {
            self.authorization_table.remove(previous.as_str());
        }

        self.authorization_table
            .insert(tag.as_str().to_string(), IdTagStatus::Accepted);
        self.remote_id_tag = Some(tag);

        self.lifecycle = match self.lifecycle {
            TagLifecycle::Unresolved if origin == TagOrigin::Generated => TagLifecycle::Generated,
            TagLifecycle::Unresolved => TagLifecycle::Configured,
            _ => TagLifecycle::Active,
        };
        true
    }

    /// Move a resolved record to `Active` (the charge point came up with it).
    pub fn activate(&mut self) {
        if matches!(
            self.lifecycle,
            TagLifecycle::Configured | TagLifecycle::Generated
        ) {
            self.lifecycle = TagLifecycle::Active;
        }
    }

    /// Status of `id_tag` for this charge point.
    pub fn authorization_status(
        &self,
        id_tag: &str,
        policy: &dyn AuthorizationPolicy,
    ) -> IdTagStatus {
        if let Some(status) = self.authorization_table.get(id_tag) {
            return *status;
        }
        policy.status_for(id_tag)
    }

    pub fn authorization_table(&self) -> &HashMap<String, IdTagStatus> {
        &self.authorization_table
    }
}
