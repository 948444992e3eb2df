//! Default authorization policy

use std::collections::HashMap;

use tracing::warn;

use super::IdTagStatus;

/// Resolves the status of tags that are not a charge point's remote tag.
pub trait AuthorizationPolicy: Send + Sync {
    fn status_for(&self, id_tag: &str) -> IdTagStatus;
}

/// Static list of known tags plus a fallback status for everything else.
///
/// The fallback is never `Accepted`: unknown tags must not be authorized
/// implicitly.
#[derive(Debug, Clone)]
pub struct DefaultAuthorizationPolicy {
    known: HashMap<String, IdTagStatus>,
    unknown_status: IdTagStatus,
}

impl DefaultAuthorizationPolicy {
    pub fn new(unknown_status: IdTagStatus) -> Self {
        let unknown_status = if unknown_status.is_accepted() {
            warn!("Default authorization status 'Accepted' is not allowed, using 'Invalid'");
            IdTagStatus::Invalid
        } else {
            unknown_status
        };

        Self {
            known: HashMap::new(),
            unknown_status,
        }
    }

    pub fn with_id_tag(mut self, id_tag: impl Into<String>, status: IdTagStatus) -> Self {
        self.known.insert(id_tag.into(), status);
        self
    }

    pub fn unknown_status(&self) -> IdTagStatus {
        self.unknown_status
    }
}

impl Default for DefaultAuthorizationPolicy {
    fn default() -> Self {
        Self::new(IdTagStatus::Invalid)
    }
}

impl AuthorizationPolicy for DefaultAuthorizationPolicy {
    fn status_for(&self, id_tag: &str) -> IdTagStatus {
        self.known
            .get(id_tag)
            .copied()
            .unwrap_or(self.unknown_status)
    }
}
