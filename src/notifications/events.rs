//! Notification payloads

use std::collections::BTreeSet;

/// What a published update concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateNotice {
    /// Every subscriber should refresh
    All,
    /// Only the listed entity ids should refresh
    Entities(BTreeSet<String>),
}

impl UpdateNotice {
    pub fn entities<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Entities(ids.into_iter().map(Into::into).collect())
    }

    /// Whether the entity `entity_id` is addressed by this notice
    pub fn matches(&self, entity_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Entities(ids) => ids.contains(entity_id),
        }
    }
}
