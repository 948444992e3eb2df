//! Storage trait definitions

use async_trait::async_trait;

use crate::domain::DomainResult;

/// Persisted display values, keyed by entity id (last write wins)
#[async_trait]
pub trait RestoreStateStore: Send + Sync {
    /// Value the entity displayed before the last shutdown
    async fn get_last_value(&self, entity_id: &str) -> DomainResult<Option<String>>;

    /// Record the current display value; `None` clears it
    async fn save_value(&self, entity_id: &str, value: Option<&str>) -> DomainResult<()>;
}
