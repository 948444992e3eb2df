//! In-memory restore store

use async_trait::async_trait;
use dashmap::DashMap;

use super::RestoreStateStore;
use crate::domain::DomainResult;

/// In-memory store for development and testing
#[derive(Debug, Default)]
pub struct InMemoryRestoreStore {
    values: DashMap<String, String>,
}

impl InMemoryRestoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value, as if it had been saved by a previous run
    pub fn with_value(self, entity_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(entity_id.into(), value.into());
        self
    }

    pub fn value(&self, entity_id: &str) -> Option<String> {
        self.values.get(entity_id).map(|v| v.clone())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl RestoreStateStore for InMemoryRestoreStore {
    async fn get_last_value(&self, entity_id: &str) -> DomainResult<Option<String>> {
        Ok(self.value(entity_id))
    }

    async fn save_value(&self, entity_id: &str, value: Option<&str>) -> DomainResult<()> {
        match value {
            Some(value) => {
                self.values.insert(entity_id.to_string(), value.to_string());
            }
            None => {
                self.values.remove(entity_id);
            }
        }
        Ok(())
    }
}
