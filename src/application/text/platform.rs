//! Text platform: owns the attached entities and persists their display
//! values to the restore store.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::description::{TextFieldDescription, REMOTE_ID_TAG_FIELD, TEXT_FIELDS};
use super::entity::{DisplayRecord, RemoteIdTagEntity};
use crate::application::central_system::SharedCentralSystem;
use crate::infrastructure::storage::RestoreStateStore;

pub struct TextPlatform {
    central: SharedCentralSystem,
    store: Arc<dyn RestoreStateStore>,
    entities: DashMap<String, Arc<RemoteIdTagEntity>>,
    writers: DashMap<String, JoinHandle<()>>,
}

impl TextPlatform {
    pub fn new(central: SharedCentralSystem, store: Arc<dyn RestoreStateStore>) -> Self {
        Self {
            central,
            store,
            entities: DashMap::new(),
            writers: DashMap::new(),
        }
    }

    /// Attach every text field of a charge point.
    ///
    /// Fields already attached are left alone. Returns the entity ids.
    pub async fn attach_charge_point(&self, charge_point_id: &str) -> Vec<String> {
        let mut attached = Vec::with_capacity(TEXT_FIELDS.len());
        for description in TEXT_FIELDS {
            let entity_id = description.entity_id(charge_point_id);
            if !self.entities.contains_key(&entity_id) {
                self.attach_field(charge_point_id, *description).await;
            }
            attached.push(entity_id);
        }
        attached
    }

    /// Attach every charge point the central system knows
    pub async fn attach_all(&self) -> usize {
        let ids = self.central.charge_point_ids();
        for charge_point_id in &ids {
            self.attach_charge_point(charge_point_id).await;
        }
        info!(count = ids.len(), "Text entities attached");
        ids.len()
    }

    async fn attach_field(&self, charge_point_id: &str, description: TextFieldDescription) {
        let entity = Arc::new(
            RemoteIdTagEntity::attach(
                self.central.clone(),
                self.store.as_ref(),
                charge_point_id,
                description,
            )
            .await,
        );
        let entity_id = entity.entity_id().to_string();

        let writer = spawn_writer(entity.as_ref(), self.store.clone());
        if let Some(previous) = self.writers.insert(entity_id.clone(), writer) {
            previous.abort();
        }
        if let Some(previous) = self.entities.insert(entity_id.clone(), entity) {
            previous.detach();
        }
        debug!(entity_id = %entity_id, "Text entity attached");
    }

    pub fn entity(&self, entity_id: &str) -> Option<Arc<RemoteIdTagEntity>> {
        self.entities.get(entity_id).map(|e| e.value().clone())
    }

    pub fn remote_id_tag_entity(&self, charge_point_id: &str) -> Option<Arc<RemoteIdTagEntity>> {
        self.entity(&REMOTE_ID_TAG_FIELD.entity_id(charge_point_id))
    }

    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Detach every entity of a charge point. Returns how many were detached.
    pub fn detach_charge_point(&self, charge_point_id: &str) -> usize {
        let mut detached = 0;
        for description in TEXT_FIELDS {
            let entity_id = description.entity_id(charge_point_id);
            if let Some((_, entity)) = self.entities.remove(&entity_id) {
                entity.detach();
                detached += 1;
            }
            if let Some((_, writer)) = self.writers.remove(&entity_id) {
                writer.abort();
            }
        }
        detached
    }

    /// Detach everything and write the final display values.
    pub async fn shutdown(&self) {
        let ids = self.entity_ids();
        for entity_id in &ids {
            if let Some((_, writer)) = self.writers.remove(entity_id) {
                writer.abort();
            }
            let Some((_, entity)) = self.entities.remove(entity_id) else {
                continue;
            };
            entity.detach();

            let state = entity.state();
            if let Err(e) = self
                .store
                .save_value(entity_id, state.displayed_value.as_deref())
                .await
            {
                warn!(entity_id = %entity_id, error = %e, "Failed to save restore state");
            }
        }
        info!(count = ids.len(), "Text entities detached");
    }
}

/// Save the display value whenever it changes.
fn spawn_writer(entity: &RemoteIdTagEntity, store: Arc<dyn RestoreStateStore>) -> JoinHandle<()> {
    let entity_id = entity.entity_id().to_string();
    let mut rx = entity.watch();

    tokio::spawn(async move {
        let mut last_saved: Option<Option<String>> = None;
        loop {
            let DisplayRecord {
                displayed_value, ..
            } = rx.borrow_and_update().clone();

            if last_saved.as_ref() != Some(&displayed_value) {
                match store.save_value(&entity_id, displayed_value.as_deref()).await {
                    Ok(()) => last_saved = Some(displayed_value),
                    Err(e) => {
                        warn!(entity_id = %entity_id, error = %e, "Failed to save restore state")
                    }
                }
            }

            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}
