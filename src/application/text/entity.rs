//! Remote id tag text entity
//!
//! Bridges the user-editable display value and the authoritative tag held by
//! the [`CentralSystem`](crate::application::CentralSystem).
//!
//! - On attach the display value is taken from the live tag if there is one,
//!   otherwise from the restore store (and pushed into the central system),
//!   otherwise left unset. See [`resolve_initial_value`].
//! - Edits are optimistic: the display changes first, then the central system
//!   is asked to follow. A failed edit keeps the display value and leaves
//!   `propagated == false`; nothing is rolled back.
//! - Update notices addressed to the entity re-read the central system.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::description::TextFieldDescription;
use crate::application::central_system::{CentralSystem, SharedCentralSystem};
use crate::domain::{DomainError, RemoteIdTag, TagOrigin};
use crate::infrastructure::storage::RestoreStateStore;
use crate::notifications::Subscription;
use crate::support::shutdown::ShutdownSignal;

/// Values a host persists when an entity had no real state
const PLACEHOLDER_VALUES: &[&str] = &["unknown", "unavailable"];

/// What the user currently sees.
///
/// `propagated == false` means the central system has not confirmed
/// `displayed_value` (yet).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayRecord {
    pub displayed_value: Option<String>,
    pub propagated: bool,
}

/// Where the display value comes from at attach time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialValue {
    /// The central system already holds a tag
    Live(String),
    /// A value persisted by a previous run
    Restored(String),
    Unset,
}

/// Pick the attach-time display value: live > persisted > unset.
///
/// Empty persisted values and host placeholders (`unknown`, `unavailable`)
/// count as absent.
pub fn resolve_initial_value(live: Option<&str>, persisted: Option<&str>) -> InitialValue {
    if let Some(live) = live.filter(|v| !v.is_empty()) {
        return InitialValue::Live(live.to_string());
    }

    match persisted {
        Some(value) if is_restorable(value) => InitialValue::Restored(value.to_string()),
        _ => InitialValue::Unset,
    }
}

fn is_restorable(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !PLACEHOLDER_VALUES.contains(&value)
}

/// Result of [`RemoteIdTagEntity::set_value`]
#[derive(Debug, Clone)]
pub struct SetValueOutcome {
    pub record: DisplayRecord,
    /// Why the central system did not take the value, if it did not
    pub error: Option<DomainError>,
}

pub struct RemoteIdTagEntity {
    entity_id: String,
    charge_point_id: String,
    description: TextFieldDescription,
    central: SharedCentralSystem,
    record: Arc<watch::Sender<DisplayRecord>>,
    teardown: ShutdownSignal,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteIdTagEntity {
    /// Attach an entity for `charge_point_id` and resolve its initial value.
    pub async fn attach(
        central: SharedCentralSystem,
        store: &dyn RestoreStateStore,
        charge_point_id: &str,
        description: TextFieldDescription,
    ) -> Self {
        let (record, _) = watch::channel(DisplayRecord {
            displayed_value: description.initial_value.map(str::to_string),
            propagated: false,
        });

        // Subscribe first so nothing published during resolution is lost.
        let subscription = central.subscribe();

        let entity = Self {
            entity_id: description.entity_id(charge_point_id),
            charge_point_id: charge_point_id.to_string(),
            description,
            central,
            record: Arc::new(record),
            teardown: ShutdownSignal::new(),
            listener: Mutex::new(None),
        };

        entity.resolve_initial(store).await;
        entity.spawn_listener(subscription);
        entity
    }

    async fn resolve_initial(&self, store: &dyn RestoreStateStore) {
        let live = self.central.get_remote_id_tag(&self.charge_point_id);

        let persisted = if live.is_none() {
            store
                .get_last_value(&self.entity_id)
                .await
                .unwrap_or_else(|e| {
                    warn!(entity_id = %self.entity_id, error = %e, "Failed to read restore state");
                    None
                })
        } else {
            None
        };

        // The store lookup may have suspended; a tag set meanwhile wins.
        let live = live.or_else(|| self.central.get_remote_id_tag(&self.charge_point_id));

        match resolve_initial_value(live.as_ref().map(RemoteIdTag::as_str), persisted.as_deref()) {
            InitialValue::Live(value) => {
                debug!(entity_id = %self.entity_id, value = %value, "Adopted live remote_id_tag");
                self.record.send_replace(DisplayRecord {
                    displayed_value: Some(value),
                    propagated: true,
                });
            }
            InitialValue::Restored(value) => {
                self.record.send_replace(DisplayRecord {
                    displayed_value: Some(value.clone()),
                    propagated: false,
                });

                match self
                    .central
                    .set_remote_id_tag(&self.charge_point_id, Some(&value), TagOrigin::Restored)
                    .await
                {
                    Ok(tag) => {
                        info!(
                            charge_point_id = %self.charge_point_id,
                            remote_id_tag = %tag,
                            "Restored remote_id_tag from previous session"
                        );
                        self.mark_propagated(&value, tag);
                    }
                    Err(e) => warn!(
                        charge_point_id = %self.charge_point_id,
                        error = %e,
                        "Restored remote_id_tag not applied (kept display value {})",
                        value
                    ),
                }
            }
            InitialValue::Unset => {
                debug!(entity_id = %self.entity_id, "No remote_id_tag to display yet");
            }
        }
    }

    fn spawn_listener(&self, mut subscription: Subscription) {
        let entity_id = self.entity_id.clone();
        let charge_point_id = self.charge_point_id.clone();
        let central = self.central.clone();
        let record = self.record.clone();
        let teardown = self.teardown.notified();

        let handle = tokio::spawn(async move {
            let teardown = teardown.wait();
            tokio::pin!(teardown);

            loop {
                tokio::select! {
                    _ = &mut teardown => break,
                    notice = subscription.recv() => match notice {
                        Some(notice) if notice.matches(&entity_id) => {
                            refresh(&central, &charge_point_id, &record);
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            debug!(entity_id = %entity_id, "Update listener stopped");
        });

        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Apply a user edit.
    ///
    /// The display shows `value` (unconfirmed) before the central system is
    /// called. Success marks it propagated; failure is logged and reported in
    /// the outcome while the display keeps `value`. Detaching cancels an
    /// in-flight call.
    pub async fn set_value(&self, value: &str) -> SetValueOutcome {
        self.record.send_replace(DisplayRecord {
            displayed_value: Some(value.to_string()),
            propagated: false,
        });

        let cancelled = self.teardown.notified();
        let result = tokio::select! {
            biased;
            _ = cancelled.wait() => None,
            result = self.central.set_remote_id_tag(
                &self.charge_point_id,
                Some(value),
                TagOrigin::UserEdit,
            ) => Some(result),
        };

        let error = match result {
            Some(Ok(tag)) => {
                info!(
                    charge_point_id = %self.charge_point_id,
                    remote_id_tag = %tag,
                    "Remote ID tag set"
                );
                self.mark_propagated(value, tag);
                None
            }
            Some(Err(e)) => {
                warn!(
                    charge_point_id = %self.charge_point_id,
                    "Set remote ID tag failed: {} (kept optimistic value {})",
                    e,
                    value
                );
                Some(e)
            }
            None => {
                debug!(entity_id = %self.entity_id, "Set remote ID tag cancelled by detach");
                None
            }
        };

        SetValueOutcome {
            record: self.state(),
            error,
        }
    }

    /// Replace the pending `value` with the tag the central system accepted,
    /// unless a newer edit replaced it meanwhile.
    fn mark_propagated(&self, value: &str, tag: RemoteIdTag) {
        self.record.send_if_modified(|record| {
            if record.displayed_value.as_deref() == Some(value) && !record.propagated {
                record.displayed_value = Some(tag.into_inner());
                record.propagated = true;
                true
            } else {
                false
            }
        });
    }

    /// Stop listening and cancel in-flight propagation. Idempotent.
    pub fn detach(&self) {
        if !self.teardown.is_triggered() {
            debug!(entity_id = %self.entity_id, "Detaching text entity");
        }
        self.teardown.trigger();
        if let Some(handle) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    pub fn is_detached(&self) -> bool {
        self.teardown.is_triggered()
    }

    pub fn state(&self) -> DisplayRecord {
        self.record.borrow().clone()
    }

    /// Observe display changes
    pub fn watch(&self) -> watch::Receiver<DisplayRecord> {
        self.record.subscribe()
    }

    /// Unavailable whenever the charge point is not connected
    pub fn available(&self) -> bool {
        self.central.get_available(&self.charge_point_id, false)
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn charge_point_id(&self) -> &str {
        &self.charge_point_id
    }

    pub fn description(&self) -> &TextFieldDescription {
        &self.description
    }
}

impl Drop for RemoteIdTagEntity {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Re-read the central system and re-render.
///
/// An unconfirmed edit is left on screen.
fn refresh(central: &CentralSystem, charge_point_id: &str, record: &watch::Sender<DisplayRecord>) {
    let live = central.get_remote_id_tag(charge_point_id);
    record.send_modify(|record| {
        if record.propagated || record.displayed_value.is_none() {
            if let Some(tag) = live {
                record.displayed_value = Some(tag.into_inner());
                record.propagated = true;
            }
        }
    });
}
