//! Update bus for fanning notices out to subscribers
//!
//! Each subscriber gets its own unbounded queue. Subscribers are kept in a
//! registry ordered by subscription time, and `publish` walks it in that
//! order. The [`Subscription`] handle removes itself from the registry when
//! dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::events::UpdateNotice;

type SubscriberMap = BTreeMap<u64, mpsc::UnboundedSender<UpdateNotice>>;

struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<SubscriberMap>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, SubscriberMap> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Observer registry for update notices
#[derive(Clone)]
pub struct UpdateBus {
    registry: Arc<Registry>,
}

impl UpdateBus {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                subscribers: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Deliver `notice` to every live subscriber, oldest first.
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, notice: UpdateNotice) -> usize {
        let mut subscribers = self.registry.lock();
        subscribers.retain(|_, sender| sender.send(notice.clone()).is_ok());
        let count = subscribers.len();
        debug!(?notice, subscribers = count, "Update notice published");
        count
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::unbounded_channel();
        let count = {
            let mut subscribers = self.registry.lock();
            subscribers.insert(id, sender);
            subscribers.len()
        };
        info!(subscription_id = id, total = count, "New update subscriber");

        Subscription {
            id,
            receiver,
            registry: self.registry.clone(),
        }
    }

    /// Get current subscriber count
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().len()
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one registered subscriber. Dropping it deregisters.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<UpdateNotice>,
    registry: Arc<Registry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Receive the next notice; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<UpdateNotice> {
        self.receiver.recv().await
    }

    /// Take a pending notice without waiting
    pub fn try_recv(&mut self) -> Option<UpdateNotice> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = {
            let mut subscribers = self.registry.lock();
            subscribers.remove(&self.id);
            subscribers.len()
        };
        info!(subscription_id = self.id, remaining, "Update subscriber released");
    }
}
