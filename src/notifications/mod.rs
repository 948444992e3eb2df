//! Update notifications
//!
//! Observer registry used to tell attached text entities that the
//! authoritative state behind them changed.
//!
//! # Usage
//! ```ignore
//! use ocpp_remote_auth::notifications::{UpdateBus, UpdateNotice};
//!
//! let bus = UpdateBus::new();
//! let mut subscription = bus.subscribe();
//!
//! bus.publish(UpdateNotice::entities(["text.CP001_remote_id_tag"]));
//! let notice = subscription.recv().await;
//! // dropping `subscription` deregisters it
//! ```

pub mod event_bus;
pub mod events;

pub use event_bus::{Subscription, UpdateBus};
pub use events::UpdateNotice;
