//! Propagation of a new remote tag towards the charge point side
//!
//! This is the one place where `set_remote_id_tag` suspends before the
//! authoritative record changes.

use async_trait::async_trait;

use crate::domain::{DomainResult, RemoteIdTag};

#[async_trait]
pub trait TagPropagator: Send + Sync {
    /// Deliver `tag` for `charge_point_id`. An error leaves the authoritative
    /// record untouched.
    async fn propagate(&self, charge_point_id: &str, tag: &RemoteIdTag) -> DomainResult<()>;
}

/// Propagator for deployments where the backend table is the only consumer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPropagator;

#[async_trait]
impl TagPropagator for NoopPropagator {
    async fn propagate(&self, _charge_point_id: &str, _tag: &RemoteIdTag) -> DomainResult<()> {
        Ok(())
    }
}
