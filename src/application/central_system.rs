//! Central system: owner of every charge point's authoritative record
//!
//! All mutation of `remote_id_tag` and the authorization tables goes through
//! here. Map guards are never held across an `.await`; every handler
//! re-reads state after a suspension point.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::propagation::{NoopPropagator, TagPropagator};
use super::session::{SessionRegistry, SharedSessionRegistry};
use super::text::TEXT_FIELDS;
use crate::domain::{
    generate, normalize, AuthorizationPolicy, ChargePointAuthState, DefaultAuthorizationPolicy,
    DomainError, DomainResult, IdTagStatus, NormalizeWarning, RemoteIdTag, TagLifecycle,
    TagOrigin,
};
use crate::notifications::{Subscription, UpdateBus, UpdateNotice};

/// Poll interval used by [`CentralSystem::wait_ready`]
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared, reference-counted central system
pub type SharedCentralSystem = Arc<CentralSystem>;

pub struct CentralSystem {
    charge_points: DashMap<String, ChargePointAuthState>,
    sessions: SharedSessionRegistry,
    update_bus: UpdateBus,
    policy: Arc<dyn AuthorizationPolicy>,
    propagator: Arc<dyn TagPropagator>,
}

impl CentralSystem {
    pub fn new(policy: Arc<dyn AuthorizationPolicy>) -> Self {
        Self {
            charge_points: DashMap::new(),
            sessions: SessionRegistry::shared(),
            update_bus: UpdateBus::new(),
            policy,
            propagator: Arc::new(NoopPropagator),
        }
    }

    pub fn with_propagator(mut self, propagator: Arc<dyn TagPropagator>) -> Self {
        self.propagator = propagator;
        self
    }

    pub fn shared(self) -> SharedCentralSystem {
        Arc::new(self)
    }

    // ── Registration ───────────────────────────────────────

    /// Add a charge point from configuration.
    ///
    /// A usable configured value resolves the tag immediately. Without one the
    /// record stays unresolved until a restore or the first connection fills
    /// it. Returns the warnings raised while normalizing the configured value.
    pub fn add_charge_point(
        &self,
        charge_point_id: &str,
        configured_tag: Option<&str>,
    ) -> DomainResult<Vec<NormalizeWarning>> {
        let slot = match self.charge_points.entry(charge_point_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(DomainError::ChargePointAlreadyExists(
                    charge_point_id.to_string(),
                ))
            }
            Entry::Vacant(slot) => slot,
        };

        let mut state = ChargePointAuthState::new(charge_point_id);
        let mut warnings = Vec::new();

        match configured_tag.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => match normalize(raw) {
                Ok(normalized) => {
                    self.log_warnings(charge_point_id, &normalized.warnings);
                    state.apply_tag(normalized.tag, TagOrigin::Configured);
                    warnings = normalized.warnings;
                }
                Err(e) => {
                    metrics::counter!("remote_id_tag_validation_failures_total").increment(1);
                    warn!(
                        charge_point_id,
                        error = %e,
                        "Configured remote_id_tag rejected, a tag will be generated"
                    );
                }
            },
            None => debug!(charge_point_id, "No remote_id_tag configured"),
        }

        if let Some(tag) = state.remote_id_tag() {
            metrics::counter!("remote_id_tag_updates_total", "origin" => TagOrigin::Configured.as_str())
                .increment(1);
            info!(charge_point_id, remote_id_tag = %tag, "Charge point added with configured remote_id_tag");
        } else {
            info!(charge_point_id, "Charge point added");
        }
        slot.insert(state);

        self.notify_charge_point(charge_point_id);
        Ok(warnings)
    }

    /// Remove a charge point and its authorization record
    pub fn remove_charge_point(&self, charge_point_id: &str) -> DomainResult<()> {
        self.charge_points
            .remove(charge_point_id)
            .ok_or_else(|| DomainError::ChargePointNotFound(charge_point_id.to_string()))?;
        info!(charge_point_id, "Charge point removed");
        self.notify_charge_point(charge_point_id);
        Ok(())
    }

    pub fn contains(&self, charge_point_id: &str) -> bool {
        self.charge_points.contains_key(charge_point_id)
    }

    pub fn charge_point_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.charge_points.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    // ── Remote tag ─────────────────────────────────────────

    /// Current authoritative tag, `None` while unresolved or unknown
    pub fn get_remote_id_tag(&self, charge_point_id: &str) -> Option<RemoteIdTag> {
        self.charge_points
            .get(charge_point_id)
            .and_then(|state| state.remote_id_tag().cloned())
    }

    pub fn lifecycle(&self, charge_point_id: &str) -> Option<TagLifecycle> {
        self.charge_points
            .get(charge_point_id)
            .map(|state| state.lifecycle())
    }

    /// Replace the remote tag of a charge point.
    ///
    /// `value` goes through [`normalize`]; `None` generates a fresh tag. The
    /// call suspends while the tag is propagated, then re-reads the record,
    /// updates the table and finally publishes a notice. Setting the tag the
    /// record already holds is a no-op.
    pub async fn set_remote_id_tag(
        &self,
        charge_point_id: &str,
        value: Option<&str>,
        origin: TagOrigin,
    ) -> DomainResult<RemoteIdTag> {
        if !self.contains(charge_point_id) {
            return Err(DomainError::ChargePointNotFound(charge_point_id.to_string()));
        }

        let (tag, origin) = match value {
            Some(raw) => {
                let normalized = normalize(raw).inspect_err(|e| {
                    metrics::counter!("remote_id_tag_validation_failures_total").increment(1);
                    warn!(charge_point_id, error = %e, "Rejected remote_id_tag");
                })?;
                self.log_warnings(charge_point_id, &normalized.warnings);
                (normalized.tag, origin)
            }
            None => (generate(), TagOrigin::Generated),
        };

        if self.get_remote_id_tag(charge_point_id).as_ref() == Some(&tag) {
            debug!(charge_point_id, remote_id_tag = %tag, "remote_id_tag unchanged");
            return Ok(tag);
        }

        self.propagator.propagate(charge_point_id, &tag).await?;

        // Re-read: the record may have changed or vanished while suspended.
        let changed = {
            let mut state = self
                .charge_points
                .get_mut(charge_point_id)
                .ok_or_else(|| DomainError::ChargePointNotFound(charge_point_id.to_string()))?;
            state.apply_tag(tag.clone(), origin)
        };

        if changed {
            metrics::counter!("remote_id_tag_updates_total", "origin" => origin.as_str())
                .increment(1);
            info!(charge_point_id, remote_id_tag = %tag, %origin, "remote_id_tag updated");
            self.notify_charge_point(charge_point_id);
        }
        Ok(tag)
    }

    /// Authorization status of `id_tag` at `charge_point_id`.
    ///
    /// The charge point's own remote tag is `Accepted`; anything else (and
    /// any tag at an unknown charge point) follows the default policy.
    pub fn get_authorization_status(&self, charge_point_id: &str, id_tag: &str) -> IdTagStatus {
        let status = match self.charge_points.get(charge_point_id) {
            Some(state) => state.authorization_status(id_tag, self.policy.as_ref()),
            None => self.policy.status_for(id_tag),
        };
        metrics::counter!("authorization_decisions_total", "status" => status.as_str())
            .increment(1);
        status
    }

    /// Whether the charge point has a live connection; `default` if unknown
    pub fn get_available(&self, charge_point_id: &str, default: bool) -> bool {
        if !self.contains(charge_point_id) {
            return default;
        }
        self.sessions.is_connected(charge_point_id)
    }

    // ── Connection lifecycle ───────────────────────────────

    /// A charge point opened its WebSocket.
    ///
    /// Unknown ids are added on the fly, and an unresolved record gets a
    /// generated tag. Returns the connection id for
    /// [`Self::charge_point_disconnected`].
    pub fn charge_point_connected(
        &self,
        charge_point_id: &str,
        sender: mpsc::UnboundedSender<String>,
    ) -> u64 {
        if !self.contains(charge_point_id) {
            if let Err(e) = self.add_charge_point(charge_point_id, None) {
                debug!(charge_point_id, error = %e, "Charge point registered concurrently");
            }
        }

        let generated = self
            .charge_points
            .get_mut(charge_point_id)
            .and_then(|mut state| {
                if state.is_resolved() {
                    return None;
                }
                let tag = generate();
                state.apply_tag(tag.clone(), TagOrigin::Generated);
                Some(tag)
            });
        if let Some(tag) = generated {
            metrics::counter!("remote_id_tag_updates_total", "origin" => TagOrigin::Generated.as_str())
                .increment(1);
            info!(charge_point_id, remote_id_tag = %tag, "Generated remote_id_tag");
        }

        let connection_id = self.sessions.register(charge_point_id, sender);
        self.notify_charge_point(charge_point_id);
        connection_id
    }

    /// The charge point's BootNotification was accepted
    pub fn charge_point_booted(&self, charge_point_id: &str) {
        self.sessions.mark_ready(charge_point_id);
        if let Some(mut state) = self.charge_points.get_mut(charge_point_id) {
            state.activate();
        }
        self.notify_charge_point(charge_point_id);
    }

    pub fn charge_point_disconnected(&self, charge_point_id: &str, connection_id: u64) {
        if self.sessions.unregister(charge_point_id, connection_id) {
            self.notify_charge_point(charge_point_id);
        }
    }

    pub fn is_ready(&self, charge_point_id: &str) -> bool {
        self.sessions.is_ready(charge_point_id)
    }

    /// Poll until the charge point is ready, failing after `timeout`
    pub async fn wait_ready(&self, charge_point_id: &str, timeout: Duration) -> DomainResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_ready(charge_point_id) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(DomainError::Timeout(charge_point_id.to_string()));
            }
            tokio::time::sleep(READY_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    // ── Observers ──────────────────────────────────────────

    pub fn subscribe(&self) -> Subscription {
        self.update_bus.subscribe()
    }

    pub fn update_bus(&self) -> &UpdateBus {
        &self.update_bus
    }

    pub fn sessions(&self) -> &SharedSessionRegistry {
        &self.sessions
    }

    /// Ask every attached entity to refresh
    pub fn notify_all(&self) {
        self.update_bus.publish(UpdateNotice::All);
    }

    fn notify_charge_point(&self, charge_point_id: &str) {
        self.update_bus.publish(UpdateNotice::entities(
            TEXT_FIELDS.iter().map(|field| field.entity_id(charge_point_id)),
        ));
    }

    fn log_warnings(&self, charge_point_id: &str, warnings: &[NormalizeWarning]) {
        for warning in warnings {
            if matches!(warning, NormalizeWarning::TooLong { .. }) {
                metrics::counter!("remote_id_tag_truncations_total").increment(1);
            }
            warn!(charge_point_id, "{}", warning);
        }
    }
}

impl Default for CentralSystem {
    fn default() -> Self {
        Self::new(Arc::new(DefaultAuthorizationPolicy::default()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::domain::GENERATED_TAG_LENGTH;

    struct FailingPropagator;

    #[async_trait]
    impl TagPropagator for FailingPropagator {
        async fn propagate(&self, charge_point_id: &str, _tag: &RemoteIdTag) -> DomainResult<()> {
            Err(DomainError::Propagation {
                charge_point_id: charge_point_id.to_string(),
                reason: "link down".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct CountingPropagator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TagPropagator for CountingPropagator {
        async fn propagate(&self, _charge_point_id: &str, _tag: &RemoteIdTag) -> DomainResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(())
        }
    }

    /// Formatted log output, shared with the writer handed to `fmt::layer`.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn with_captured_logs<R>(f: impl FnOnce() -> R) -> (R, CapturedLogs) {
        use tracing_subscriber::layer::SubscriberExt;

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(move || writer.clone()),
        );
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs)
    }

    fn connect(central: &CentralSystem, cpid: &str) -> (u64, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (central.charge_point_connected(cpid, tx), rx)
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let central = CentralSystem::default();
        central.add_charge_point("CP1", None).unwrap();

        let tag = central
            .set_remote_id_tag("CP1", Some("ABC123"), TagOrigin::Api)
            .await
            .unwrap();

        assert_eq!(tag, "ABC123");
        assert_eq!(central.get_remote_id_tag("CP1").unwrap(), "ABC123");
        assert_eq!(
            central.get_authorization_status("CP1", "ABC123"),
            IdTagStatus::Accepted
        );
    }

    #[tokio::test]
    async fn test_set_none_generates() {
        let central = CentralSystem::default();
        central.add_charge_point("CP1", Some("FIRST")).unwrap();

        let tag = central
            .set_remote_id_tag("CP1", None, TagOrigin::Api)
            .await
            .unwrap();

        assert_eq!(tag.len(), GENERATED_TAG_LENGTH);
        assert_eq!(central.get_remote_id_tag("CP1"), Some(tag.clone()));
        assert_eq!(
            central.get_authorization_status("CP1", tag.as_str()),
            IdTagStatus::Accepted
        );
        assert_ne!(
            central.get_authorization_status("CP1", "FIRST"),
            IdTagStatus::Accepted
        );
    }

    #[tokio::test]
    async fn test_invalid_value_keeps_previous_tag() {
        let central = CentralSystem::default();
        central.add_charge_point("CP1", Some("KEEPME")).unwrap();

        let err = central
            .set_remote_id_tag("CP1", Some("bad tag"), TagOrigin::UserEdit)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(central.get_remote_id_tag("CP1").unwrap(), "KEEPME");
    }

    #[tokio::test]
    async fn test_empty_value_is_rejected() {
        let central = CentralSystem::default();
        central.add_charge_point("CP1", None).unwrap();

        let err = central
            .set_remote_id_tag("CP1", Some("  "), TagOrigin::UserEdit)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(central.get_remote_id_tag("CP1").is_none());
    }

    #[tokio::test]
    async fn test_unknown_charge_point() {
        let central = CentralSystem::default();
        let err = central
            .set_remote_id_tag("CP404", Some("ABC"), TagOrigin::Api)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::ChargePointNotFound("CP404".into()));
        assert!(central.get_remote_id_tag("CP404").is_none());
        assert!(central.get_available("CP404", true));
        assert!(!central.get_available("CP404", false));
    }

    #[tokio::test]
    async fn test_propagation_failure_leaves_state_untouched() {
        let central = CentralSystem::default().with_propagator(Arc::new(FailingPropagator));
        central.add_charge_point("CP1", Some("ORIGINAL")).unwrap();
        let mut subscription = central.subscribe();

        let err = central
            .set_remote_id_tag("CP1", Some("REPLACEMENT"), TagOrigin::UserEdit)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Propagation { .. }));
        assert_eq!(central.get_remote_id_tag("CP1").unwrap(), "ORIGINAL");
        assert_eq!(subscription.try_recv(), None);
    }

    #[tokio::test]
    async fn test_same_tag_is_not_propagated_twice() {
        let propagator = Arc::new(CountingPropagator::default());
        let central = CentralSystem::default().with_propagator(propagator.clone());
        central.add_charge_point("CP1", None).unwrap();

        central
            .set_remote_id_tag("CP1", Some("TAG1"), TagOrigin::Api)
            .await
            .unwrap();
        let mut subscription = central.subscribe();
        central
            .set_remote_id_tag("CP1", Some("TAG1"), TagOrigin::Api)
            .await
            .unwrap();

        assert_eq!(propagator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(subscription.try_recv(), None);
    }

    #[tokio::test]
    async fn test_notice_follows_state_update() {
        let central = Arc::new(CentralSystem::default());
        central.add_charge_point("CP1", None).unwrap();
        let mut subscription = central.subscribe();

        central
            .set_remote_id_tag("CP1", Some("VISIBLE"), TagOrigin::Api)
            .await
            .unwrap();

        let notice = subscription.try_recv().expect("notice published");
        assert!(notice.matches("text.CP1_remote_id_tag"));
        assert!(!notice.matches("text.CP2_remote_id_tag"));
        assert_eq!(central.get_remote_id_tag("CP1").unwrap(), "VISIBLE");
    }

    #[tokio::test]
    async fn test_removed_during_propagation() {
        let central = Arc::new(
            CentralSystem::default().with_propagator(Arc::new(CountingPropagator::default())),
        );
        central.add_charge_point("CP1", None).unwrap();

        let task = {
            let central = central.clone();
            tokio::spawn(async move {
                central
                    .set_remote_id_tag("CP1", Some("LATE"), TagOrigin::Api)
                    .await
            })
        };
        central.remove_charge_point("CP1").unwrap();

        // Either the set finished before removal or it saw the record vanish.
        match task.await.unwrap() {
            Ok(_) | Err(DomainError::ChargePointNotFound(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
        assert!(central.get_remote_id_tag("CP1").is_none());
    }

    #[test]
    fn test_configured_tag_resolves_immediately() {
        let central = CentralSystem::default();
        let warnings = central
            .add_charge_point("CP1", Some("CUSTOM_REMOTE_TAG_12345"))
            .unwrap();

        assert!(warnings.is_empty());
        assert_eq!(central.lifecycle("CP1"), Some(TagLifecycle::Configured));
        assert_eq!(
            central.get_authorization_status("CP1", "CUSTOM_REMOTE_TAG_12345"),
            IdTagStatus::Accepted
        );
        assert_ne!(
            central.get_authorization_status("CP1", "DIFFERENT_TAG"),
            IdTagStatus::Accepted
        );
    }

    #[test]
    fn test_overlong_configured_tag_is_truncated() {
        let central = CentralSystem::default();
        let warnings = central
            .add_charge_point("CP1", Some(&"A".repeat(33)))
            .unwrap();

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("remote_id_tag too long"));
        assert_eq!(central.get_remote_id_tag("CP1").unwrap(), "A".repeat(32).as_str());
    }

    #[test]
    fn test_overlong_configured_tag_logs_warning() {
        let central = CentralSystem::default();
        let (result, logs) = with_captured_logs(|| {
            central.add_charge_point("CP7", Some(&"A".repeat(33)))
        });
        result.unwrap();

        let lines = logs.lines();
        assert!(
            lines.iter().any(|line| line.contains("WARN")
                && line.contains("remote_id_tag too long")
                && line.contains("CP7")),
            "no truncation warning in {lines:?}"
        );
    }

    #[test]
    fn test_duplicate_add_does_not_normalize() {
        let central = CentralSystem::default();
        central.add_charge_point("CP1", Some("ONE")).unwrap();

        let (result, logs) = with_captured_logs(|| {
            central.add_charge_point("CP1", Some(&"B".repeat(40)))
        });

        assert_eq!(
            result.unwrap_err(),
            DomainError::ChargePointAlreadyExists("CP1".into())
        );
        assert!(!logs.lines().iter().any(|line| line.contains("too long")));
        assert_eq!(central.get_remote_id_tag("CP1").unwrap(), "ONE");
    }

    #[test]
    fn test_duplicate_charge_point_is_rejected() {
        let central = CentralSystem::default();
        central.add_charge_point("CP1", Some("ONE")).unwrap();
        let err = central.add_charge_point("CP1", Some("TWO")).unwrap_err();
        assert_eq!(err, DomainError::ChargePointAlreadyExists("CP1".into()));
        assert_eq!(central.get_remote_id_tag("CP1").unwrap(), "ONE");
    }

    #[test]
    fn test_invalid_configured_tag_is_generated_on_connect() {
        let central = CentralSystem::default();
        central.add_charge_point("CP1", Some("not valid")).unwrap();
        assert!(central.get_remote_id_tag("CP1").is_none());

        let (_id, _rx) = connect(&central, "CP1");
        let tag = central.get_remote_id_tag("CP1").unwrap();
        assert_eq!(tag.len(), GENERATED_TAG_LENGTH);
        assert_eq!(central.lifecycle("CP1"), Some(TagLifecycle::Generated));
    }

    #[test]
    fn test_connection_lifecycle_drives_availability() {
        let central = CentralSystem::default();
        central.add_charge_point("CP1", Some("TAG")).unwrap();
        assert!(!central.get_available("CP1", true));

        let (connection_id, _rx) = connect(&central, "CP1");
        assert!(central.get_available("CP1", false));
        assert!(!central.is_ready("CP1"));

        central.charge_point_booted("CP1");
        assert!(central.is_ready("CP1"));
        assert_eq!(central.lifecycle("CP1"), Some(TagLifecycle::Active));

        central.charge_point_disconnected("CP1", connection_id);
        assert!(!central.get_available("CP1", true));
        // The tag survives the disconnect.
        assert_eq!(central.get_remote_id_tag("CP1").unwrap(), "TAG");
    }

    #[test]
    fn test_unknown_charge_point_is_registered_on_connect() {
        let central = CentralSystem::default();
        let (_id, _rx) = connect(&central, "CP_NEW");
        assert!(central.contains("CP_NEW"));
        assert_eq!(
            central.get_remote_id_tag("CP_NEW").unwrap().len(),
            GENERATED_TAG_LENGTH
        );
    }

    #[tokio::test]
    async fn test_wait_ready_times_out() {
        let central = CentralSystem::default();
        central.add_charge_point("CP1", None).unwrap();

        let err = central
            .wait_ready("CP1", Duration::from_millis(250))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::Timeout("CP1".into()));
    }

    #[tokio::test]
    async fn test_wait_ready_sees_boot() {
        let central = Arc::new(CentralSystem::default());
        central.add_charge_point("CP1", None).unwrap();
        let (_id, _rx) = connect(&central, "CP1");

        let booter = {
            let central = central.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                central.charge_point_booted("CP1");
            })
        };

        central
            .wait_ready("CP1", Duration::from_secs(5))
            .await
            .unwrap();
        booter.await.unwrap();
    }
}
