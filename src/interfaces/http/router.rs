//! API Router

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use super::modules::{health, remote_id_tags};
use crate::application::{SharedCentralSystem, TextPlatform};

/// State shared by every route
#[derive(Clone)]
pub struct ApiState {
    pub central: SharedCentralSystem,
    pub platform: Arc<TextPlatform>,
    pub started_at: Arc<Instant>,
}

impl ApiState {
    pub fn new(central: SharedCentralSystem, platform: Arc<TextPlatform>) -> Self {
        Self {
            central,
            platform,
            started_at: Arc::new(Instant::now()),
        }
    }
}

/// Build the REST API router.
///
/// `/metrics` is only mounted when a Prometheus handle is given.
pub fn create_api_router(state: ApiState, prometheus: Option<PrometheusHandle>) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/charge-points/{charge_point_id}/remote-id-tag",
            get(remote_id_tags::get_remote_id_tag).put(remote_id_tags::set_remote_id_tag),
        )
        .route(
            "/charge-points/{charge_point_id}/remote-id-tag/regenerate",
            post(remote_id_tags::regenerate_remote_id_tag),
        )
        .route(
            "/charge-points/{charge_point_id}/authorization/{id_tag}",
            get(remote_id_tags::get_authorization),
        )
        .with_state(state);

    let mut router = Router::new().nest("/api/v1", api);

    if let Some(handle) = prometheus {
        router = router.route(
            "/metrics",
            get(|State(handle): State<PrometheusHandle>| async move { handle.render() })
                .with_state(handle),
        );
    }

    router.layer(TraceLayer::new_for_http())
}
