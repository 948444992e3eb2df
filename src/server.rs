//! Server runtime.
//!
//! [`ServerHandle`] owns the whole lifecycle: central system, text
//! entities, restore store, OCPP WebSocket server, REST API, metrics and
//! graceful shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::application::{CentralSystem, SharedCentralSystem, TextPlatform};
use crate::config::{AppConfig, Config};
use crate::infrastructure::{FileRestoreStore, InMemoryRestoreStore, RestoreStateStore};
use crate::interfaces::http::{create_api_router, ApiState};
use crate::interfaces::ws::OcppServer;
use crate::support::shutdown::{ShutdownCoordinator, ShutdownSignal};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Handle to a running central system.
pub struct ServerHandle {
    pub central: SharedCentralSystem,
    pub platform: Arc<TextPlatform>,
    pub config: AppConfig,
    /// Address the WebSocket server is bound to
    pub ws_addr: SocketAddr,
    /// Address the REST API is bound to, if enabled
    pub api_addr: Option<SocketAddr>,

    shutdown: ShutdownCoordinator,
    ws_task: tokio::task::JoinHandle<()>,
    api_task: Option<tokio::task::JoinHandle<()>>,
}

impl ServerHandle {
    /// Start everything described by `app_cfg`.
    ///
    /// 1. Prometheus recorder (if enabled)
    /// 2. Central system with the configured charge points
    /// 3. Restore store and text entities
    /// 4. OCPP WebSocket server
    /// 5. REST API server (if enabled)
    pub async fn start(app_cfg: AppConfig) -> Result<Self, BoxError> {
        info!("Starting OCPP remote authorization service...");

        let prometheus_handle = if app_cfg.metrics.enabled {
            install_prometheus_recorder()
        } else {
            None
        };

        // ── Central system ─────────────────────────────────────
        let central = CentralSystem::new(Arc::new(app_cfg.authorization.policy())).shared();
        for cp in &app_cfg.charge_points {
            central.add_charge_point(cp.id.trim(), cp.remote_id_tag.as_deref())?;
        }
        info!("{} charge point(s) configured", app_cfg.charge_points.len());

        // ── Restore store & text entities ──────────────────────
        let store: Arc<dyn RestoreStateStore> = if app_cfg.restore.enabled {
            Arc::new(FileRestoreStore::open(app_cfg.restore.resolved_path()).await)
        } else {
            info!("Restore state disabled, display values are kept in memory only");
            Arc::new(InMemoryRestoreStore::new())
        };
        let platform = Arc::new(TextPlatform::new(central.clone(), store));
        platform.attach_all().await;

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── OCPP WebSocket server ──────────────────────────────
        let config = Config::from(&app_cfg);
        let ws_listener = TcpListener::bind(config.address()).await?;
        let ws_addr = ws_listener.local_addr()?;
        let server = OcppServer::new(config, central.clone()).with_shutdown(shutdown_signal.clone());

        let ws_task = tokio::spawn(async move {
            if let Err(e) = server.serve(ws_listener).await {
                error!("WebSocket server error: {}", e);
            }
        });

        // ── REST API server ────────────────────────────────────
        let (api_addr, api_task) = if app_cfg.api.enabled {
            let router = create_api_router(
                ApiState::new(central.clone(), platform.clone()),
                prometheus_handle,
            );
            let listener =
                TcpListener::bind(format!("{}:{}", app_cfg.api.host, app_cfg.api.port)).await?;
            let addr = listener.local_addr()?;
            info!("REST API server listening on http://{}", addr);

            let api_shutdown = shutdown_signal.clone();
            let task = tokio::spawn(async move {
                let result = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        api_shutdown.wait().await;
                        info!("🛑 REST API server received shutdown signal");
                    })
                    .await;
                if let Err(e) = result {
                    error!("REST API server error: {}", e);
                }
            });
            (Some(addr), Some(task))
        } else {
            (None, None)
        };

        info!("🚀 All servers started.");

        Ok(Self {
            central,
            platform,
            config: app_cfg,
            ws_addr,
            api_addr,
            shutdown,
            ws_task,
            api_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the shutdown signal, then stop everything within the
    /// configured timeout.
    pub async fn wait(self) {
        let Self {
            platform,
            shutdown,
            ws_task,
            api_task,
            ..
        } = self;

        shutdown
            .shutdown_with_cleanup(|| async move {
                platform.shutdown().await;

                match ws_task.await {
                    Ok(()) => info!("WebSocket server stopped"),
                    Err(e) => error!("WebSocket server task panicked: {}", e),
                }
                if let Some(api_task) = api_task {
                    match api_task.await {
                        Ok(()) => info!("REST API server stopped"),
                        Err(e) => error!("REST API server task panicked: {}", e),
                    }
                }
            })
            .await;

        info!("👋 Shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down...");
        self.trigger_shutdown();
        self.wait().await;
    }
}

/// The global recorder can only be installed once per process.
fn install_prometheus_recorder() -> Option<PrometheusHandle> {
    static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

    PROM_HANDLE
        .get_or_init(|| {
            match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
                Ok(handle) => {
                    info!("📊 Prometheus metrics recorder installed");
                    Some(handle)
                }
                Err(e) => {
                    warn!("Failed to install Prometheus metrics recorder: {}", e);
                    None
                }
            }
        })
        .clone()
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup. `RUST_LOG` overrides the configured
/// level.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let result = match config.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {}", e);
    }
}
