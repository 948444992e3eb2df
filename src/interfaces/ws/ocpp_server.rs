//! OCPP 1.6 WebSocket server
//!
//! Accepts charge-point connections at `ws://<host>:<port>/ocpp/{charge_point_id}`.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::handler::OcppHandler;
use crate::application::SharedCentralSystem;
use crate::config::Config;
use crate::support::shutdown::ShutdownSignal;

/// OCPP 1.6 WebSocket subprotocol
const OCPP_SUBPROTOCOL: &str = "ocpp1.6";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// OCPP WebSocket Server
pub struct OcppServer {
    config: Config,
    central: SharedCentralSystem,
    shutdown_signal: ShutdownSignal,
}

impl OcppServer {
    pub fn new(config: Config, central: SharedCentralSystem) -> Self {
        Self {
            config,
            central,
            shutdown_signal: ShutdownSignal::new(),
        }
    }

    /// Set the shutdown signal for graceful shutdown
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown_signal = signal;
        self
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<(), BoxError> {
        let addr = self.config.address();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<(), BoxError> {
        let addr = listener.local_addr()?;
        info!("🔌 OCPP 1.6 Central System started on ws://{}", addr);
        info!(
            "   Charge points should connect to: ws://{}/ocpp/{{charge_point_id}}",
            addr
        );

        let shutdown = self.shutdown_signal.notified().wait();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = &mut shutdown => {
                    info!("🛑 WebSocket server received shutdown signal");
                    let connected = self.central.sessions().connected_ids();
                    if !connected.is_empty() {
                        info!("Closing {} charge point connection(s)", connected.len());
                    }
                    info!("✅ WebSocket server shutdown complete");
                    return Ok(());
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let central = self.central.clone();
        let shutdown = self.shutdown_signal.clone();
        let heartbeat_interval = self.config.heartbeat_interval;

        tokio::spawn(async move {
            if let Err(e) =
                handle_connection(stream, addr, central, heartbeat_interval, shutdown).await
            {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Extract charge point ID from WebSocket request path.
/// Expected format: /ocpp/{charge_point_id} or /{charge_point_id}
fn extract_charge_point_id(path: &str) -> Option<String> {
    let path = path.trim_start_matches('/');

    if let Some(id) = path.strip_prefix("ocpp/") {
        let id = id.trim_matches('/');
        if !id.is_empty() && !id.contains('/') {
            return Some(id.to_string());
        }
        return None;
    }

    if !path.is_empty() && !path.contains('/') {
        return Some(path.to_string());
    }

    None
}

fn offers_ocpp16(req: &Request) -> bool {
    req.headers()
        .get("Sec-WebSocket-Protocol")
        .and_then(|v| v.to_str().ok())
        .map(|requested| requested.split(',').any(|p| p.trim() == OCPP_SUBPROTOCOL))
        .unwrap_or(false)
}

/// Handle a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    central: SharedCentralSystem,
    heartbeat_interval: u32,
    shutdown: ShutdownSignal,
) -> Result<(), BoxError> {
    debug!("New connection from: {}", addr);

    let mut charge_point_id: Option<String> = None;

    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, mut response: Response| {
            let path = req.uri().path();
            debug!("WebSocket handshake from: {}, path: {}", addr, path);

            let Some(id) = extract_charge_point_id(path) else {
                warn!("Rejecting connection from {}: no charge point id in '{}'", addr, path);
                let mut rejection = ErrorResponse::new(Some("charge point id missing".into()));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                return Err(rejection);
            };

            if offers_ocpp16(req) {
                response.headers_mut().insert(
                    "Sec-WebSocket-Protocol",
                    HeaderValue::from_static(OCPP_SUBPROTOCOL),
                );
            } else {
                warn!(charge_point_id = id.as_str(), "Client did not offer ocpp1.6");
            }

            charge_point_id = Some(id);
            Ok(response)
        },
    )
    .await?;

    let charge_point_id = charge_point_id.ok_or("handshake finished without a charge point id")?;

    info!("[{}] Connected from {}", charge_point_id, addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let connection_id = central.charge_point_connected(&charge_point_id, tx);
    let handler = Arc::new(OcppHandler::new(
        charge_point_id.clone(),
        central.clone(),
        heartbeat_interval,
    ));

    // Outgoing message sender task
    let cp_id_send = charge_point_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            debug!("[{}] -> {}", cp_id_send, msg);
            if let Err(e) = ws_sender.send(Message::Text(msg)).await {
                error!("[{}] Send error: {}", cp_id_send, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // Incoming message receiver task
    let cp_id_recv = charge_point_id.clone();
    let recv_central = central.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    debug!("[{}] <- {}", cp_id_recv, text);
                    recv_central.sessions().touch(&cp_id_recv);

                    if let Some(response) = handler.handle(&text).await {
                        if let Err(e) = recv_central.sessions().send_to(&cp_id_recv, response) {
                            error!("[{}] Failed to send response: {}", cp_id_recv, e);
                            break;
                        }
                    }
                }
                Ok(Message::Close(frame)) => {
                    debug!("[{}] Close frame received: {:?}", cp_id_recv, frame);
                    break;
                }
                Ok(Message::Binary(data)) => {
                    warn!(
                        "[{}] Binary message received ({} bytes), ignoring",
                        cp_id_recv,
                        data.len()
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[{}] WebSocket error: {}", cp_id_recv, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {},
        _ = &mut recv_task => {},
        _ = shutdown.wait() => {
            info!("[{}] Connection closing due to server shutdown", charge_point_id);
        }
    }
    send_task.abort();
    recv_task.abort();

    central.charge_point_disconnected(&charge_point_id, connection_id);
    info!("[{}] Disconnected", charge_point_id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_charge_point_id() {
        assert_eq!(extract_charge_point_id("/ocpp/CP1"), Some("CP1".into()));
        assert_eq!(extract_charge_point_id("/ocpp/CP1/"), Some("CP1".into()));
        assert_eq!(extract_charge_point_id("/CP1"), Some("CP1".into()));
        assert_eq!(extract_charge_point_id("/ocpp/"), None);
        assert_eq!(extract_charge_point_id("/"), None);
        assert_eq!(extract_charge_point_id("/a/b"), None);
    }
}
