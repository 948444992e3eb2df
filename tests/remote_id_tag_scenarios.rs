//! End-to-end remote id tag scenarios against a live WebSocket endpoint.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use ocpp_remote_auth::application::{CentralSystem, SharedCentralSystem, TextPlatform};
use ocpp_remote_auth::config::{AppConfig, ChargePointConfig, Config};
use ocpp_remote_auth::domain::{IdTagStatus, NormalizeWarning, TagLifecycle};
use ocpp_remote_auth::infrastructure::{FileRestoreStore, InMemoryRestoreStore, RestoreStateStore};
use ocpp_remote_auth::interfaces::ws::OcppServer;
use ocpp_remote_auth::server::ServerHandle;
use ocpp_remote_auth::support::shutdown::ShutdownSignal;

const TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    port: u16,
    shutdown: ShutdownSignal,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

async fn start_ws(central: &SharedCentralSystem) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let shutdown = ShutdownSignal::new();
    let server = OcppServer::new(Config::new("127.0.0.1", port), central.clone())
        .with_shutdown(shutdown.clone());
    tokio::spawn(async move { server.serve(listener).await });
    TestServer { port, shutdown }
}

type Client = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Connect as `charge_point_id` and complete a BootNotification.
async fn connect_and_boot(port: u16, charge_point_id: &str) -> Client {
    let mut request = format!("ws://127.0.0.1:{}/ocpp/{}", port, charge_point_id)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("ocpp1.6"));

    let (mut client, response) = tokio_tungstenite::connect_async(request).await.unwrap();
    assert_eq!(
        response.headers().get("Sec-WebSocket-Protocol").unwrap(),
        "ocpp1.6"
    );

    let reply = call(
        &mut client,
        "BootNotification",
        json!({"chargePointVendor": "Vendor", "chargePointModel": "Model"}),
    )
    .await;
    assert_eq!(reply[2]["status"], "Accepted");
    client
}

async fn call(client: &mut Client, action: &str, payload: Value) -> Value {
    let frame = json!([2, "msg-1", action, payload]).to_string();
    client.send(Message::Text(frame)).await.unwrap();

    loop {
        let msg = tokio::time::timeout(TIMEOUT, client.next())
            .await
            .expect("no reply")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Formatted log lines written by a capturing `fmt` layer
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn contains_warning(&self, charge_point_id: &str, text: &str) -> bool {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .any(|line| line.contains("WARN") && line.contains(charge_point_id) && line.contains(text))
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
    (tracing::subscriber::with_default(subscriber, f), logs)
}

#[tokio::test]
async fn explicit_configuration_is_accepted_and_others_are_not() {
    let central = CentralSystem::default().shared();
    let warnings = central
        .add_charge_point("CP1", Some("CUSTOM_REMOTE_TAG_12345"))
        .unwrap();
    assert!(warnings.is_empty());

    let server = start_ws(&central).await;
    let mut client = connect_and_boot(server.port, "CP1").await;
    central.wait_ready("CP1", TIMEOUT).await.unwrap();

    assert_eq!(
        central.get_authorization_status("CP1", "CUSTOM_REMOTE_TAG_12345"),
        IdTagStatus::Accepted
    );
    assert_eq!(
        central.get_authorization_status("CP1", "DIFFERENT_TAG"),
        IdTagStatus::Invalid
    );

    let reply = call(&mut client, "Authorize", json!({"idTag": "CUSTOM_REMOTE_TAG_12345"})).await;
    assert_eq!(reply[2]["idTagInfo"]["status"], "Accepted");
    let reply = call(&mut client, "Authorize", json!({"idTag": "DIFFERENT_TAG"})).await;
    assert_eq!(reply[2]["idTagInfo"]["status"], "Invalid");

    assert_eq!(central.lifecycle("CP1"), Some(TagLifecycle::Active));
}

#[tokio::test]
async fn unset_configuration_generates_a_tag_on_connection() {
    let central = CentralSystem::default().shared();
    central.add_charge_point("CP2", None).unwrap();
    assert!(central.get_remote_id_tag("CP2").is_none());

    let server = start_ws(&central).await;
    let _client = connect_and_boot(server.port, "CP2").await;
    central.wait_ready("CP2", TIMEOUT).await.unwrap();

    let tag = central.get_remote_id_tag("CP2").unwrap();
    assert_eq!(tag.len(), 20);
    assert!(tag
        .as_str()
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(
        central.get_authorization_status("CP2", tag.as_str()),
        IdTagStatus::Accepted
    );
}

#[tokio::test]
async fn overlong_configuration_is_truncated() {
    let central = CentralSystem::default().shared();
    let (result, logs) =
        with_captured_logs(|| central.add_charge_point("CP3", Some(&"A".repeat(33))));
    let warnings = result.unwrap();
    assert_eq!(warnings, vec![NormalizeWarning::TooLong { original_len: 33 }]);
    assert!(logs.contains_warning("CP3", "remote_id_tag too long"));

    let server = start_ws(&central).await;
    let _client = connect_and_boot(server.port, "CP3").await;
    central.wait_ready("CP3", TIMEOUT).await.unwrap();

    let expected = "A".repeat(32);
    assert_eq!(central.get_remote_id_tag("CP3").unwrap(), expected.as_str());
    assert_eq!(
        central.get_authorization_status("CP3", &expected),
        IdTagStatus::Accepted
    );
    assert_eq!(
        central.get_authorization_status("CP3", &"A".repeat(33)),
        IdTagStatus::Invalid
    );
}

#[tokio::test]
async fn restored_value_wins_over_generation() {
    let central = CentralSystem::default().shared();
    central.add_charge_point("CP4", None).unwrap();
    let store = Arc::new(
        InMemoryRestoreStore::new().with_value("text.CP4_remote_id_tag", "CUSTOM123"),
    );
    let platform = TextPlatform::new(central.clone(), store);
    platform.attach_all().await;

    let entity = platform.remote_id_tag_entity("CP4").unwrap();
    assert_eq!(entity.state().displayed_value.as_deref(), Some("CUSTOM123"));
    assert!(entity.state().propagated);
    assert_eq!(central.get_remote_id_tag("CP4").unwrap(), "CUSTOM123");
    assert!(!entity.available());

    // A later connection keeps the restored tag and makes the entity available.
    let server = start_ws(&central).await;
    let _client = connect_and_boot(server.port, "CP4").await;
    central.wait_ready("CP4", TIMEOUT).await.unwrap();

    assert_eq!(central.get_remote_id_tag("CP4").unwrap(), "CUSTOM123");
    assert!(entity.available());
}

#[tokio::test]
async fn unknown_charge_point_is_registered_on_connection() {
    let central = CentralSystem::default().shared();
    let server = start_ws(&central).await;
    let _client = connect_and_boot(server.port, "WALKIN").await;
    central.wait_ready("WALKIN", TIMEOUT).await.unwrap();

    assert!(central.contains("WALKIN"));
    assert_eq!(central.get_remote_id_tag("WALKIN").unwrap().len(), 20);
}

#[tokio::test]
async fn disconnect_makes_the_charge_point_unavailable() {
    let central = CentralSystem::default().shared();
    central.add_charge_point("CP5", Some("TAG5")).unwrap();
    let server = start_ws(&central).await;

    let mut client = connect_and_boot(server.port, "CP5").await;
    assert!(central.get_available("CP5", false));

    client.close(None).await.unwrap();
    tokio::time::timeout(TIMEOUT, async {
        while central.get_available("CP5", false) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("charge point still available after disconnect");

    // The tag itself is untouched by the disconnect.
    assert_eq!(central.get_remote_id_tag("CP5").unwrap(), "TAG5");
}

#[tokio::test]
async fn display_value_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let restore_path = dir.path().join("restore_state.json");

    let mut config = AppConfig::default();
    config.server.ws_host = "127.0.0.1".into();
    config.server.ws_port = 0;
    config.api.enabled = false;
    config.restore.path = Some(restore_path.clone());
    config.charge_points.push(ChargePointConfig {
        id: "CP6".into(),
        remote_id_tag: None,
    });

    // First run: the user picks a tag.
    let handle = ServerHandle::start(config.clone()).await.unwrap();
    let entity = handle.platform.remote_id_tag_entity("CP6").unwrap();
    let outcome = entity.set_value("PICKED42").await;
    assert!(outcome.error.is_none());
    handle.shutdown().await;

    let store = FileRestoreStore::open(&restore_path).await;
    assert_eq!(
        store.get_last_value("text.CP6_remote_id_tag").await.unwrap().as_deref(),
        Some("PICKED42")
    );

    // Second run: the tag comes back before any charge point connects.
    let handle = ServerHandle::start(config).await.unwrap();
    assert_eq!(handle.central.get_remote_id_tag("CP6").unwrap(), "PICKED42");
    let entity = handle.platform.remote_id_tag_entity("CP6").unwrap();
    assert_eq!(entity.state().displayed_value.as_deref(), Some("PICKED42"));
    handle.shutdown().await;
}
