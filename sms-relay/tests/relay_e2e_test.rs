//! End-to-end tests: real listeners, real WebSocket clients, real HTTP.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use sms_relay::http::{build_channel_router, build_router};
use sms_relay::storage::MessageStorage;
use sms_relay::{Config, SmsRelay};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestRelay {
    api: SocketAddr,
    channel: SocketAddr,
    relay: Arc<SmsRelay>,
}

impl TestRelay {
    async fn start() -> Self {
        Self::start_with(Config::default()).await
    }

    async fn start_with(config: Config) -> Self {
        let relay = Arc::new(SmsRelay::new(config));

        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let channel_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api = api_listener.local_addr().unwrap();
        let channel = channel_listener.local_addr().unwrap();

        tokio::spawn(
            axum::serve(
                api_listener,
                build_router(relay.clone()).into_make_service_with_connect_info::<SocketAddr>(),
            )
            .into_future(),
        );
        tokio::spawn(axum::serve(channel_listener, build_channel_router(relay.clone())).into_future());

        Self { api, channel, relay }
    }

    fn api_url(&self, path: &str) -> String {
        format!("http://{}{}", self.api, path)
    }

    /// Open a channel for `device_id` and consume its `connection_confirmed`.
    async fn connect(&self, device_id: &str) -> Client {
        let url = format!("ws://{}/?deviceId={}", self.channel, device_id);
        let (mut ws, _) = connect_async(url).await.expect("channel should open");

        let confirmed = next_json(&mut ws).await;
        assert_eq!(confirmed["type"], "connection_confirmed");
        assert_eq!(confirmed["deviceId"], device_id);
        ws
    }
}

/// Next JSON text frame, failing after a few seconds.
async fn next_json(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("channel closed")
            .expect("channel error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(WsMessage::Text(value.to_string())).await.unwrap();
}

async fn get_json(relay: &TestRelay, path: &str) -> Value {
    reqwest::get(relay.api_url(path))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Poll `/api/health` until `activeConnections` reaches `expected`.
async fn wait_for_active_connections(relay: &TestRelay, expected: u64) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let health = get_json(relay, "/api/health").await;
            if health["activeConnections"] == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "activeConnections never reached {expected}");
}

/// Read until the relay closes the channel.
async fn wait_for_close(ws: &mut Client, within: Duration) -> bool {
    tokio::time::timeout(within, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(WsMessage::Close(_))) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn payload_from_one_device_reaches_the_other() {
    let relay = TestRelay::start().await;
    let mut a = relay.connect("A").await;
    let mut b = relay.connect("B").await;

    send_json(
        &mut a,
        json!({"type": "sms_received", "from": "+1555", "message": "hi"}),
    )
    .await;

    let copy = next_json(&mut b).await;
    assert_eq!(copy["type"], "sms_received");
    assert_eq!(copy["from"], "+1555");
    assert_eq!(copy["message"], "hi");
    assert_eq!(copy["sourceDevice"], "A");
    assert!(copy["id"].is_string());
    assert!(copy["timestamp"].is_string());

    let history: Value = reqwest::get(relay.api_url("/api/messages"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["originDevice"], "A");
    assert_eq!(messages[0]["id"], copy["id"]);
}

#[tokio::test]
async fn send_without_devices_is_service_unavailable() {
    let relay = TestRelay::start().await;

    let response = reqwest::Client::new()
        .post(relay.api_url("/api/sms/send"))
        .json(&json!({"to": "+1555", "message": "hi"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No devices available");
}

#[tokio::test]
async fn send_request_is_pushed_to_target_device() {
    let relay = TestRelay::start().await;
    let mut phone = relay.connect("phone").await;

    let response = reqwest::Client::new()
        .post(relay.api_url("/api/sms/send"))
        .json(&json!({"to": "+1555", "message": "on my way", "deviceId": "phone"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();

    let pushed = next_json(&mut phone).await;
    assert_eq!(pushed["type"], "sms_send_request");
    assert_eq!(pushed["to"], "+1555");
    assert_eq!(pushed["message"], "on my way");
    assert_eq!(pushed["requestId"], body["requestId"]);
}

#[tokio::test]
async fn device_ping_is_answered_with_pong() {
    let relay = TestRelay::start().await;
    let mut a = relay.connect("A").await;

    send_json(&mut a, json!({"type": "ping"})).await;

    let pong = next_json(&mut a).await;
    assert_eq!(pong["type"], "pong");
    assert_eq!(pong["deviceId"], "A");
    assert!(relay.relay.storage().query(None, 10).await.is_empty());
}

#[tokio::test]
async fn malformed_frame_keeps_channel_open() {
    let relay = TestRelay::start().await;
    let mut a = relay.connect("A").await;
    let mut b = relay.connect("B").await;

    a.send(WsMessage::Text("this is not json".into())).await.unwrap();
    send_json(&mut a, json!({"type": "sms_received", "message": "still here"})).await;

    let copy = next_json(&mut b).await;
    assert_eq!(copy["message"], "still here");
}

#[tokio::test]
async fn channel_without_device_id_is_rejected() {
    let relay = TestRelay::start().await;

    let err = connect_async(format!("ws://{}/", relay.channel))
        .await
        .expect_err("upgrade should be refused");

    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 400),
        other => panic!("expected HTTP 400, got {other:?}"),
    }
}

#[tokio::test]
async fn reconnect_supersedes_previous_channel() {
    let relay = TestRelay::start().await;
    let mut first = relay.connect("A").await;
    let _second = relay.connect("A").await;

    // The old channel is closed by the relay
    assert!(
        wait_for_close(&mut first, Duration::from_secs(5)).await,
        "superseded channel should close"
    );

    let health: Value = reqwest::get(relay.api_url("/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["activeConnections"], 1);
}

#[tokio::test]
async fn closing_a_channel_unregisters_the_device() {
    let relay = TestRelay::start().await;
    reqwest::Client::new()
        .post(relay.api_url("/api/register"))
        .json(&json!({"deviceId": "A", "deviceName": "Phone"}))
        .send()
        .await
        .unwrap();

    let mut a = relay.connect("A").await;
    wait_for_active_connections(&relay, 1).await;

    a.close(None).await.unwrap();
    wait_for_active_connections(&relay, 0).await;

    let devices = get_json(&relay, "/api/devices").await;
    let devices = devices["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["deviceId"], "A");
    assert_eq!(devices[0]["connected"], false);
}

#[tokio::test]
async fn silent_device_is_dropped_after_idle_timeout() {
    let mut config = Config::default();
    config.channel.ping_interval_secs = 1;
    config.channel.idle_timeout_secs = 1;
    let relay = TestRelay::start_with(config).await;

    // Never answers the relay's pings
    let mut a = relay.connect("A").await;
    assert!(
        wait_for_close(&mut a, Duration::from_secs(5)).await,
        "idle channel should be closed by the relay"
    );

    wait_for_active_connections(&relay, 0).await;
    assert!(relay.relay.registry().is_empty());
}
