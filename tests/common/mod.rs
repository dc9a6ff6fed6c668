//! Shared test utilities and mock infrastructure.

#![allow(dead_code, unused_imports)]

pub mod mock_server;

use paysync::api::{ApiClient, IntentsApi};
use paysync::config::Config;
use paysync::notify::{ChannelSink, Notification};
use paysync::store::IntentState;
use paysync::tracker::PaymentIntentTracker;
use paysync::transport::EventChannel;
use serde_json::{json, Value};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub use mock_server::{MockResponse, MockServer};

pub const TEST_TOKEN: &str = "test-token";
pub const WAIT: Duration = Duration::from_secs(5);

/// Config pointing both the API and the event channel at `server`.
pub fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.base_url();
    config.api.timeout_seconds = 5;
    config.events.ws_url = server.base_url();
    config.events.auth_timeout_ms = 2_000;
    config.events.reconnect_base_ms = 50;
    config.events.reconnect_max_ms = 200;
    config.auth.token = Some(TEST_TOKEN.to_string());
    config.auth.user_id = Some(mock_server::USER_ID.to_string());
    config
}

/// Authenticated channel to `server`, owned by the calling test.
pub async fn connected_channel(config: &Config) -> EventChannel {
    let token = config.auth.bearer().expect("test config has a token");
    let channel = EventChannel::connect(&config.events, token).expect("valid event URL");
    channel
        .wait_authenticated(WAIT)
        .await
        .expect("mock server accepts the token");
    channel
}

/// Tracker wired to `server` plus the receiving end of its notifications.
pub async fn tracker_for(
    server: &MockServer,
) -> (PaymentIntentTracker, UnboundedReceiver<Notification>) {
    let config = test_config(server);
    let channel = connected_channel(&config).await;
    let client = ApiClient::new(&config.api, config.auth.bearer()).expect("valid API URL");
    let (sink, notifications) = ChannelSink::new();
    let tracker = PaymentIntentTracker::new(IntentsApi::new(client), channel, Arc::new(sink))
        .with_user_id(config.auth.user_id.clone());
    (tracker, notifications)
}

/// A complete intent record as the server would send it.
pub fn intent_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "userId": mock_server::USER_ID,
        "chain": "arbitrum",
        "fromAddress": "0xdef0000000000000000000000000000000000001",
        "toAddress": "0xabc0000000000000000000000000000000000002",
        "amount": "10",
        "tokenAddress": "0xfd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9",
        "tokenSymbol": "USDT",
        "status": status,
        "isTerminal": matches!(status, "CONFIRMED" | "FAILED" | "EXPIRED" | "CANCELLED"),
        "canRetry": false,
        "createdAt": "2026-10-18T10:00:00Z",
        "expiresAt": "2026-10-18T10:30:00Z"
    })
}

/// Poll `check` until it holds or `WAIT` elapses.
pub async fn eventually<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < WAIT {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// Wait until the tracker's store satisfies `check`.
pub async fn wait_for_state<F>(tracker: &PaymentIntentTracker, mut check: F) -> IntentState
where
    F: FnMut(&IntentState) -> bool,
{
    let mut changes = tracker.subscribe();
    let result = tokio::time::timeout(WAIT, changes.wait_for(|state| check(state))).await;
    match result {
        Ok(Ok(state)) => state.clone(),
        _ => panic!("store never reached the expected state: {:?}", tracker.state()),
    }
}

/// Run `future` with the standard timeout.
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("operation timed out")
}

/// Create a temporary config file with `content`.
pub fn temp_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, content).expect("Failed to write config");
    (temp_dir, config_path)
}

/// Drain every notification received so far.
pub fn drain(notifications: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        out.push(notification);
    }
    out
}
