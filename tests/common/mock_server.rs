//! Mock payment backend: REST routes plus a Socket.IO event endpoint.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::Router;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};

pub const NAMESPACE: &str = "/payment-intents";
pub const USER_ID: &str = "user-1";

const OPEN_FRAME: &str =
    r#"0{"sid":"mock-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// A captured REST request for assertions.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

/// A mock REST response to return.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub delay_ms: u64,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::error(500, "No response enqueued")
    }
}

impl MockResponse {
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string().into_bytes(),
            delay_ms: 0,
        }
    }

    /// `{ "data": record }`
    pub fn data(record: Value) -> Self {
        Self::json(json!({ "data": record }))
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "message": message }).to_string().into_bytes(),
            delay_ms: 0,
        }
    }

    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }
}

/// What the event endpoint has seen from clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub event: String,
    pub intent_id: String,
}

struct SocketState {
    accept_auth: AtomicBool,
    connections: AtomicUsize,
    tokens: parking_lot::Mutex<Vec<String>>,
    emitted: parking_lot::Mutex<Vec<Emitted>>,
    push: broadcast::Sender<String>,
    kick: broadcast::Sender<()>,
}

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    socket: Arc<SocketState>,
}

/// Mock backend server for testing.
pub struct MockServer {
    pub addr: SocketAddr,
    state: MockState,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl MockServer {
    /// Start a new mock server on an ephemeral port.
    pub async fn start() -> Self {
        let (push, _) = broadcast::channel(64);
        let (kick, _) = broadcast::channel(4);
        let state = MockState {
            requests: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            socket: Arc::new(SocketState {
                accept_auth: AtomicBool::new(true),
                connections: AtomicUsize::new(0),
                tokens: parking_lot::Mutex::new(Vec::new()),
                emitted: parking_lot::Mutex::new(Vec::new()),
                push,
                kick,
            }),
        };

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

        let app = Router::new()
            .route("/socket.io/", get(handle_socket))
            .route("/{*path}", any(handle_request))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            state,
            shutdown: shutdown_tx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Enqueue a response to be returned for the next REST request.
    pub async fn enqueue_response(&self, resp: MockResponse) {
        self.state.responses.lock().await.push_back(resp);
    }

    pub async fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().await.clone()
    }

    /// Answer future `authenticate` calls with success or rejection.
    pub fn set_accept_auth(&self, accept: bool) {
        self.state.socket.accept_auth.store(accept, Ordering::SeqCst);
    }

    /// Number of WebSocket connections accepted so far.
    pub fn connections(&self) -> usize {
        self.state.socket.connections.load(Ordering::SeqCst)
    }

    /// Tokens presented in `authenticate` events.
    pub fn auth_tokens(&self) -> Vec<String> {
        self.state.socket.tokens.lock().clone()
    }

    pub fn emitted(&self) -> Vec<Emitted> {
        self.state.socket.emitted.lock().clone()
    }

    /// How many times `event` was emitted for `intent_id`.
    pub fn emitted_count(&self, event: &str, intent_id: &str) -> usize {
        self.emitted()
            .iter()
            .filter(|e| e.event == event && e.intent_id == intent_id)
            .count()
    }

    /// Push an event to every authenticated client.
    pub fn push_event(&self, event: &str, payload: Value) {
        let frame = format!("42{},{}", NAMESPACE, json!([event, payload]));
        let _ = self.state.socket.push.send(frame);
    }
}

impl MockServer {
    /// Cut every open WebSocket without a close handshake.
    pub fn drop_connections(&self) {
        let _ = self.state.socket.kick.send(());
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn handle_request(State(state): State<MockState>, req: Request<Body>) -> Response<Body> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();

    let body_bytes = axum::body::to_bytes(req.into_body(), 1024 * 1024)
        .await
        .unwrap_or_default()
        .to_vec();

    state.requests.lock().await.push(CapturedRequest {
        method,
        path,
        headers,
        body: body_bytes,
    });

    let mock_resp = state
        .responses
        .lock()
        .await
        .pop_front()
        .unwrap_or_default();

    if mock_resp.delay_ms > 0 {
        tokio::time::sleep(tokio::time::Duration::from_millis(mock_resp.delay_ms)).await;
    }

    Response::builder()
        .status(StatusCode::from_u16(mock_resp.status).unwrap())
        .header("content-type", "application/json")
        .body(Body::from(mock_resp.body))
        .unwrap()
}

async fn handle_socket(State(state): State<MockState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state.socket))
}

async fn serve_socket(mut socket: WebSocket, state: Arc<SocketState>) {
    state.connections.fetch_add(1, Ordering::SeqCst);
    let mut push = state.push.subscribe();
    let mut kick = state.kick.subscribe();
    let mut authenticated = false;

    if socket.send(Message::Text(OPEN_FRAME.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                if text.as_str() == "1" {
                    break;
                }
                if let Some(reply) = on_client_frame(&state, text.as_str(), &mut authenticated) {
                    if socket.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
            }
            _ = kick.recv() => break,
            frame = push.recv() => {
                match frame {
                    Ok(frame) if authenticated => {
                        if socket.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Handle one Engine.IO frame from a client; returns the reply frame.
fn on_client_frame(state: &SocketState, frame: &str, authenticated: &mut bool) -> Option<String> {
    let connect = format!("40{},", NAMESPACE);
    if frame == connect {
        return Some(format!(r#"40{},{{"sid":"ns-sid"}}"#, NAMESPACE));
    }

    let rest = frame.strip_prefix(&format!("42{},", NAMESPACE))?;
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let (ack_id, data) = rest.split_at(digits);
    let items: Value = serde_json::from_str(data).ok()?;
    let name = items.get(0)?.as_str()?;
    let payload = items.get(1).cloned().unwrap_or(Value::Null);

    match name {
        "authenticate" => {
            let token = payload["token"].as_str().unwrap_or_default().to_string();
            state.tokens.lock().push(token);
            let response = if state.accept_auth.load(Ordering::SeqCst) {
                *authenticated = true;
                json!([{ "success": true, "userId": USER_ID }])
            } else {
                json!([{ "success": false, "message": "Invalid token" }])
            };
            Some(format!("43{},{}{}", NAMESPACE, ack_id, response))
        }
        "subscribe" | "unsubscribe" => {
            state.emitted.lock().push(Emitted {
                event: name.to_string(),
                intent_id: payload["intentId"].as_str().unwrap_or_default().to_string(),
            });
            None
        }
        _ => None,
    }
}
