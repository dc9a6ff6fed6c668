//! Connection task owning the event socket.
//!
//! Runs the Engine.IO/Socket.IO session, answers keepalive pings,
//! authenticates, keeps the per-intent subscription counts and fans
//! decoded events out to every `EventChannel` handle.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::config::{EventsConfig, SecureString};
use crate::intent::{PaymentIntent, StatusChange};
use crate::transport::codec::{EnginePacket, SocketPacket, SocketPacketKind};
use crate::transport::types::{
    ChannelCommand, ChannelEvent, ConnectionState, EVENT_INTENT_UPDATED, EVENT_STATUS_CHANGED,
};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Build the Engine.IO WebSocket endpoint from the configured base URL.
///
/// `http(s)` becomes `ws(s)`; the base path is kept as a prefix.
pub fn socket_url(ws_url: &str) -> Result<Url, String> {
    let mut url = Url::parse(ws_url).map_err(|e| format!("{}: {}", ws_url, e))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(format!("{}: unsupported scheme '{}'", ws_url, other)),
    };
    url.set_scheme(scheme)
        .map_err(|_| format!("{}: cannot switch scheme to {}", ws_url, scheme))?;

    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}/socket.io/", prefix));
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

/// Delay before reconnect attempt `attempt` (0-based): base doubled, capped.
pub fn backoff_delay(base_ms: u64, max_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(16);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}

enum SessionEnd {
    Dropped { reason: String, authenticated: bool },
    AuthRejected(String),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingOpen,
    AwaitingNamespace,
    Authenticating { ack_id: u64 },
    Ready,
}

struct Session {
    phase: Phase,
    /// `pingInterval + pingTimeout` from the open packet.
    keepalive: Option<Duration>,
    deadline: Option<Instant>,
}

pub struct ConnectionTask {
    config: EventsConfig,
    url: Url,
    token: SecureString,
    commands: mpsc::Receiver<ChannelCommand>,
    events: broadcast::Sender<ChannelEvent>,
    state: watch::Sender<ConnectionState>,
    interest: HashMap<String, usize>,
    next_ack_id: u64,
}

impl ConnectionTask {
    pub fn new(
        config: EventsConfig,
        url: Url,
        token: SecureString,
        commands: mpsc::Receiver<ChannelCommand>,
        events: broadcast::Sender<ChannelEvent>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            config,
            url,
            token,
            commands,
            events,
            state,
            interest: HashMap::new(),
            next_ack_id: 0,
        }
    }

    pub async fn run(mut self) {
        let mut attempt: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting);
            let handshake = Duration::from_millis(self.config.auth_timeout_ms);

            match timeout(handshake, connect_async(self.url.as_str())).await {
                Ok(Ok((socket, _))) => {
                    tracing::info!(url = %self.url, "Event channel connected");
                    match self.session(socket).await {
                        SessionEnd::Close => break,
                        SessionEnd::AuthRejected(message) => {
                            tracing::error!(message = %message, "Event channel authentication failed");
                            self.set_state(ConnectionState::AuthRejected { message });
                            if !self.idle(None).await {
                                break;
                            }
                            attempt = 0;
                            continue;
                        }
                        SessionEnd::Dropped {
                            reason,
                            authenticated,
                        } => {
                            if authenticated {
                                attempt = 0;
                            }
                            tracing::warn!(reason = %reason, "Event channel dropped");
                        }
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(url = %self.url, error = %e, "Event channel connection failed");
                }
                Err(_) => {
                    tracing::warn!(url = %self.url, "Event channel connection timed out");
                }
            }

            self.set_state(ConnectionState::Disconnected);
            let delay = backoff_delay(
                self.config.reconnect_base_ms,
                self.config.reconnect_max_ms,
                attempt,
            );
            attempt = attempt.saturating_add(1);
            tracing::debug!(delay_ms = delay.as_millis() as u64, attempt, "Reconnecting event channel");

            if !self.idle(Some(Instant::now() + delay)).await {
                break;
            }
        }

        self.set_state(ConnectionState::Closed);
        tracing::info!("Event channel closed");
    }

    /// Serve commands while disconnected.
    ///
    /// Returns `true` when it is time to connect (deadline reached or an
    /// explicit reconnect), `false` when the channel should shut down.
    async fn idle(&mut self, until: Option<Instant>) -> bool {
        loop {
            let command = tokio::select! {
                command = self.commands.recv() => command,
                _ = wait_until(until) => return true,
            };

            match command {
                None | Some(ChannelCommand::Close) => return false,
                Some(ChannelCommand::Reconnect) => return true,
                Some(ChannelCommand::Subscribe {
                    intent_id,
                    respond_to,
                }) => {
                    let (count, _) = self.add_interest(&intent_id);
                    reply(respond_to, count);
                }
                Some(ChannelCommand::Unsubscribe {
                    intent_id,
                    respond_to,
                }) => {
                    let (count, _) = self.drop_interest(&intent_id);
                    reply(respond_to, count);
                }
            }
        }
    }

    async fn session(&mut self, socket: WebSocketStream<MaybeTlsStream<TcpStream>>) -> SessionEnd {
        let (mut sink, mut stream) = socket.split();
        let mut session = Session {
            phase: Phase::AwaitingOpen,
            keepalive: None,
            deadline: Some(Instant::now() + Duration::from_millis(self.config.auth_timeout_ms)),
        };

        loop {
            tokio::select! {
                frame = stream.next() => {
                    let end = match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.on_frame(text.as_str(), &mut session, &mut sink).await
                        }
                        Some(Ok(Message::Close(_))) | None => Some(dropped(&session, "socket closed")),
                        Some(Ok(_)) => None,
                        Some(Err(e)) => Some(dropped(&session, &e.to_string())),
                    };
                    if let Some(end) = end {
                        return end;
                    }
                }
                command = self.commands.recv() => {
                    if let Some(end) = self.on_command(command, &session, &mut sink).await {
                        return end;
                    }
                }
                _ = wait_until(session.deadline) => {
                    let reason = match session.phase {
                        Phase::Ready => "keepalive ping missed",
                        _ => "handshake timed out",
                    };
                    return dropped(&session, reason);
                }
            }
        }
    }

    async fn on_command(
        &mut self,
        command: Option<ChannelCommand>,
        session: &Session,
        sink: &mut WsSink,
    ) -> Option<SessionEnd> {
        match command {
            None | Some(ChannelCommand::Close) => {
                let _ = send_frame(sink, EnginePacket::Close.encode()).await;
                let _ = sink.close().await;
                Some(SessionEnd::Close)
            }
            Some(ChannelCommand::Reconnect) => None,
            Some(ChannelCommand::Subscribe {
                intent_id,
                respond_to,
            }) => {
                let (count, first) = self.add_interest(&intent_id);
                reply(respond_to, count);
                if first && session.phase == Phase::Ready {
                    if let Err(reason) = self.emit(sink, "subscribe", &intent_id).await {
                        return Some(dropped(session, &reason));
                    }
                }
                None
            }
            Some(ChannelCommand::Unsubscribe {
                intent_id,
                respond_to,
            }) => {
                let (count, last) = self.drop_interest(&intent_id);
                reply(respond_to, count);
                if last && session.phase == Phase::Ready {
                    if let Err(reason) = self.emit(sink, "unsubscribe", &intent_id).await {
                        return Some(dropped(session, &reason));
                    }
                }
                None
            }
        }
    }

    async fn on_frame(
        &mut self,
        text: &str,
        session: &mut Session,
        sink: &mut WsSink,
    ) -> Option<SessionEnd> {
        let packet = match EnginePacket::decode(text) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring undecodable engine frame");
                return None;
            }
        };

        match packet {
            EnginePacket::Open(info) if session.phase == Phase::AwaitingOpen => {
                if info.ping_interval > 0 {
                    session.keepalive =
                        Some(Duration::from_millis(info.ping_interval + info.ping_timeout));
                }
                session.phase = Phase::AwaitingNamespace;
                let connect = SocketPacket::connect(&self.config.namespace).to_frame();
                if let Err(reason) = send_frame(sink, connect).await {
                    return Some(dropped(session, &reason));
                }
                None
            }
            EnginePacket::Ping(data) => {
                if session.phase == Phase::Ready {
                    session.deadline = session.keepalive.map(|k| Instant::now() + k);
                }
                if let Err(reason) = send_frame(sink, EnginePacket::Pong(data).encode()).await {
                    return Some(dropped(session, &reason));
                }
                None
            }
            EnginePacket::Close => Some(dropped(session, "server closed the session")),
            EnginePacket::Message(payload) => self.on_socket_packet(&payload, session, sink).await,
            _ => None,
        }
    }

    async fn on_socket_packet(
        &mut self,
        payload: &str,
        session: &mut Session,
        sink: &mut WsSink,
    ) -> Option<SessionEnd> {
        let packet = match SocketPacket::decode(payload) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring undecodable socket packet");
                return None;
            }
        };
        if packet.namespace != self.config.namespace {
            tracing::trace!(namespace = %packet.namespace, "Ignoring packet for foreign namespace");
            return None;
        }

        match packet.kind {
            SocketPacketKind::Connect if session.phase == Phase::AwaitingNamespace => {
                self.set_state(ConnectionState::Connected);
                let ack_id = self.next_ack_id;
                self.next_ack_id += 1;
                session.phase = Phase::Authenticating { ack_id };

                let authenticate = SocketPacket::event(
                    &self.config.namespace,
                    "authenticate",
                    json!({ "token": self.token.expose() }),
                    Some(ack_id),
                );
                if let Err(reason) = send_frame(sink, authenticate.to_frame()).await {
                    return Some(dropped(session, &reason));
                }
                None
            }
            SocketPacketKind::ConnectError => {
                let message = packet
                    .data
                    .as_ref()
                    .and_then(|d| d.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("namespace connection refused")
                    .to_string();
                Some(dropped(session, &message))
            }
            SocketPacketKind::Ack => {
                let Phase::Authenticating { ack_id } = session.phase else {
                    return None;
                };
                if packet.ack_id != Some(ack_id) {
                    return None;
                }
                self.on_auth_ack(packet.ack_payload(), session, sink).await
            }
            SocketPacketKind::Event => {
                if let Some((name, payload)) = packet.event_parts() {
                    if let Some(event) = decode_event(name, payload) {
                        tracing::debug!(event = name, intent_id = %event.intent_id(), "Event received");
                        // No receivers is fine: nobody is tracking right now.
                        let _ = self.events.send(event);
                    }
                }
                None
            }
            SocketPacketKind::Disconnect => Some(dropped(session, "server left the namespace")),
            SocketPacketKind::Connect => None,
        }
    }

    async fn on_auth_ack(
        &mut self,
        response: Option<&Value>,
        session: &mut Session,
        sink: &mut WsSink,
    ) -> Option<SessionEnd> {
        let success = response
            .and_then(|r| r.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !success {
            let message = response
                .and_then(|r| r.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Authentication failed")
                .to_string();
            let _ = send_frame(sink, EnginePacket::Close.encode()).await;
            let _ = sink.close().await;
            return Some(SessionEnd::AuthRejected(message));
        }

        let user_id = response
            .and_then(|r| r.get("userId"))
            .and_then(Value::as_str)
            .map(str::to_string);
        tracing::info!(user_id = ?user_id, "Event channel authenticated");

        session.phase = Phase::Ready;
        session.deadline = session.keepalive.map(|k| Instant::now() + k);
        self.set_state(ConnectionState::Authenticated { user_id });

        let ids: Vec<String> = self.interest.keys().cloned().collect();
        for intent_id in ids {
            if let Err(reason) = self.emit(sink, "subscribe", &intent_id).await {
                return Some(dropped(session, &reason));
            }
        }
        None
    }

    async fn emit(&self, sink: &mut WsSink, name: &str, intent_id: &str) -> Result<(), String> {
        tracing::debug!(event = name, intent_id = %intent_id, "Emitting");
        let packet = SocketPacket::event(
            &self.config.namespace,
            name,
            json!({ "intentId": intent_id }),
            None,
        );
        send_frame(sink, packet.to_frame()).await
    }

    fn add_interest(&mut self, intent_id: &str) -> (usize, bool) {
        let count = self.interest.entry(intent_id.to_string()).or_insert(0);
        *count += 1;
        (*count, *count == 1)
    }

    fn drop_interest(&mut self, intent_id: &str) -> (usize, bool) {
        match self.interest.get_mut(intent_id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                (*count, false)
            }
            Some(_) => {
                self.interest.remove(intent_id);
                (0, true)
            }
            None => (0, false),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

fn decode_event(name: &str, payload: &Value) -> Option<ChannelEvent> {
    match name {
        EVENT_STATUS_CHANGED => match StatusChange::from_payload(payload.clone()) {
            Ok(Some(change)) => Some(ChannelEvent::StatusChanged(change)),
            Ok(None) => {
                tracing::warn!("Ignoring status change without intent id");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed status change");
                None
            }
        },
        EVENT_INTENT_UPDATED => match serde_json::from_value::<PaymentIntent>(payload.clone()) {
            Ok(intent) => Some(ChannelEvent::IntentUpdated(intent)),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed intent update");
                None
            }
        },
        other => {
            tracing::trace!(event = other, "Ignoring unknown event");
            None
        }
    }
}

fn dropped(session: &Session, reason: &str) -> SessionEnd {
    SessionEnd::Dropped {
        reason: reason.to_string(),
        authenticated: session.phase == Phase::Ready,
    }
}

fn reply(respond_to: Option<tokio::sync::oneshot::Sender<usize>>, count: usize) {
    if let Some(tx) = respond_to {
        if tx.send(count).is_err() {
            tracing::trace!("Event channel reply dropped (receiver gone)");
        }
    }
}

async fn send_frame(sink: &mut WsSink, frame: String) -> Result<(), String> {
    sink.send(Message::text(frame))
        .await
        .map_err(|e| e.to_string())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
