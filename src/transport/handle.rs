use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::config::{EventsConfig, SecureString};
use crate::transport::connection::{socket_url, ConnectionTask};
use crate::transport::types::{ChannelCommand, ChannelError, ChannelEvent, ConnectionState};

const COMMAND_BUFFER: usize = 32;

/// Handle to one authenticated event connection.
///
/// Clones share the same connection task. The task ends when `close()` is
/// called or every handle is dropped.
#[derive(Clone)]
pub struct EventChannel {
    sender: mpsc::Sender<ChannelCommand>,
    events: broadcast::Sender<ChannelEvent>,
    state: watch::Receiver<ConnectionState>,
    reply_timeout: Duration,
}

impl EventChannel {
    /// Spawn the connection task. Must be called inside a tokio runtime.
    pub fn connect(config: &EventsConfig, token: SecureString) -> Result<Self, ChannelError> {
        let url = socket_url(&config.ws_url).map_err(ChannelError::InvalidUrl)?;
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let task = ConnectionTask::new(
            config.clone(),
            url,
            token,
            receiver,
            events.clone(),
            state_tx,
        );
        tokio::spawn(task.run());

        Ok(Self {
            sender,
            events,
            state: state_rx,
            reply_timeout: Duration::from_millis(config.reply_timeout_ms),
        })
    }

    /// Register interest in an intent. Returns the new interest count.
    ///
    /// The server is asked to push events only when the count goes 0 → 1.
    pub async fn subscribe(&self, intent_id: &str) -> Result<usize, ChannelError> {
        let (respond_to, receiver) = oneshot::channel();
        self.sender
            .send(ChannelCommand::Subscribe {
                intent_id: intent_id.to_string(),
                respond_to: Some(respond_to),
            })
            .await
            .map_err(|_| ChannelError::Closed)?;

        self.recv_with_timeout(receiver).await
    }

    /// Drop interest in an intent. Returns the remaining interest count.
    ///
    /// The server is told to stop only when the count reaches zero.
    pub async fn unsubscribe(&self, intent_id: &str) -> Result<usize, ChannelError> {
        let (respond_to, receiver) = oneshot::channel();
        self.sender
            .send(ChannelCommand::Unsubscribe {
                intent_id: intent_id.to_string(),
                respond_to: Some(respond_to),
            })
            .await
            .map_err(|_| ChannelError::Closed)?;

        self.recv_with_timeout(receiver).await
    }

    /// Fire-and-forget `unsubscribe`, usable from synchronous code.
    pub fn release(&self, intent_id: &str) {
        let command = ChannelCommand::Unsubscribe {
            intent_id: intent_id.to_string(),
            respond_to: None,
        };
        match self.sender.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    tracing::warn!(intent_id = %intent_id, "Unsubscribe dropped: no runtime");
                    return;
                };
                let sender = self.sender.clone();
                let intent_id = intent_id.to_string();
                runtime.spawn(async move {
                    if sender.send(command).await.is_err() {
                        tracing::trace!(intent_id = %intent_id, "Unsubscribe skipped: channel closed");
                    }
                });
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!(intent_id = %intent_id, "Unsubscribe skipped: channel closed");
            }
        }
    }

    /// New receiver for pushed events, starting from now.
    pub fn events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Wait until authenticated. Fails fast on rejection or closure.
    pub async fn wait_authenticated(&self, limit: Duration) -> Result<(), ChannelError> {
        let mut state = self.state.clone();
        let wait = state.wait_for(|s| {
            matches!(
                s,
                ConnectionState::Authenticated { .. }
                    | ConnectionState::AuthRejected { .. }
                    | ConnectionState::Closed
            )
        });

        let result = match tokio::time::timeout(limit, wait).await {
            Err(_) => Err(ChannelError::Timeout),
            Ok(Err(_)) => Err(ChannelError::Closed),
            Ok(Ok(current)) => match &*current {
                ConnectionState::Authenticated { .. } => Ok(()),
                ConnectionState::AuthRejected { message } => {
                    Err(ChannelError::AuthRejected(message.clone()))
                }
                _ => Err(ChannelError::Closed),
            },
        };
        result
    }

    /// Connect now, leaving a rejected or backoff state.
    pub async fn reconnect(&self) -> Result<(), ChannelError> {
        self.sender
            .send(ChannelCommand::Reconnect)
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Shut the connection down for every handle.
    pub async fn close(&self) {
        let _ = self.sender.send(ChannelCommand::Close).await;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles drive the same connection.
    pub fn same_channel(&self, other: &EventChannel) -> bool {
        self.sender.same_channel(&other.sender)
    }

    async fn recv_with_timeout<T>(&self, receiver: oneshot::Receiver<T>) -> Result<T, ChannelError> {
        match tokio::time::timeout(self.reply_timeout, receiver).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => Err(ChannelError::Timeout),
        }
    }
}
