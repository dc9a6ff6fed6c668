use thiserror::Error;
use tokio::sync::oneshot;

use crate::intent::{PaymentIntent, StatusChange};

/// Event name for status transitions.
pub const EVENT_STATUS_CHANGED: &str = "status.changed";
/// Event name for full-record replacements.
pub const EVENT_INTENT_UPDATED: &str = "intent.updated";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Event channel closed")]
    Closed,
    #[error("Event channel did not answer in time")]
    Timeout,
    #[error("Event channel authentication failed: {0}")]
    AuthRejected(String),
    #[error("Invalid event channel URL: {0}")]
    InvalidUrl(String),
}

impl ChannelError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ChannelError::Closed => "channel_closed",
            ChannelError::Timeout => "channel_timeout",
            ChannelError::AuthRejected(_) => "channel_auth_rejected",
            ChannelError::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// Lifecycle of the shared connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Socket open, authentication pending.
    Connected,
    Authenticated { user_id: Option<String> },
    /// The server refused the token; no automatic retry.
    AuthRejected { message: String },
    Closed,
}

impl ConnectionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, ConnectionState::Authenticated { .. })
    }
}

/// A pushed server event, decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    StatusChanged(StatusChange),
    IntentUpdated(PaymentIntent),
}

impl ChannelEvent {
    /// Identifier of the intent this event is about.
    pub fn intent_id(&self) -> &str {
        match self {
            ChannelEvent::StatusChanged(change) => &change.intent_id,
            ChannelEvent::IntentUpdated(intent) => &intent.id,
        }
    }
}

/// Commands accepted by the connection task.
#[derive(Debug)]
pub enum ChannelCommand {
    Subscribe {
        intent_id: String,
        respond_to: Option<oneshot::Sender<usize>>,
    },
    Unsubscribe {
        intent_id: String,
        respond_to: Option<oneshot::Sender<usize>>,
    },
    /// Leave the rejected/backoff state and connect now.
    Reconnect,
    Close,
}
