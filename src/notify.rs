//! User-visible notifications.
//!
//! The tracker reports operation outcomes and major pushed transitions
//! through a [`NotificationSink`]. Sinks decide how they are shown.

use std::fmt;

use tokio::sync::mpsc;

use crate::intent::{IntentStatus, PaymentIntent};

pub const INTENT_CREATED: &str = "Payment intent created";
pub const CREATE_FAILED: &str = "Failed to create payment intent";
pub const TRANSACTION_SUBMITTED: &str = "Transaction submitted successfully";
pub const PAYMENT_CANCELLED: &str = "Payment cancelled";
pub const CANCEL_FAILED: &str = "Failed to cancel payment";
pub const FETCH_FAILED: &str = "Failed to load payment intent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "success",
            NotificationLevel::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub intent_id: Option<String>,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }

    pub fn for_intent(mut self, intent_id: impl Into<String>) -> Self {
        self.intent_id = Some(intent_id.into());
        self
    }

    fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            intent_id: None,
        }
    }

    /// Notification for a pushed transition into `record.status`.
    ///
    /// Returns `None` for statuses that are not announced.
    pub fn for_status(record: &PaymentIntent) -> Option<Self> {
        let notification = match record.status {
            IntentStatus::PendingConfirmation => {
                Notification::info("Transaction broadcasted, waiting for confirmation...")
            }
            IntentStatus::Confirmed => Notification::success("Payment confirmed!"),
            IntentStatus::Failed => Notification::error(format!(
                "Payment failed: {}",
                record.error_message.as_deref().unwrap_or("Unknown error")
            )),
            IntentStatus::Expired => Notification::error("Payment intent expired"),
            _ => return None,
        };
        Some(notification.for_intent(record.id.clone()))
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        let intent_id = notification.intent_id.as_deref().unwrap_or("-");
        match notification.level {
            NotificationLevel::Error => {
                tracing::warn!(intent_id = %intent_id, "{}", notification.message)
            }
            _ => tracing::info!(
                intent_id = %intent_id,
                level = %notification.level,
                "{}",
                notification.message
            ),
        }
    }
}

/// Forwards notifications into a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is listening any more.
        let _ = self.sender.send(notification);
    }
}
