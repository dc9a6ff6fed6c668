//! Shared push-event channel for payment-intent updates.
//!
//! # Architecture
//!
//! ```text
//! EventChannel ──commands──→ ConnectionTask ──frames──→ server
//!      ↑                          │
//!      └────broadcast events──────┘
//! ```
//!
//! One connection task owns the socket. Handles talk to it over an mpsc
//! queue with oneshot replies and receive decoded events over a broadcast
//! channel.

mod codec;
mod connection;
mod handle;
mod shared;
mod types;

pub use codec::{CodecError, EnginePacket, OpenInfo, SocketPacket, SocketPacketKind};
pub use connection::{backoff_delay, socket_url};
pub use handle::EventChannel;
pub use shared::shared;
pub use types::{
    ChannelError, ChannelEvent, ConnectionState, EVENT_INTENT_UPDATED, EVENT_STATUS_CHANGED,
};
