//! Process-wide event connection.

use parking_lot::Mutex;

use crate::config::{EventsConfig, SecureString};
use crate::transport::handle::EventChannel;
use crate::transport::types::ChannelError;

static SHARED: Mutex<Option<EventChannel>> = parking_lot::const_mutex(None);

/// The process-wide event channel, connecting on first use.
///
/// Later calls return the same connection whatever their arguments, so
/// navigating between trackers never reconnects. A channel whose task has
/// ended is replaced.
pub fn shared(config: &EventsConfig, token: &SecureString) -> Result<EventChannel, ChannelError> {
    let mut guard = SHARED.lock();
    if let Some(channel) = guard.as_ref() {
        if !channel.is_closed() {
            return Ok(channel.clone());
        }
        tracing::info!("Shared event channel ended, starting a new one");
    }

    let channel = EventChannel::connect(config, token.clone())?;
    *guard = Some(channel.clone());
    Ok(channel)
}
