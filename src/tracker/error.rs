use thiserror::Error;

use crate::api::ApiError;
use crate::transport::ChannelError;

/// Errors returned by tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The tracker was closed while the operation was in flight.
    #[error("Operation cancelled: tracker closed")]
    Cancelled,
}

impl TrackerError {
    pub fn error_type(&self) -> &'static str {
        match self {
            TrackerError::Api(err) => err.error_type(),
            TrackerError::Channel(err) => err.error_type(),
            TrackerError::Cancelled => "cancelled",
        }
    }
}
