use thiserror::Error;
use wx_common::{ChannelHandle, CorrelationId};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Too many channels open")]
    TooManyChannels,

    #[error("Too many requests on channel")]
    TooManyRequests,

    #[error("Invalid channel: {0}")]
    InvalidChannel(ChannelHandle),

    #[error("Channel handle issued twice: {0}")]
    DuplicateChannel(ChannelHandle),

    #[error("Unknown request: {0}")]
    UnknownRequest(CorrelationId),

    #[error("Request not ready: {0}")]
    NotReady(CorrelationId),

    #[error("Unsupported location: {0}")]
    UnsupportedLocation(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Dataset I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dataset serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Capacity rejection is the only outcome a caller may retry
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, ServiceError::TooManyRequests)
    }

    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::TooManyChannels => "too_many_channels",
            ServiceError::TooManyRequests => "too_many_requests",
            ServiceError::InvalidChannel(_) => "invalid_channel",
            ServiceError::DuplicateChannel(_) => "duplicate_channel",
            ServiceError::UnknownRequest(_) => "unknown_request",
            ServiceError::NotReady(_) => "not_ready",
            ServiceError::UnsupportedLocation(_) => "unsupported_location",
            ServiceError::Unavailable(_) => "unavailable",
            ServiceError::Io(_) => "io",
            ServiceError::Serialization(_) => "serialization",
        }
    }
}
