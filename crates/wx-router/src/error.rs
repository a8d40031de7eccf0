use thiserror::Error;
use wx_common::ChannelHandle;
use wx_service::ServiceError;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Failed to fetch supported locations: {0}")]
    Locations(#[source] ServiceError),

    #[error("Failed to open channel {index}: {source}")]
    ChannelOpen {
        index: usize,
        #[source]
        source: ServiceError,
    },

    #[error("Failed to register notifications on {channel}: {source}")]
    Registration {
        channel: ChannelHandle,
        #[source]
        source: ServiceError,
    },

    #[error("Request for {location} failed: {source}")]
    Dispatch {
        location: String,
        #[source]
        source: ServiceError,
    },

    #[error("Request for {location} rejected for capacity on {attempts} consecutive attempts")]
    CapacityExhausted { location: String, attempts: u32 },

    #[error("Dispatcher task failed: {0}")]
    DispatcherPanicked(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report output error: {0}")]
    Output(#[from] std::io::Error),
}
