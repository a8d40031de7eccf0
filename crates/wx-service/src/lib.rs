//! Weather service contract
//!
//! The remote data provider is reached through channels. A channel accepts a
//! small number of concurrent requests, announces finished requests through a
//! `WeatherInfoReady` notification, and hands results out page by page.

use async_trait::async_trait;
use std::sync::Arc;
use wx_common::{
    ChannelHandle, CorrelationId, NotificationKind, RequestOptions, ResultPage, WeatherInfoReady,
};

pub mod error;

#[cfg(feature = "simulated")]
pub mod dataset;

#[cfg(feature = "simulated")]
pub mod simulated;

pub use error::ServiceError;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Callback the service invokes when a request's data is ready.
///
/// The service calls it from its own execution context, possibly from several
/// channels at once, and ignores anything the callback does in response.
pub type NotificationCallback = Arc<dyn Fn(NotificationKind, WeatherInfoReady) + Send + Sync>;

/// Operations the weather service exposes to its clients
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Names of every location the service can report on
    async fn supported_locations(&self) -> Result<Vec<String>>;

    /// Open a new channel. Fails with `TooManyChannels` past the service limit.
    async fn open_channel(&self) -> Result<ChannelHandle>;

    /// Close a channel, abandoning any requests still outstanding on it
    async fn close_channel(&self, channel: ChannelHandle) -> Result<()>;

    /// Wire `callback` to notifications of `kind` on `channel`
    fn register_notification_callback(
        &self,
        channel: ChannelHandle,
        kind: NotificationKind,
        callback: NotificationCallback,
    ) -> Result<()>;

    /// Submit a request. `TooManyRequests` means the channel is full right now.
    async fn send_request(
        &self,
        channel: ChannelHandle,
        location: &str,
        options: Option<&RequestOptions>,
    ) -> Result<CorrelationId>;

    /// Pull the next page of results for a request that has been announced ready
    async fn next_result_page(
        &self,
        channel: ChannelHandle,
        request_id: CorrelationId,
    ) -> Result<ResultPage>;
}
