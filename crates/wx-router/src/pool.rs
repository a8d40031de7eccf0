//! ChannelPool - Fixed set of open service channels
//!
//! - Opens all channels up front, all-or-nothing
//! - Shares the member list read-only with the dispatcher
//! - Closes every member at shutdown, logging (not propagating) close errors

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use wx_common::{ChannelHandle, NotificationKind};
use wx_service::{NotificationCallback, ServiceError, WeatherService};

use crate::error::RouterError;
use crate::router_metrics;
use crate::Result;

pub struct ChannelPool {
    service: Arc<dyn WeatherService>,
    channels: Arc<[ChannelHandle]>,
    closed: bool,
}

impl ChannelPool {
    /// Open exactly `count` channels, one after another.
    ///
    /// If any open fails, the channels opened so far are closed again before
    /// the error is returned, so no partial pool survives.
    pub async fn open(service: Arc<dyn WeatherService>, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(RouterError::Config("channel pool size must be at least 1".to_string()));
        }

        let mut opened: Vec<ChannelHandle> = Vec::with_capacity(count);

        for index in 0..count {
            let result = match service.open_channel().await {
                Ok(channel) if opened.contains(&channel) => {
                    Err(ServiceError::DuplicateChannel(channel))
                }
                other => other,
            };

            match result {
                Ok(channel) => {
                    debug!(channel = %channel, index, "Channel opened");
                    opened.push(channel);
                    router_metrics::set_open_channels(opened.len());
                }
                Err(source) => {
                    error!(
                        index,
                        requested = count,
                        error = %source,
                        "Failed to open channel, releasing partial pool"
                    );
                    close_channels(service.as_ref(), &opened).await;
                    router_metrics::set_open_channels(0);
                    return Err(RouterError::ChannelOpen { index, source });
                }
            }
        }

        info!(channels = opened.len(), "Channel pool opened");

        Ok(Self {
            service,
            channels: opened.into(),
            closed: false,
        })
    }

    /// Member list in priority order. Never changes after `open`.
    pub fn channels(&self) -> Arc<[ChannelHandle]> {
        self.channels.clone()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Register the same callback on every channel
    pub fn register_notifications(
        &self,
        kind: NotificationKind,
        callback: NotificationCallback,
    ) -> Result<()> {
        for &channel in self.channels.iter() {
            self.service
                .register_notification_callback(channel, kind, callback.clone())
                .map_err(|source| {
                    error!(channel = %channel, %kind, error = %source, "Notification registration failed");
                    RouterError::Registration { channel, source }
                })?;
            debug!(channel = %channel, %kind, "Notification callback registered");
        }
        Ok(())
    }

    /// Close every channel. Returns how many closes failed.
    pub async fn close_all(mut self) -> usize {
        let failures = close_channels(self.service.as_ref(), &self.channels).await;
        self.closed = true;
        router_metrics::set_open_channels(0);

        if failures == 0 {
            info!(channels = self.channels.len(), "Channel pool closed");
        } else {
            warn!(
                channels = self.channels.len(),
                failures,
                "Channel pool closed with errors"
            );
        }
        failures
    }
}

impl Drop for ChannelPool {
    fn drop(&mut self) {
        if !self.closed && !self.channels.is_empty() {
            warn!(
                channels = self.channels.len(),
                "Channel pool dropped without close_all; service sessions leaked"
            );
        }
    }
}

async fn close_channels(service: &dyn WeatherService, channels: &[ChannelHandle]) -> usize {
    let mut failures = 0;
    for &channel in channels {
        if let Err(e) = service.close_channel(channel).await {
            warn!(channel = %channel, error = %e, "Failed to close channel");
            failures += 1;
        }
    }
    failures
}
