//! In-process weather service
//!
//! Behaves like the remote provider as far as clients can observe:
//! - A hard cap on open channels (`TooManyChannels`)
//! - A per-channel cap on outstanding requests (`TooManyRequests`)
//! - Data-ready notifications delivered later from the service's own tasks
//! - Paginated result retrieval; draining the last page frees the slot

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};
use wx_common::{
    ChannelHandle, CorrelationId, NotificationKind, RequestOptions, ResultPage, WeatherInfoReady,
    WeatherRecord,
};

use crate::dataset::Dataset;
use crate::{NotificationCallback, Result, ServiceError, WeatherService};

/// Limits and timing of the simulated service
#[derive(Debug, Clone)]
pub struct SimulatedServiceConfig {
    pub max_channels: usize,
    pub max_requests_per_channel: usize,
    pub page_size: usize,
    pub notify_delay: Duration,
    pub notify_jitter: Duration,
}

impl Default for SimulatedServiceConfig {
    fn default() -> Self {
        Self {
            max_channels: 3,
            max_requests_per_channel: 2,
            page_size: 4,
            notify_delay: Duration::from_millis(50),
            notify_jitter: Duration::from_millis(50),
        }
    }
}

#[derive(Default)]
struct ChannelState {
    callbacks: HashMap<NotificationKind, NotificationCallback>,
    in_flight: usize,
}

struct PendingRequest {
    channel: ChannelHandle,
    remaining: VecDeque<WeatherRecord>,
    ready: bool,
}

/// Simulated weather service backed by an in-memory [`Dataset`]
pub struct SimulatedWeatherService {
    config: SimulatedServiceConfig,
    dataset: Dataset,
    channels: Mutex<HashMap<ChannelHandle, ChannelState>>,
    requests: Arc<DashMap<CorrelationId, PendingRequest>>,
    next_channel: AtomicU64,
    peak_open: AtomicUsize,
    total_rejections: AtomicU64,
}

impl SimulatedWeatherService {
    pub fn new(config: SimulatedServiceConfig, dataset: Dataset) -> Self {
        info!(
            locations = dataset.len(),
            max_channels = config.max_channels,
            max_requests_per_channel = config.max_requests_per_channel,
            page_size = config.page_size,
            "Simulated weather service ready"
        );
        Self {
            config,
            dataset,
            channels: Mutex::new(HashMap::new()),
            requests: Arc::new(DashMap::new()),
            next_channel: AtomicU64::new(0),
            peak_open: AtomicUsize::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    pub fn with_builtin_data(config: SimulatedServiceConfig) -> Self {
        Self::new(config, Dataset::builtin())
    }

    /// Channels currently open
    pub fn open_channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Highest number of channels that were ever open at the same time
    pub fn peak_open_channels(&self) -> usize {
        self.peak_open.load(Ordering::SeqCst)
    }

    /// Requests accepted but not yet fully drained
    pub fn outstanding_requests(&self) -> usize {
        self.requests.len()
    }

    /// `TooManyRequests` rejections handed out so far
    pub fn capacity_rejections(&self) -> u64 {
        self.total_rejections.load(Ordering::SeqCst)
    }

    fn notification_delay(&self) -> Duration {
        let jitter_ms = self.config.notify_jitter.as_millis() as u64;
        let extra = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        self.config.notify_delay + Duration::from_millis(extra)
    }

    fn release_slot(&self, channel: ChannelHandle) {
        if let Some(state) = self.channels.lock().get_mut(&channel) {
            state.in_flight = state.in_flight.saturating_sub(1);
        }
    }
}

#[async_trait]
impl WeatherService for SimulatedWeatherService {
    async fn supported_locations(&self) -> Result<Vec<String>> {
        Ok(self.dataset.locations())
    }

    async fn open_channel(&self) -> Result<ChannelHandle> {
        let mut channels = self.channels.lock();
        if channels.len() >= self.config.max_channels {
            debug!(open = channels.len(), "Rejecting channel open: limit reached");
            return Err(ServiceError::TooManyChannels);
        }

        let handle = ChannelHandle(self.next_channel.fetch_add(1, Ordering::SeqCst) + 1);
        channels.insert(handle, ChannelState::default());
        self.peak_open.fetch_max(channels.len(), Ordering::SeqCst);

        debug!(channel = %handle, open = channels.len(), "Channel opened");
        Ok(handle)
    }

    async fn close_channel(&self, channel: ChannelHandle) -> Result<()> {
        if self.channels.lock().remove(&channel).is_none() {
            return Err(ServiceError::InvalidChannel(channel));
        }

        let before = self.requests.len();
        self.requests.retain(|_, request| request.channel != channel);
        let abandoned = before.saturating_sub(self.requests.len());

        debug!(channel = %channel, abandoned, "Channel closed");
        Ok(())
    }

    fn register_notification_callback(
        &self,
        channel: ChannelHandle,
        kind: NotificationKind,
        callback: NotificationCallback,
    ) -> Result<()> {
        let mut channels = self.channels.lock();
        let state = channels
            .get_mut(&channel)
            .ok_or(ServiceError::InvalidChannel(channel))?;
        state.callbacks.insert(kind, callback);
        Ok(())
    }

    async fn send_request(
        &self,
        channel: ChannelHandle,
        location: &str,
        options: Option<&RequestOptions>,
    ) -> Result<CorrelationId> {
        let records = self
            .dataset
            .records_for(location)
            .ok_or_else(|| ServiceError::UnsupportedLocation(location.to_string()))?;

        let callback = {
            let mut channels = self.channels.lock();
            let state = channels
                .get_mut(&channel)
                .ok_or(ServiceError::InvalidChannel(channel))?;

            if state.in_flight >= self.config.max_requests_per_channel {
                self.total_rejections.fetch_add(1, Ordering::SeqCst);
                trace!(channel = %channel, location, "Channel at capacity");
                return Err(ServiceError::TooManyRequests);
            }
            state.in_flight += 1;
            state.callbacks.get(&NotificationKind::WeatherInfoReady).cloned()
        };

        let remaining: VecDeque<WeatherRecord> = records
            .iter()
            .filter(|record| options.map_or(true, |o| o.matches(record.date)))
            .cloned()
            .collect();

        let request_id = CorrelationId::new_v4();
        self.requests.insert(
            request_id,
            PendingRequest {
                channel,
                remaining,
                ready: false,
            },
        );

        let delay = self.notification_delay();
        let requests = self.requests.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let still_pending = match requests.get_mut(&request_id) {
                Some(mut request) => {
                    request.ready = true;
                    true
                }
                None => false,
            };

            if !still_pending {
                return;
            }
            if let Some(callback) = callback {
                callback(
                    NotificationKind::WeatherInfoReady,
                    WeatherInfoReady { channel, request_id },
                );
            }
        });

        debug!(channel = %channel, location, request_id = %request_id, "Request accepted");
        Ok(request_id)
    }

    async fn next_result_page(
        &self,
        channel: ChannelHandle,
        request_id: CorrelationId,
    ) -> Result<ResultPage> {
        if !self.channels.lock().contains_key(&channel) {
            return Err(ServiceError::InvalidChannel(channel));
        }

        let page = {
            let mut request = self
                .requests
                .get_mut(&request_id)
                .filter(|request| request.channel == channel)
                .ok_or(ServiceError::UnknownRequest(request_id))?;

            if !request.ready {
                return Err(ServiceError::NotReady(request_id));
            }

            let take = self.config.page_size.min(request.remaining.len());
            let records: Vec<WeatherRecord> = request.remaining.drain(..take).collect();
            ResultPage::new(records, !request.remaining.is_empty())
        };

        if !page.has_more {
            self.requests.remove(&request_id);
            self.release_slot(channel);
        }

        Ok(page)
    }
}
