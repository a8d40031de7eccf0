//! Dispatcher - Submits one request per location across the channel pool
//!
//! Each attempt offers the request to the channels in fixed priority order
//! (first channel first, never round-robin). A channel at capacity passes the
//! request on to the next one; when every channel is at capacity the
//! dispatcher sleeps for the backoff interval and starts again from the first
//! channel. Any other service error ends dispatching.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use wx_common::{ChannelHandle, CorrelationId, RequestOptions};
use wx_service::WeatherService;

use crate::error::RouterError;
use crate::router_metrics;
use crate::store::ResultStore;
use crate::Result;

/// Retry behaviour for capacity rejections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Sleep after a pass in which every channel was at capacity
    pub backoff: Duration,
    /// Give up on a location after this many full passes. `None` never gives up.
    pub max_attempts: Option<u32>,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(100),
            max_attempts: None,
        }
    }
}

/// A request the service accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub request_id: CorrelationId,
    pub location: String,
    pub channel: ChannelHandle,
    /// Passes over the pool, including the accepting one
    pub attempts: u32,
    /// Capacity rejections seen before acceptance
    pub rejections: u32,
}

/// Outcome of dispatching a whole location list
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub submissions: Vec<Submission>,
    pub capacity_rejections: u64,
}

pub struct Dispatcher {
    service: Arc<dyn WeatherService>,
    channels: Arc<[ChannelHandle]>,
    store: Arc<ResultStore>,
    policy: DispatchPolicy,
    options: Option<RequestOptions>,
}

impl Dispatcher {
    pub fn new(
        service: Arc<dyn WeatherService>,
        channels: Arc<[ChannelHandle]>,
        store: Arc<ResultStore>,
    ) -> Self {
        Self {
            service,
            channels,
            store,
            policy: DispatchPolicy::default(),
            options: None,
        }
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: Option<RequestOptions>) -> Self {
        self.options = options;
        self
    }

    /// Get one request for `location` accepted by some channel
    pub async fn submit(&self, location: &str) -> Result<Submission> {
        if self.channels.is_empty() {
            return Err(RouterError::Config("dispatcher has no channels".to_string()));
        }

        let started = Instant::now();
        let mut attempts = 0u32;
        let mut rejections = 0u32;

        loop {
            attempts = attempts.saturating_add(1);

            for &channel in self.channels.iter() {
                match self
                    .service
                    .send_request(channel, location, self.options.as_ref())
                    .await
                {
                    Ok(request_id) => {
                        self.store.mark_submitted(request_id);
                        router_metrics::record_request_submitted(channel);
                        router_metrics::record_dispatch_latency(started.elapsed());
                        debug!(
                            location,
                            channel = %channel,
                            request_id = %request_id,
                            attempts,
                            rejections,
                            "Request accepted"
                        );
                        return Ok(Submission {
                            request_id,
                            location: location.to_string(),
                            channel,
                            attempts,
                            rejections,
                        });
                    }
                    Err(e) if e.is_capacity_exceeded() => {
                        rejections = rejections.saturating_add(1);
                        router_metrics::record_capacity_rejection(channel);
                        trace!(location, channel = %channel, "Channel at capacity");
                    }
                    Err(source) => {
                        error!(location, channel = %channel, error = %source, "Request rejected");
                        return Err(RouterError::Dispatch {
                            location: location.to_string(),
                            source,
                        });
                    }
                }
            }

            if let Some(max_attempts) = self.policy.max_attempts {
                if attempts >= max_attempts {
                    warn!(location, attempts, "Giving up: every channel stayed at capacity");
                    return Err(RouterError::CapacityExhausted {
                        location: location.to_string(),
                        attempts,
                    });
                }
            }

            router_metrics::record_dispatch_backoff();
            debug!(
                location,
                attempts,
                backoff_ms = self.policy.backoff.as_millis() as u64,
                "All channels at capacity, backing off"
            );
            tokio::time::sleep(self.policy.backoff).await;
        }
    }

    /// Submit every location in order, one accepted request each
    pub async fn run(&self, locations: &[String]) -> Result<DispatchReport> {
        let mut report = DispatchReport {
            submissions: Vec::with_capacity(locations.len()),
            capacity_rejections: 0,
        };

        for location in locations {
            let submission = self.submit(location).await?;
            report.capacity_rejections += u64::from(submission.rejections);
            report.submissions.push(submission);
        }

        info!(
            submitted = report.submissions.len(),
            capacity_rejections = report.capacity_rejections,
            "Dispatch complete"
        );
        Ok(report)
    }

    /// Run the dispatcher as a background task
    pub fn spawn(self, locations: Vec<String>) -> JoinHandle<Result<DispatchReport>> {
        tokio::spawn(async move { self.run(&locations).await })
    }
}
