//! ReportRunner - Blocking entry point tying the pipeline together
//!
//! 1. Fetch supported locations
//! 2. Open the channel pool
//! 3. Register the notification callback on every channel
//! 4. Dispatch all requests in a background task
//! 5. Print results in the foreground until every location is accounted for
//! 6. Join the dispatcher, then close the channels

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{error, info, warn};
use wx_common::{NotificationKind, RequestOptions};
use wx_service::WeatherService;

use crate::aggregator::{AggregateSummary, Aggregator};
use crate::demux::NotificationDemux;
use crate::dispatcher::{DispatchPolicy, DispatchReport, Dispatcher};
use crate::error::RouterError;
use crate::pool::ChannelPool;
use crate::report::{ReportWriter, DEFAULT_DATE_FORMAT};
use crate::store::ResultStore;
use crate::Result;

/// Settings for one report run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub pool_size: usize,
    pub policy: DispatchPolicy,
    pub options: Option<RequestOptions>,
    pub poll_interval: Duration,
    pub date_format: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pool_size: 3,
            policy: DispatchPolicy::default(),
            options: None,
            poll_interval: Duration::from_millis(100),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// What a successful run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub locations: usize,
    pub submitted: usize,
    pub consumed: usize,
    pub empty: usize,
    pub rows: usize,
    pub capacity_rejections: u64,
    pub notifications: u64,
    pub duplicate_notifications: u64,
    pub page_failures: u64,
    pub close_failures: usize,
}

pub struct ReportRunner {
    service: Arc<dyn WeatherService>,
    config: RunnerConfig,
}

impl ReportRunner {
    pub fn new(service: Arc<dyn WeatherService>, config: RunnerConfig) -> Self {
        Self { service, config }
    }

    /// Run the report and map the outcome to a process status: 0 on success, 1 on failure
    pub async fn run_to_status<W: Write>(&self, out: W) -> i32 {
        match self.run(out).await {
            Ok(summary) => {
                info!(
                    locations = summary.locations,
                    rows = summary.rows,
                    empty = summary.empty,
                    capacity_rejections = summary.capacity_rejections,
                    "Weather report complete"
                );
                0
            }
            Err(e) => {
                error!(error = %e, details = ?e, "Weather report failed");
                1
            }
        }
    }

    pub async fn run<W: Write>(&self, out: W) -> Result<RunSummary> {
        let mut report = ReportWriter::with_date_format(out, &self.config.date_format)?;

        let locations = self
            .service
            .supported_locations()
            .await
            .map_err(RouterError::Locations)?;
        info!(locations = locations.len(), "Fetched supported locations");

        let store = Arc::new(ResultStore::new());
        let demux = NotificationDemux::new(self.service.clone(), store.clone())?;

        let pool = ChannelPool::open(self.service.clone(), self.config.pool_size).await?;
        if let Err(e) = pool.register_notifications(NotificationKind::WeatherInfoReady, demux.callback()) {
            pool.close_all().await;
            return Err(e);
        }

        let dispatcher = Dispatcher::new(self.service.clone(), pool.channels(), store.clone())
            .with_policy(self.config.policy.clone())
            .with_options(self.config.options);
        let mut dispatch_task = dispatcher.spawn(locations.clone());

        let aggregator = Aggregator::new(store.clone(), locations.len(), self.config.poll_interval);

        // Consume in the foreground while watching the dispatcher, so a failed
        // dispatch ends the run instead of leaving the consumer waiting for
        // results that will never arrive.
        let mut dispatched: Option<Result<DispatchReport>> = None;
        let consumed: Result<AggregateSummary> = {
            let consume = aggregator.run(&mut report);
            tokio::pin!(consume);

            loop {
                tokio::select! {
                    result = &mut consume => break result,
                    joined = &mut dispatch_task, if dispatched.is_none() => {
                        match flatten_join(joined) {
                            Ok(report) => dispatched = Some(Ok(report)),
                            Err(e) => break Err(e),
                        }
                    }
                }
            }
        };

        let dispatched = match dispatched {
            Some(result) => Some(result),
            None if dispatch_task.is_finished() && consumed.is_err() => None,
            None => {
                if consumed.is_err() {
                    dispatch_task.abort();
                }
                Some(flatten_join(dispatch_task.await))
            }
        };

        let close_failures = pool.close_all().await;

        let summary = consumed?;
        let dispatch = match dispatched {
            Some(result) => result?,
            None => {
                return Err(RouterError::DispatcherPanicked(
                    "dispatcher result lost".to_string(),
                ))
            }
        };

        let stats = demux.stats();
        if demux.in_flight_drains() > 0 {
            warn!(
                drains = demux.in_flight_drains(),
                "Drains still running after all results were printed"
            );
        }

        Ok(RunSummary {
            locations: locations.len(),
            submitted: dispatch.submissions.len(),
            consumed: summary.consumed,
            empty: summary.empty,
            rows: summary.rows,
            capacity_rejections: dispatch.capacity_rejections,
            notifications: stats.received,
            duplicate_notifications: stats.duplicates,
            page_failures: stats.page_failures,
            close_failures,
        })
    }
}

fn flatten_join(
    joined: std::result::Result<Result<DispatchReport>, JoinError>,
) -> Result<DispatchReport> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(RouterError::DispatcherPanicked(e.to_string())),
        Err(e) => Err(RouterError::DispatcherPanicked(format!("dispatcher cancelled: {}", e))),
    }
}
