//! NotificationDemux - Single entry point for data-ready notifications
//!
//! The service invokes the callback from its own execution context, possibly
//! for several channels at once. Each invocation claims the correlation id in
//! the [`ResultStore`], drains it on the runtime captured at construction, and
//! writes the outcome exactly once. Repeat notifications for an id that is
//! already draining, recorded or consumed are dropped.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, info_span, warn, Instrument};
use wx_common::{NotificationKind, WeatherInfoReady};
use wx_service::{NotificationCallback, ServiceError, WeatherService};

use crate::drainer::{Drained, PageDrainer};
use crate::error::RouterError;
use crate::router_metrics;
use crate::store::{RequestOutcome, ResultStore};
use crate::Result;

/// Counters describing notification traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationStats {
    pub received: u64,
    pub duplicates: u64,
    pub page_failures: u64,
}

pub struct NotificationDemux {
    drainer: PageDrainer,
    store: Arc<ResultStore>,
    runtime: Handle,
    active_drains: AtomicUsize,
    received: AtomicU64,
    duplicates: AtomicU64,
    page_failures: AtomicU64,
}

impl NotificationDemux {
    /// Build a demultiplexer bound to the current tokio runtime
    pub fn new(service: Arc<dyn WeatherService>, store: Arc<ResultStore>) -> Result<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|e| {
            RouterError::Config(format!("notification demux needs a tokio runtime: {}", e))
        })?;
        Ok(Self::with_runtime(service, store, runtime))
    }

    pub fn with_runtime(
        service: Arc<dyn WeatherService>,
        store: Arc<ResultStore>,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new(Self {
            drainer: PageDrainer::new(service),
            store,
            runtime,
            active_drains: AtomicUsize::new(0),
            received: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            page_failures: AtomicU64::new(0),
        })
    }

    /// The callback to register on every channel
    pub fn callback(self: &Arc<Self>) -> NotificationCallback {
        let demux = Arc::clone(self);
        Arc::new(move |kind, ready| {
            demux.on_notification(kind, ready);
        })
    }

    /// Handle one notification. Returns true if a drain was started.
    pub fn on_notification(self: &Arc<Self>, kind: NotificationKind, ready: WeatherInfoReady) -> bool {
        self.received.fetch_add(1, Ordering::SeqCst);

        match kind {
            NotificationKind::WeatherInfoReady => {}
        }

        if !self.store.begin_drain(ready.request_id) {
            self.duplicates.fetch_add(1, Ordering::SeqCst);
            router_metrics::record_notification(true);
            debug!(
                channel = %ready.channel,
                request_id = %ready.request_id,
                state = ?self.store.state(ready.request_id),
                "Ignoring repeated notification"
            );
            return false;
        }
        router_metrics::record_notification(false);

        self.active_drains.fetch_add(1, Ordering::SeqCst);
        let demux = Arc::clone(self);
        let span = info_span!("drain", channel = %ready.channel, request_id = %ready.request_id);

        self.runtime.spawn(
            async move {
                // A panic inside the drain must still end in a recorded result
                let drain = {
                    let demux = Arc::clone(&demux);
                    tokio::spawn(
                        async move { demux.drainer.drain(ready.channel, ready.request_id).await }
                            .in_current_span(),
                    )
                };
                let drained = match drain.await {
                    Ok(drained) => drained,
                    Err(e) => {
                        error!(error = %e, "Drain task failed, recording an empty result");
                        Drained {
                            outcome: RequestOutcome::Empty,
                            pages: 0,
                            failure: Some(ServiceError::Unavailable(format!("drain task failed: {}", e))),
                        }
                    }
                };
                if !drained.is_complete() {
                    demux.page_failures.fetch_add(1, Ordering::SeqCst);
                }

                let rows = drained.outcome.records().len();
                if demux.store.record(ready.request_id, drained.outcome) {
                    debug!(rows, pages = drained.pages, "Result recorded");
                } else {
                    warn!("Result already recorded; discarding drained data");
                }
                demux.active_drains.fetch_sub(1, Ordering::SeqCst);
            }
            .instrument(span),
        );

        true
    }

    /// Drains currently running
    pub fn in_flight_drains(&self) -> usize {
        self.active_drains.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            received: self.received.load(Ordering::SeqCst),
            duplicates: self.duplicates.load(Ordering::SeqCst),
            page_failures: self.page_failures.load(Ordering::SeqCst),
        }
    }
}
