//! PageDrainer - Pulls every result page for one request
//!
//! Retrieval failures end the drain but are not returned as errors: the drain
//! runs on behalf of a notification and nobody upstream can act on them. The
//! records gathered before the failure are kept.

use std::sync::Arc;
use tracing::{debug, warn};
use wx_common::{ChannelHandle, CorrelationId, WeatherRecord};
use wx_service::{ServiceError, WeatherService};

use crate::router_metrics;
use crate::store::RequestOutcome;

/// Result of draining one request
#[derive(Debug)]
pub struct Drained {
    pub outcome: RequestOutcome,
    /// Pages successfully retrieved
    pub pages: u32,
    /// Error that cut the drain short, if any
    pub failure: Option<ServiceError>,
}

impl Drained {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct PageDrainer {
    service: Arc<dyn WeatherService>,
}

impl PageDrainer {
    pub fn new(service: Arc<dyn WeatherService>) -> Self {
        Self { service }
    }

    /// Retrieve pages until the service reports no more data or a call fails
    pub async fn drain(&self, channel: ChannelHandle, request_id: CorrelationId) -> Drained {
        let mut records: Vec<WeatherRecord> = Vec::new();
        let mut pages = 0u32;

        let failure = loop {
            match self.service.next_result_page(channel, request_id).await {
                Ok(page) => {
                    pages += 1;
                    router_metrics::record_page_fetched(page.records.len());
                    records.extend(page.records);
                    if !page.has_more {
                        break None;
                    }
                }
                Err(e) => {
                    warn!(
                        channel = %channel,
                        request_id = %request_id,
                        pages,
                        kept_records = records.len(),
                        error = %e,
                        "Page retrieval failed, keeping partial result"
                    );
                    router_metrics::record_page_failure(e.kind());
                    break Some(e);
                }
            }
        };

        debug!(
            channel = %channel,
            request_id = %request_id,
            pages,
            records = records.len(),
            "Drain finished"
        );

        Drained {
            outcome: RequestOutcome::from_records(records),
            pages,
            failure,
        }
    }
}
