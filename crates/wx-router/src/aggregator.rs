//! Aggregator - Foreground consumer of the result store
//!
//! Results are pushed by service notifications whose threads this process
//! does not own, so the consumer polls: take everything recorded so far,
//! print it, then wait for the next arrival or the poll interval, whichever
//! comes first. Completion is detected by counting, since the service sends
//! no "all done" signal.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::report::ReportWriter;
use crate::router_metrics;
use crate::store::ResultStore;
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    /// Requests consumed, empty ones included
    pub consumed: usize,
    /// Requests that finished with no records
    pub empty: usize,
    /// Data rows printed
    pub rows: usize,
}

pub struct Aggregator {
    store: Arc<ResultStore>,
    expected: usize,
    poll_interval: Duration,
}

impl Aggregator {
    pub fn new(store: Arc<ResultStore>, expected: usize, poll_interval: Duration) -> Self {
        Self {
            store,
            expected,
            poll_interval,
        }
    }

    /// Print results as they arrive until `expected` requests are consumed
    pub async fn run<W: Write>(&self, report: &mut ReportWriter<W>) -> Result<AggregateSummary> {
        report.write_header()?;
        report.flush()?;

        let mut summary = AggregateSummary::default();

        while summary.consumed < self.expected {
            let ready = self.store.take_ready();

            for (request_id, outcome) in &ready {
                let rows = report.write_outcome(outcome)?;
                summary.rows += rows;
                summary.consumed += 1;
                if outcome.is_empty() {
                    summary.empty += 1;
                }
                router_metrics::record_result_consumed(outcome.is_empty());
                debug!(
                    request_id = %request_id,
                    rows,
                    consumed = summary.consumed,
                    expected = self.expected,
                    "Result printed"
                );
            }

            if !ready.is_empty() {
                report.flush()?;
            }
            if summary.consumed >= self.expected {
                break;
            }

            self.store.wait_for_results(self.poll_interval).await;
        }

        info!(
            consumed = summary.consumed,
            empty = summary.empty,
            rows = summary.rows,
            "All results printed"
        );
        Ok(summary)
    }
}
