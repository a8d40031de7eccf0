//! Metrics for the dispatcher and aggregation pipeline
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use wx_common::ChannelHandle;

/// Record a request accepted by a channel
pub fn record_request_submitted(channel: ChannelHandle) {
    counter!(
        "wx_requests_submitted_total",
        "channel" => channel.to_string()
    )
    .increment(1);
}

/// Record a capacity rejection from a channel
pub fn record_capacity_rejection(channel: ChannelHandle) {
    counter!(
        "wx_capacity_rejections_total",
        "channel" => channel.to_string()
    )
    .increment(1);
}

/// Record a full pass over the pool ending in backoff
pub fn record_dispatch_backoff() {
    counter!("wx_dispatch_backoffs_total").increment(1);
}

/// Record how long it took to get a location accepted
pub fn record_dispatch_latency(duration: Duration) {
    histogram!("wx_dispatch_duration_seconds").record(duration.as_secs_f64());
}

/// Record a data-ready notification, flagging duplicates
pub fn record_notification(duplicate: bool) {
    counter!(
        "wx_notifications_total",
        "duplicate" => duplicate.to_string()
    )
    .increment(1);
}

/// Record a page pulled from the service
pub fn record_page_fetched(record_count: usize) {
    counter!("wx_pages_fetched_total").increment(1);
    counter!("wx_records_fetched_total").increment(record_count as u64);
}

/// Record a failed page retrieval
pub fn record_page_failure(kind: &str) {
    counter!(
        "wx_page_failures_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a result consumed by the report
pub fn record_result_consumed(empty: bool) {
    counter!(
        "wx_results_consumed_total",
        "empty" => empty.to_string()
    )
    .increment(1);
}

/// Update the open channel gauge
pub fn set_open_channels(count: usize) {
    gauge!("wx_open_channels").set(count as f64);
}
