//! WX Report Router
//!
//! Dispatches one weather request per location over a small fixed pool of
//! service channels and gathers the asynchronous, paginated responses into a
//! report:
//! - ChannelPool: all-or-nothing open of the fixed channel set, tolerant close
//! - Dispatcher: priority-order submission with capacity backoff
//! - NotificationDemux: shared data-ready callback, one drain per request
//! - PageDrainer: pulls every page of a request, absorbing retrieval errors
//! - ResultStore: per-request state and the table of finished results
//! - Aggregator: polling consumer that prints results and counts completion
//! - ReportRunner: the end-to-end entry point with a process status

pub mod error;
pub mod pool;
pub mod dispatcher;
pub mod demux;
pub mod drainer;
pub mod store;
pub mod aggregator;
pub mod report;
pub mod runner;
pub mod router_metrics;

pub use error::RouterError;
pub use pool::ChannelPool;
pub use dispatcher::{Dispatcher, DispatchPolicy, DispatchReport, Submission};
pub use demux::{NotificationDemux, NotificationStats};
pub use drainer::{Drained, PageDrainer};
pub use store::{RequestOutcome, RequestState, ResultStore};
pub use aggregator::{AggregateSummary, Aggregator};
pub use report::ReportWriter;
pub use runner::{ReportRunner, RunSummary, RunnerConfig};

pub type Result<T> = std::result::Result<T, RouterError>;
