//! ResultStore - Shared table of finished requests
//!
//! Written by drain tasks running on behalf of service notifications, read and
//! emptied by the single report consumer. Each correlation id moves through
//! `Submitted -> Draining -> Recorded -> Consumed`; the first recorded outcome
//! for an id wins and a consumed id is never accepted again.

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Notify;
use wx_common::{CorrelationId, WeatherRecord};

/// Everything drained for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Records in the order their pages were drained
    Records(Vec<WeatherRecord>),
    /// The request finished with no records
    Empty,
}

impl RequestOutcome {
    pub fn from_records(records: Vec<WeatherRecord>) -> Self {
        if records.is_empty() {
            RequestOutcome::Empty
        } else {
            RequestOutcome::Records(records)
        }
    }

    pub fn records(&self) -> &[WeatherRecord] {
        match self {
            RequestOutcome::Records(records) => records,
            RequestOutcome::Empty => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RequestOutcome::Empty)
    }
}

/// Lifecycle position of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestState {
    Submitted,
    Draining,
    Recorded,
    Consumed,
}

#[derive(Default)]
struct StoreInner {
    submitted: HashSet<CorrelationId>,
    draining: HashSet<CorrelationId>,
    ready: IndexMap<CorrelationId, RequestOutcome>,
    consumed: HashSet<CorrelationId>,
}

impl StoreInner {
    fn state(&self, id: &CorrelationId) -> Option<RequestState> {
        if self.consumed.contains(id) {
            Some(RequestState::Consumed)
        } else if self.ready.contains_key(id) {
            Some(RequestState::Recorded)
        } else if self.draining.contains(id) {
            Some(RequestState::Draining)
        } else if self.submitted.contains(id) {
            Some(RequestState::Submitted)
        } else {
            None
        }
    }
}

#[derive(Default)]
pub struct ResultStore {
    inner: Mutex<StoreInner>,
    arrivals: Notify,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note an accepted submission.
    ///
    /// The notification for a request can beat the dispatcher here, so this
    /// never moves an id backwards.
    pub fn mark_submitted(&self, id: CorrelationId) {
        let mut inner = self.inner.lock();
        if inner.state(&id).is_none() {
            inner.submitted.insert(id);
        }
    }

    /// Claim the right to drain `id`.
    ///
    /// Returns false when the id is already being drained, recorded or
    /// consumed; the caller must then skip the drain.
    pub fn begin_drain(&self, id: CorrelationId) -> bool {
        let mut inner = self.inner.lock();
        match inner.state(&id) {
            None | Some(RequestState::Submitted) => {
                inner.submitted.remove(&id);
                inner.draining.insert(id);
                true
            }
            Some(_) => false,
        }
    }

    /// Store the outcome for `id`. Only the first write is accepted.
    pub fn record(&self, id: CorrelationId, outcome: RequestOutcome) -> bool {
        {
            let mut inner = self.inner.lock();
            if matches!(
                inner.state(&id),
                Some(RequestState::Recorded | RequestState::Consumed)
            ) {
                return false;
            }
            inner.submitted.remove(&id);
            inner.draining.remove(&id);
            inner.ready.insert(id, outcome);
        }
        self.arrivals.notify_one();
        true
    }

    /// Remove and return every recorded outcome, in arrival order
    pub fn take_ready(&self) -> Vec<(CorrelationId, RequestOutcome)> {
        let mut inner = self.inner.lock();
        let ready = std::mem::take(&mut inner.ready);
        inner.consumed.extend(ready.keys().copied());
        ready.into_iter().collect()
    }

    /// Wait until something is recorded or `timeout` elapses
    pub async fn wait_for_results(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.arrivals.notified()).await;
    }

    pub fn state(&self, id: CorrelationId) -> Option<RequestState> {
        self.inner.lock().state(&id)
    }

    pub fn consumed_count(&self) -> usize {
        self.inner.lock().consumed.len()
    }

    /// Requests recorded but not yet taken
    pub fn ready_count(&self) -> usize {
        self.inner.lock().ready.len()
    }

    /// Requests submitted or draining that have not been recorded
    pub fn pending_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.submitted.len() + inner.draining.len()
    }
}
