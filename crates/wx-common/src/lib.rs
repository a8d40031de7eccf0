use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod logging;

// ============================================================================
// Channel and Request Identity
// ============================================================================

/// Opaque handle to one open communication session with the weather service.
///
/// Handles are issued by the service; the local side never interprets the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelHandle(pub u64);

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Correlation token assigned by the service when a request is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Weather Data
// ============================================================================

/// A single weather observation row returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    pub station_city: String,
    pub date: NaiveDate,
    pub temperature_avg: i32,
}

impl WeatherRecord {
    pub fn new(station_city: impl Into<String>, date: NaiveDate, temperature_avg: i32) -> Self {
        Self {
            station_city: station_city.into(),
            date,
            temperature_avg,
        }
    }
}

/// One batch of records from a single page retrieval call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    pub records: Vec<WeatherRecord>,
    /// True when another call will yield more records for the same request
    pub has_more: bool,
}

impl ResultPage {
    pub fn new(records: Vec<WeatherRecord>, has_more: bool) -> Self {
        Self { records, has_more }
    }
}

/// Optional filters passed along with a weather request.
///
/// Both bounds are inclusive. `RequestOptions::default()` requests every date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RequestOptions {
    pub fn matches(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Kinds of notifications the service can deliver on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    WeatherInfoReady,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::WeatherInfoReady => write!(f, "WeatherInfoReady"),
        }
    }
}

/// Payload of a `WeatherInfoReady` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherInfoReady {
    pub channel: ChannelHandle,
    pub request_id: CorrelationId,
}
