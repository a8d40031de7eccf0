//! Weather data served by the simulated service

use chrono::{Duration, NaiveDate};
use indexmap::IndexMap;
use std::path::Path;
use wx_common::WeatherRecord;

use crate::Result;

const BUILTIN_STATIONS: &[(&str, i32)] = &[
    ("Alpena", 24),
    ("Detroit", 29),
    ("Flint", 26),
    ("Grand Rapids", 27),
    ("Houghton Lake", 22),
    ("Lansing", 27),
    ("Marquette", 19),
    ("Muskegon", 28),
    ("Saginaw", 26),
    ("Sault Ste. Marie", 17),
    ("Traverse City", 23),
];

const BUILTIN_WEEKS: i64 = 10;

/// Weather records grouped by station city, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    by_location: IndexMap<String, Vec<WeatherRecord>>,
}

impl Dataset {
    /// Group records by `station_city`, keeping each city's records in input order
    pub fn from_records(records: impl IntoIterator<Item = WeatherRecord>) -> Self {
        let mut by_location: IndexMap<String, Vec<WeatherRecord>> = IndexMap::new();
        for record in records {
            by_location
                .entry(record.station_city.clone())
                .or_default()
                .push(record);
        }
        Self { by_location }
    }

    /// Load a JSON array of weather records
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<WeatherRecord> = serde_json::from_str(&content)?;
        Ok(Self::from_records(records))
    }

    /// Weekly averages for a fixed set of Michigan stations starting 2016-01-03
    pub fn builtin() -> Self {
        let Some(first_week) = NaiveDate::from_ymd_opt(2016, 1, 3) else {
            return Self::default();
        };

        let records = BUILTIN_STATIONS
            .iter()
            .enumerate()
            .flat_map(|(station, &(city, base))| {
                (0..BUILTIN_WEEKS).map(move |week| {
                    let wobble = ((station as i64 * 7 + week * 3) % 9 - 4) as i32;
                    WeatherRecord::new(
                        city,
                        first_week + Duration::weeks(week),
                        base + week as i32 + wobble,
                    )
                })
            });

        Self::from_records(records)
    }

    /// Register a location with no records
    pub fn with_empty_location(mut self, location: impl Into<String>) -> Self {
        self.by_location.entry(location.into()).or_default();
        self
    }

    pub fn locations(&self) -> Vec<String> {
        self.by_location.keys().cloned().collect()
    }

    pub fn records_for(&self, location: &str) -> Option<&[WeatherRecord]> {
        self.by_location.get(location).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.by_location.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_location.is_empty()
    }
}
