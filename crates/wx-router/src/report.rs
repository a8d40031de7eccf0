//! Fixed-width report output
//!
//! ```text
//!             Location |       Date | Temperature
//! ---------------------+------------+------------
//!               Alpena |   1/3/2016 |          27
//! ```

use chrono::format::{Item, StrftimeItems};
use std::io::Write;
use wx_common::WeatherRecord;

use crate::error::RouterError;
use crate::store::RequestOutcome;
use crate::Result;

pub const LOCATION_WIDTH: usize = 20;
pub const DATE_WIDTH: usize = 10;
pub const TEMPERATURE_WIDTH: usize = 11;

/// US short date, e.g. `1/3/2016`
pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

pub fn header_line() -> String {
    format!(
        "{:>lw$} | {:>dw$} | {:>tw$}",
        "Location",
        "Date",
        "Temperature",
        lw = LOCATION_WIDTH,
        dw = DATE_WIDTH,
        tw = TEMPERATURE_WIDTH
    )
}

pub fn separator_line() -> String {
    format!(
        "{}-+-{}-+-{}",
        "-".repeat(LOCATION_WIDTH),
        "-".repeat(DATE_WIDTH),
        "-".repeat(TEMPERATURE_WIDTH)
    )
}

/// Format one record. `date_format` must already be validated.
pub fn format_row(record: &WeatherRecord, date_format: &str) -> String {
    format!(
        "{:>lw$} | {:>dw$} | {:>tw$}",
        record.station_city,
        record.date.format(date_format).to_string(),
        record.temperature_avg,
        lw = LOCATION_WIDTH,
        dw = DATE_WIDTH,
        tw = TEMPERATURE_WIDTH
    )
}

fn validate_date_format(date_format: &str) -> Result<()> {
    if StrftimeItems::new(date_format).any(|item| matches!(item, Item::Error)) {
        return Err(RouterError::Config(format!(
            "invalid date format: {:?}",
            date_format
        )));
    }
    Ok(())
}

/// Writes report lines to any `Write` sink
pub struct ReportWriter<W: Write> {
    out: W,
    date_format: String,
    rows: usize,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            rows: 0,
        }
    }

    pub fn with_date_format(out: W, date_format: &str) -> Result<Self> {
        validate_date_format(date_format)?;
        Ok(Self {
            out,
            date_format: date_format.to_string(),
            rows: 0,
        })
    }

    pub fn write_header(&mut self) -> Result<()> {
        writeln!(self.out, "{}", header_line())?;
        writeln!(self.out, "{}", separator_line())?;
        Ok(())
    }

    pub fn write_record(&mut self, record: &WeatherRecord) -> Result<()> {
        writeln!(self.out, "{}", format_row(record, &self.date_format))?;
        self.rows += 1;
        Ok(())
    }

    /// Write every record of one request. Returns the number of rows written.
    pub fn write_outcome(&mut self, outcome: &RequestOutcome) -> Result<usize> {
        for record in outcome.records() {
            self.write_record(record)?;
        }
        Ok(outcome.records().len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Data rows written so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
