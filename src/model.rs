use std::collections::BTreeSet;

use chrono::NaiveDate;
use log::info;
use polars::prelude::*;

use crate::aggregation;
use crate::error::DashError;
use crate::schema::{raw, timeseries};
use crate::source::DataSource;

/// The three raw wide-format tables, one per metric.
///
/// Each table: identifier columns (Province/State, Country/Region, Lat, Long)
/// followed by one column per calendar day, cells = cumulative counts.
#[derive(Debug, Clone)]
pub struct RawTables {
    pub confirmed: DataFrame,
    pub deaths: DataFrame,
    pub recovered: DataFrame,
}

/// Column labels that are not identifier columns, in source (chronological) order.
pub(crate) fn raw_date_labels(frame: &DataFrame) -> Vec<String> {
    frame
        .get_column_names_str()
        .iter()
        .filter(|c| !raw::IDENTIFIERS.contains(c))
        .map(|c| c.to_string())
        .collect()
}

/// Distinct country names in a raw table.
pub(crate) fn country_set(frame: &DataFrame) -> Result<BTreeSet<String>, DashError> {
    let countries = frame.column(raw::COUNTRY)?.str()?;
    Ok(countries
        .into_iter()
        .map(|v| v.unwrap_or("").to_string())
        .collect())
}

// ── Country aggregate ───────────────────────────────────────────────────────

/// One row per distinct country; Country/Region column plus the unchanged
/// date columns, values = element-wise sums of all subdivision rows.
/// Row order is the order of first appearance in the raw table.
#[derive(Debug, Clone)]
pub struct CountryAggregate {
    frame: DataFrame,
}

impl CountryAggregate {
    pub(crate) fn from_frame(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Country names in row order.
    pub fn countries(&self) -> Result<Vec<String>, DashError> {
        let countries = self.frame.column(raw::COUNTRY)?.str()?;
        Ok(countries
            .into_iter()
            .map(|v| v.unwrap_or("").to_string())
            .collect())
    }

    /// Date column labels in source (chronological) order.
    pub fn date_labels(&self) -> Vec<String> {
        self.frame
            .get_column_names_str()
            .iter()
            .copied()
            .filter(|c| *c != raw::COUNTRY)
            .map(|c| c.to_string())
            .collect()
    }

    /// Latest cumulative value per country, aligned with `countries()`.
    pub fn latest_totals(&self) -> Result<Vec<i64>, DashError> {
        let labels = self.date_labels();
        let last = labels
            .last()
            .ok_or_else(|| DashError::Validation("aggregate has no date columns".into()))?;
        let values = self.frame.column(last)?.i64()?;
        Ok((0..self.frame.height())
            .map(|i| values.get(i).unwrap_or(0))
            .collect())
    }
}

// ── Time series view ────────────────────────────────────────────────────────

/// Country aggregate transposed: a parsed date axis plus one value column
/// per country, date-ascending in source column order.
#[derive(Debug, Clone)]
pub struct TimeSeriesView {
    dates: Vec<NaiveDate>,
    frame: DataFrame,
}

impl TimeSeriesView {
    pub(crate) fn new(dates: Vec<NaiveDate>, frame: DataFrame) -> Self {
        Self { dates, frame }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Series keys (country names) in aggregate row order.
    pub fn countries(&self) -> Vec<String> {
        self.frame
            .get_column_names_str()
            .iter()
            .copied()
            .filter(|c| *c != timeseries::DATE)
            .map(|c| c.to_string())
            .collect()
    }

    /// One country's cumulative series, aligned with `dates()`.
    pub fn series(&self, country: &str) -> Result<Vec<i64>, DashError> {
        let values = self
            .frame
            .column(country)
            .map_err(|_| DashError::MissingColumn(country.to_string()))?
            .i64()?;
        Ok((0..self.dates.len())
            .map(|i| values.get(i).unwrap_or(0))
            .collect())
    }
}

// ── Metrics row ─────────────────────────────────────────────────────────────

/// Per-country totals at the latest date plus derived rates.
///
/// Rates are percentages of the confirmed total; `None` when confirmed is
/// zero (the rate is undefined, never 0 and never a division by zero).
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub country: String,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub death_rate: Option<f64>,
    pub recovery_rate: Option<f64>,
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// Owns the three raw tables for one session and exposes the derived views.
///
/// All derived entities are read-only and recomputed per call; the engine
/// holds no state beyond the raw tables themselves.
pub struct DashModel {
    tables: RawTables,
}

impl DashModel {
    /// Load the three raw tables through a data source.
    ///
    /// The source is expected to memoize, so repeated loads within a session
    /// do not re-fetch.
    pub fn load(source: &dyn DataSource) -> Result<Self, DashError> {
        let tables = source.load_raw()?;
        info!(
            "loaded raw tables: confirmed {}x{}, deaths {}x{}, recovered {}x{}",
            tables.confirmed.height(),
            tables.confirmed.width(),
            tables.deaths.height(),
            tables.deaths.width(),
            tables.recovered.height(),
            tables.recovered.width(),
        );
        Ok(Self { tables })
    }

    pub fn from_tables(tables: RawTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &RawTables {
        &self.tables
    }

    pub fn confirmed_by_country(&self) -> Result<CountryAggregate, DashError> {
        aggregation::aggregate_by_country(&self.tables.confirmed)
    }

    pub fn deaths_by_country(&self) -> Result<CountryAggregate, DashError> {
        aggregation::aggregate_by_country(&self.tables.deaths)
    }

    pub fn recovered_by_country(&self) -> Result<CountryAggregate, DashError> {
        aggregation::aggregate_by_country(&self.tables.recovered)
    }

    /// Country names for the selector, in aggregate row order.
    pub fn countries(&self) -> Result<Vec<String>, DashError> {
        self.confirmed_by_country()?.countries()
    }

    /// The ranked metrics table, sorted descending by confirmed total.
    pub fn metrics(&self) -> Result<Vec<MetricsRow>, DashError> {
        aggregation::compute_rates(
            &self.confirmed_by_country()?,
            &self.deaths_by_country()?,
            &self.recovered_by_country()?,
        )
    }

    /// The metrics table as a DataFrame with the sink-facing column names.
    pub fn metrics_frame(&self) -> Result<DataFrame, DashError> {
        aggregation::metrics_frame(&self.metrics()?)
    }
}
