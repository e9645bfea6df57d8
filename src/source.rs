use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::Mutex;

use log::debug;
use polars::prelude::*;

use crate::error::DashError;
use crate::model::{country_set, raw_date_labels, RawTables};
use crate::schema::{raw, sources};

/// The data source collaborator: returns the three raw tables.
///
/// Implementations are expected to memoize for the session, so one dashboard
/// render per call does not mean one fetch per call.
pub trait DataSource {
    fn load_raw(&self) -> Result<RawTables, DashError>;
}

/// Fetches the three wide-format CSVs over HTTP and validates their shape.
///
/// The parsed tables are cached for the lifetime of the source; the cache key
/// is the identity of the URL triple the value itself carries, so there is no
/// invalidation within a session.
pub struct CsvUrlSource {
    confirmed_url: String,
    deaths_url: String,
    recovered_url: String,
    cache: Mutex<Option<RawTables>>,
}

impl CsvUrlSource {
    pub fn new(confirmed_url: String, deaths_url: String, recovered_url: String) -> Self {
        Self {
            confirmed_url,
            deaths_url,
            recovered_url,
            cache: Mutex::new(None),
        }
    }

    /// Source pointed at the public JHU CSSE time-series CSVs.
    pub fn jhu() -> Self {
        Self::new(
            sources::CONFIRMED.to_string(),
            sources::DEATHS.to_string(),
            sources::RECOVERED.to_string(),
        )
    }

    fn fetch_table(&self, url: &str, name: &str) -> Result<DataFrame, DashError> {
        debug!("fetching {name} table from {url}");
        let response = reqwest::blocking::get(url)?.error_for_status()?;
        let bytes = response.bytes()?.to_vec();
        let df = read_csv_bytes(bytes)?;
        debug!("{name}: {} rows x {} columns", df.height(), df.width());
        validate_table(&df, name)?;
        Ok(df)
    }
}

impl DataSource for CsvUrlSource {
    fn load_raw(&self) -> Result<RawTables, DashError> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(tables) = cache.as_ref() {
            debug!("returning cached raw tables");
            return Ok(tables.clone());
        }

        let tables = RawTables {
            confirmed: self.fetch_table(&self.confirmed_url, "confirmed")?,
            deaths: self.fetch_table(&self.deaths_url, "deaths")?,
            recovered: self.fetch_table(&self.recovered_url, "recovered")?,
        };
        validate_alignment(&tables)?;

        *cache = Some(tables.clone());
        Ok(tables)
    }
}

/// Read a CSV with all columns as String dtype and trimmed column names.
pub fn read_csv_bytes(bytes: Vec<u8>) -> Result<DataFrame, DashError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

/// Fail-fast shape check for one raw table.
///
/// "Unusable" means: missing identifier columns, zero rows, or no date
/// columns after the identifier block.
fn validate_table(df: &DataFrame, name: &str) -> Result<(), DashError> {
    for col_name in raw::IDENTIFIERS {
        if df.column(col_name).is_err() {
            return Err(DashError::DataUnavailable(format!(
                "{name} table is missing identifier column '{col_name}'"
            )));
        }
    }
    if df.height() == 0 {
        return Err(DashError::DataUnavailable(format!(
            "{name} table has no rows"
        )));
    }
    if raw_date_labels(df).is_empty() {
        return Err(DashError::DataUnavailable(format!(
            "{name} table has no date columns"
        )));
    }
    Ok(())
}

/// The three tables must share date columns and country identifiers, or
/// downstream joins on country would silently produce partial rows.
fn validate_alignment(tables: &RawTables) -> Result<(), DashError> {
    let labels = raw_date_labels(&tables.confirmed);
    if raw_date_labels(&tables.deaths) != labels || raw_date_labels(&tables.recovered) != labels {
        return Err(DashError::DataUnavailable(
            "date columns are not aligned across the three tables".to_string(),
        ));
    }

    let countries: BTreeSet<String> = country_set(&tables.confirmed)?;
    if country_set(&tables.deaths)? != countries || country_set(&tables.recovered)? != countries {
        return Err(DashError::DataUnavailable(
            "country names are not consistent across the three tables".to_string(),
        ));
    }
    Ok(())
}
