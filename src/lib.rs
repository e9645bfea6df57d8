//! covid-dashkit: the data reshaping and metrics pipeline behind a COVID-19
//! dashboard.
//!
//! Three public wide-format time-series CSVs (confirmed, deaths, recovered)
//! come in through a [`source::DataSource`]; the pipeline collapses
//! subdivision rows into per-country aggregates and derives time series,
//! global sums, top-N rankings and rate metrics; [`visualization`] shapes
//! those into the fixed chart set a [`visualization::ChartSink`] renders.

pub mod aggregation;
pub mod error;
pub mod model;
pub mod schema;
pub mod source;
pub mod visualization;

pub use error::DashError;
pub use model::{CountryAggregate, DashModel, MetricsRow, RawTables, TimeSeriesView};
pub use source::{CsvUrlSource, DataSource};
pub use visualization::{build_dashboard, render_dashboard, Chart, ChartSink};
