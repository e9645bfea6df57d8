/// Dashboard materialization: turns the three raw tables into the fixed set
/// of chart payloads the rendering layer consumes.
///
/// Rendering itself stays outside the crate behind `ChartSink`; this module
/// only shapes the data (a named series plus its date index for line charts,
/// a scalar for the headline metric, ranked tables with explicit
/// x/y/size/color/text field bindings for bar and scatter charts).
use chrono::NaiveDate;
use polars::prelude::*;

use crate::aggregation::{
    aggregate_by_country, compute_rates, global_trend, metrics_frame, to_time_series, top_n,
};
use crate::error::DashError;
use crate::model::{MetricsRow, RawTables};
use crate::schema::metrics;
use crate::source::DataSource;

// ── Chart specifications ────────────────────────────────────────────────────

/// A single named series over the date axis.
#[derive(Debug, Clone)]
pub struct LineSpec {
    pub title: String,
    pub series: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankedKind {
    Bar,
    HorizontalBar,
    Scatter,
}

/// A ranked table with explicit field bindings.
///
/// `y` holds more than one column for grouped bars; `size`, `color` and
/// `text` bind optional visual channels by column name.
#[derive(Debug, Clone)]
pub struct RankedSpec {
    pub title: String,
    pub kind: RankedKind,
    pub x: String,
    pub y: Vec<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub text: Option<String>,
}

/// One fully-materialized chart payload.
#[derive(Debug, Clone)]
pub enum Chart {
    Line {
        spec: LineSpec,
        dates: Vec<NaiveDate>,
        values: Vec<i64>,
    },
    Headline {
        label: String,
        value: i64,
    },
    Ranked {
        spec: RankedSpec,
        table: DataFrame,
    },
}

impl Chart {
    pub fn title(&self) -> &str {
        match self {
            Chart::Line { spec, .. } => &spec.title,
            Chart::Headline { label, .. } => label,
            Chart::Ranked { spec, .. } => &spec.title,
        }
    }
}

/// The chart sink collaborator: consumes one materialized chart.
pub trait ChartSink {
    fn render(&mut self, chart: &Chart) -> Result<(), DashError>;
}

// ── Dashboard materialization ───────────────────────────────────────────────

/// Build the full fixed chart set for one selected country.
///
/// The whole vector is built before anything is emitted, so a failing
/// transform aborts the render with no partial dashboard.
pub fn build_dashboard(tables: &RawTables, country: &str) -> Result<Vec<Chart>, DashError> {
    let confirmed = aggregate_by_country(&tables.confirmed)?;
    let deaths = aggregate_by_country(&tables.deaths)?;
    let recovered = aggregate_by_country(&tables.recovered)?;

    let view = to_time_series(&confirmed)?;
    let series = view
        .series(country)
        .map_err(|_| DashError::Validation(format!("unknown country: {country}")))?;
    let latest = *series
        .last()
        .ok_or_else(|| DashError::DataUnavailable("confirmed table has no dates".to_string()))?;

    let trend = global_trend(&view)?;
    let (trend_dates, trend_values): (Vec<NaiveDate>, Vec<i64>) = trend.into_iter().unzip();

    let rows = compute_rates(&confirmed, &deaths, &recovered)?;
    let top10: Vec<MetricsRow> = rows.iter().take(10).cloned().collect();
    let top5 = top_n(&confirmed, 5)?;

    let charts = vec![
        Chart::Line {
            spec: LineSpec {
                title: format!("{country} - Confirmed Cases Over Time"),
                series: country.to_string(),
            },
            dates: view.dates().to_vec(),
            values: series,
        },
        Chart::Headline {
            label: "Total Confirmed Cases".to_string(),
            value: latest,
        },
        Chart::Line {
            spec: LineSpec {
                title: "Global Confirmed Cases Over Time".to_string(),
                series: "Global".to_string(),
            },
            dates: trend_dates,
            values: trend_values,
        },
        Chart::Ranked {
            spec: RankedSpec {
                title: "Top 5 Countries - Confirmed Cases".to_string(),
                kind: RankedKind::HorizontalBar,
                x: metrics::CONFIRMED.to_string(),
                y: vec![metrics::COUNTRY.to_string()],
                size: None,
                color: None,
                text: None,
            },
            table: single_value_frame(&top5, metrics::CONFIRMED)?,
        },
        Chart::Ranked {
            spec: RankedSpec {
                title: "Top 10 Countries: Cases vs Deaths".to_string(),
                kind: RankedKind::Bar,
                x: metrics::COUNTRY.to_string(),
                y: vec![metrics::CONFIRMED.to_string(), metrics::DEATHS.to_string()],
                size: None,
                color: None,
                text: None,
            },
            table: counts_frame(&top10)?,
        },
        Chart::Ranked {
            spec: RankedSpec {
                title: "Confirmed vs Deaths".to_string(),
                kind: RankedKind::Scatter,
                x: metrics::CONFIRMED.to_string(),
                y: vec![metrics::DEATHS.to_string()],
                size: None,
                color: None,
                text: None,
            },
            table: counts_frame(&rows)?,
        },
        Chart::Ranked {
            spec: RankedSpec {
                title: "Top 10 Countries - Confirmed COVID-19 Cases".to_string(),
                kind: RankedKind::Bar,
                x: metrics::COUNTRY.to_string(),
                y: vec![metrics::CONFIRMED.to_string()],
                size: None,
                color: Some(metrics::COUNTRY.to_string()),
                text: Some(metrics::CONFIRMED.to_string()),
            },
            table: metrics_frame(&top10)?,
        },
        Chart::Ranked {
            spec: RankedSpec {
                title: "Death vs Recovery Rate (Top 10 Countries)".to_string(),
                kind: RankedKind::Scatter,
                x: metrics::RECOVERY_RATE.to_string(),
                y: vec![metrics::DEATH_RATE.to_string()],
                size: Some(metrics::CONFIRMED.to_string()),
                color: Some(metrics::COUNTRY.to_string()),
                text: None,
            },
            table: metrics_frame(&top10)?,
        },
    ];

    Ok(charts)
}

/// Load through the source, build the chart set, then hand every chart to
/// the sink in order.
pub fn render_dashboard(
    source: &dyn DataSource,
    sink: &mut dyn ChartSink,
    country: &str,
) -> Result<(), DashError> {
    let tables = source.load_raw()?;
    let charts = build_dashboard(&tables, country)?;
    for chart in &charts {
        sink.render(chart)?;
    }
    Ok(())
}

// ── Table builders ──────────────────────────────────────────────────────────

fn single_value_frame(
    entries: &[(String, i64)],
    value_name: &str,
) -> Result<DataFrame, DashError> {
    let countries: Vec<&str> = entries.iter().map(|(c, _)| c.as_str()).collect();
    let values: Vec<i64> = entries.iter().map(|(_, v)| *v).collect();
    Ok(DataFrame::new(vec![
        Column::new(metrics::COUNTRY.into(), countries),
        Column::new(value_name.into(), values),
    ])?)
}

fn counts_frame(rows: &[MetricsRow]) -> Result<DataFrame, DashError> {
    let countries: Vec<&str> = rows.iter().map(|r| r.country.as_str()).collect();
    let confirmed: Vec<i64> = rows.iter().map(|r| r.confirmed).collect();
    let deaths: Vec<i64> = rows.iter().map(|r| r.deaths).collect();
    Ok(DataFrame::new(vec![
        Column::new(metrics::COUNTRY.into(), countries),
        Column::new(metrics::CONFIRMED.into(), confirmed),
        Column::new(metrics::DEATHS.into(), deaths),
    ])?)
}
