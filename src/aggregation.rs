use std::collections::HashMap;

use chrono::NaiveDate;
use polars::prelude::*;

use crate::error::DashError;
use crate::model::{raw_date_labels, CountryAggregate, MetricsRow, TimeSeriesView};
use crate::schema::{metrics, raw, timeseries};

/// Collapse subdivision rows into per-country totals.
///
/// Drops Province/State, Lat and Long, groups by Country/Region and sums the
/// date columns element-wise. Missing cells count as zero, an explicit
/// policy applied via `fill_null` before summing. A malformed (non-numeric)
/// cell is a table-level error, never a silent zero. Group order is the
/// order of first appearance, which downstream rankings rely on for
/// tie-breaking.
pub fn aggregate_by_country(raw_table: &DataFrame) -> Result<CountryAggregate, DashError> {
    if raw_table.column(raw::COUNTRY).is_err() {
        return Err(DashError::MissingColumn(raw::COUNTRY.to_string()));
    }

    let date_cols = raw_date_labels(raw_table);
    if date_cols.is_empty() {
        return Err(DashError::DataUnavailable(
            "raw table has no date columns".to_string(),
        ));
    }

    // Strict cast: nulls pass through and are filled to zero, anything
    // non-numeric raises instead of vanishing.
    let casts: Vec<Expr> = date_cols
        .iter()
        .map(|c| col(c.as_str()).strict_cast(DataType::Int64).fill_null(lit(0)))
        .collect();
    let sums: Vec<Expr> = date_cols.iter().map(|c| col(c.as_str()).sum()).collect();

    let frame = raw_table
        .clone()
        .lazy()
        .with_columns(casts)
        .group_by_stable([col(raw::COUNTRY)])
        .agg(sums)
        .collect()
        .map_err(|e| DashError::DataUnavailable(format!("raw table has unusable cells: {e}")))?;

    Ok(CountryAggregate::from_frame(frame))
}

/// Transpose a country aggregate so date is the primary axis.
///
/// Every date label must parse with %m/%d/%y; a non-conforming label aborts
/// with a DateParse error rather than silently dropping the column.
pub fn to_time_series(agg: &CountryAggregate) -> Result<TimeSeriesView, DashError> {
    let labels = agg.date_labels();

    let mut dates = Vec::with_capacity(labels.len());
    for label in &labels {
        let date = NaiveDate::parse_from_str(label, raw::DATE_FORMAT)
            .map_err(|_| DashError::DateParse(label.clone()))?;
        dates.push(date);
    }

    let countries = agg.countries()?;
    let mut series: Vec<Vec<i64>> = vec![Vec::with_capacity(labels.len()); countries.len()];
    for label in &labels {
        let values = agg.frame().column(label)?.i64()?;
        for (row, country_series) in series.iter_mut().enumerate() {
            country_series.push(values.get(row).unwrap_or(0));
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(countries.len() + 1);
    columns.push(Column::new(timeseries::DATE.into(), dates.clone()));
    for (country, values) in countries.iter().zip(series) {
        columns.push(Column::new(country.as_str().into(), values));
    }
    let frame = DataFrame::new(columns)?;

    Ok(TimeSeriesView::new(dates, frame))
}

/// Per-date sum across all countries, in the view's (chronological) order.
pub fn global_trend(view: &TimeSeriesView) -> Result<Vec<(NaiveDate, i64)>, DashError> {
    let mut totals = vec![0i64; view.dates().len()];
    for country in view.countries() {
        let values = view.frame().column(country.as_str())?.i64()?;
        for (i, total) in totals.iter_mut().enumerate() {
            *total += values.get(i).unwrap_or(0);
        }
    }
    Ok(view.dates().iter().copied().zip(totals).collect())
}

/// The n countries with the largest latest-date value, descending.
///
/// Stable sort: equal values keep their original country order.
pub fn top_n(agg: &CountryAggregate, n: usize) -> Result<Vec<(String, i64)>, DashError> {
    let countries = agg.countries()?;
    let latest = agg.latest_totals()?;

    let mut ranked: Vec<(String, i64)> = countries.into_iter().zip(latest).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);
    Ok(ranked)
}

/// Per-country totals at the latest date plus death and recovery rates.
///
/// Totals are the latest cumulative value per metric (the same convention as
/// `top_n`), not a sum over the date range. A country with zero confirmed
/// cases gets `None` for both rates. Result is sorted descending by
/// confirmed, ties broken by original country order.
pub fn compute_rates(
    confirmed: &CountryAggregate,
    deaths: &CountryAggregate,
    recovered: &CountryAggregate,
) -> Result<Vec<MetricsRow>, DashError> {
    let countries = confirmed.countries()?;
    let confirmed_totals = confirmed.latest_totals()?;

    let deaths_by_country: HashMap<String, i64> = deaths
        .countries()?
        .into_iter()
        .zip(deaths.latest_totals()?)
        .collect();
    let recovered_by_country: HashMap<String, i64> = recovered
        .countries()?
        .into_iter()
        .zip(recovered.latest_totals()?)
        .collect();

    let mut rows = Vec::with_capacity(countries.len());
    for (country, confirmed_total) in countries.into_iter().zip(confirmed_totals) {
        let deaths_total = *deaths_by_country.get(&country).ok_or_else(|| {
            DashError::Validation(format!("country '{country}' missing from deaths table"))
        })?;
        let recovered_total = *recovered_by_country.get(&country).ok_or_else(|| {
            DashError::Validation(format!("country '{country}' missing from recovered table"))
        })?;

        let (death_rate, recovery_rate) = if confirmed_total == 0 {
            (None, None)
        } else {
            (
                Some(deaths_total as f64 / confirmed_total as f64 * 100.0),
                Some(recovered_total as f64 / confirmed_total as f64 * 100.0),
            )
        };

        rows.push(MetricsRow {
            country,
            confirmed: confirmed_total,
            deaths: deaths_total,
            recovered: recovered_total,
            death_rate,
            recovery_rate,
        });
    }

    rows.sort_by(|a, b| b.confirmed.cmp(&a.confirmed));
    Ok(rows)
}

/// Materialize metrics rows as the ranked table the chart sink binds to.
///
/// Column names are exactly: Country/Region, Confirmed, Deaths, Recovered,
/// Death Rate (%), Recovery Rate (%). Rates are nullable Float64.
pub fn metrics_frame(rows: &[MetricsRow]) -> Result<DataFrame, DashError> {
    let countries: Vec<&str> = rows.iter().map(|r| r.country.as_str()).collect();
    let confirmed: Vec<i64> = rows.iter().map(|r| r.confirmed).collect();
    let deaths: Vec<i64> = rows.iter().map(|r| r.deaths).collect();
    let recovered: Vec<i64> = rows.iter().map(|r| r.recovered).collect();
    let death_rates: Vec<Option<f64>> = rows.iter().map(|r| r.death_rate).collect();
    let recovery_rates: Vec<Option<f64>> = rows.iter().map(|r| r.recovery_rate).collect();

    let frame = DataFrame::new(vec![
        Column::new(metrics::COUNTRY.into(), countries),
        Column::new(metrics::CONFIRMED.into(), confirmed),
        Column::new(metrics::DEATHS.into(), deaths),
        Column::new(metrics::RECOVERED.into(), recovered),
        Column::new(metrics::DEATH_RATE.into(), death_rates),
        Column::new(metrics::RECOVERY_RATE.into(), recovery_rates),
    ])?;

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_table(rows: &[(&str, &str, &[i64])], dates: &[&str]) -> DataFrame {
        let provinces: Vec<&str> = rows.iter().map(|r| r.0).collect();
        let countries: Vec<&str> = rows.iter().map(|r| r.1).collect();
        let mut columns = vec![
            Column::new(raw::PROVINCE.into(), provinces),
            Column::new(raw::COUNTRY.into(), countries),
            Column::new(raw::LAT.into(), vec![0.0f64; rows.len()]),
            Column::new(raw::LONG.into(), vec![0.0f64; rows.len()]),
        ];
        for (i, label) in dates.iter().enumerate() {
            let values: Vec<i64> = rows.iter().map(|r| r.2[i]).collect();
            columns.push(Column::new((*label).into(), values));
        }
        DataFrame::new(columns).unwrap()
    }

    fn aggregate(rows: &[(&str, &str, &[i64])], dates: &[&str]) -> CountryAggregate {
        aggregate_by_country(&raw_table(rows, dates)).unwrap()
    }

    #[test]
    fn aggregate_sums_subdivisions_per_country() {
        // Worked example from the dashboard's contract: X_ProvinceA=[10,20],
        // X_ProvinceB=[5,5] => X=[15,25].
        let agg = aggregate(
            &[
                ("ProvinceA", "X", &[10, 20]),
                ("ProvinceB", "X", &[5, 5]),
                ("", "Y", &[3, 10]),
            ],
            &["1/22/20", "1/23/20"],
        );

        assert_eq!(agg.countries().unwrap(), vec!["X", "Y"]);
        assert_eq!(agg.frame().height(), 2);

        let d1 = agg.frame().column("1/22/20").unwrap().i64().unwrap();
        let d2 = agg.frame().column("1/23/20").unwrap().i64().unwrap();
        assert_eq!(d1.get(0), Some(15));
        assert_eq!(d2.get(0), Some(25));
        assert_eq!(d1.get(1), Some(3));
        assert_eq!(d2.get(1), Some(10));
    }

    #[test]
    fn aggregate_treats_missing_cells_as_zero() {
        let frame = DataFrame::new(vec![
            Column::new(raw::PROVINCE.into(), vec!["A", "B"]),
            Column::new(raw::COUNTRY.into(), vec!["X", "X"]),
            Column::new(raw::LAT.into(), vec![0.0f64, 0.0]),
            Column::new(raw::LONG.into(), vec![0.0f64, 0.0]),
            Column::new("1/22/20".into(), vec![Some(7i64), None]),
        ])
        .unwrap();

        let agg = aggregate_by_country(&frame).unwrap();
        let values = agg.frame().column("1/22/20").unwrap().i64().unwrap();
        assert_eq!(values.get(0), Some(7));
    }

    #[test]
    fn aggregate_rejects_malformed_cells() {
        // String-typed cells, as produced by the CSV reader. The bad value
        // must surface as a table-level error, not a silent zero.
        let frame = DataFrame::new(vec![
            Column::new(raw::PROVINCE.into(), vec!["A", "B"]),
            Column::new(raw::COUNTRY.into(), vec!["X", "X"]),
            Column::new(raw::LAT.into(), vec![0.0f64, 0.0]),
            Column::new(raw::LONG.into(), vec![0.0f64, 0.0]),
            Column::new("1/22/20".into(), vec!["7", "not-a-number"]),
        ])
        .unwrap();

        assert!(matches!(
            aggregate_by_country(&frame),
            Err(DashError::DataUnavailable(_))
        ));
    }

    #[test]
    fn aggregate_rejects_table_without_date_columns() {
        let frame = DataFrame::new(vec![
            Column::new(raw::PROVINCE.into(), vec![""]),
            Column::new(raw::COUNTRY.into(), vec!["X"]),
            Column::new(raw::LAT.into(), vec![0.0f64]),
            Column::new(raw::LONG.into(), vec![0.0f64]),
        ])
        .unwrap();

        assert!(matches!(
            aggregate_by_country(&frame),
            Err(DashError::DataUnavailable(_))
        ));
    }

    #[test]
    fn time_series_round_trips_values() {
        let agg = aggregate(
            &[("", "X", &[1, 4]), ("", "Y", &[2, 8])],
            &["1/22/20", "1/23/20"],
        );
        let view = to_time_series(&agg).unwrap();

        assert_eq!(
            view.dates(),
            &[
                NaiveDate::from_ymd_opt(2020, 1, 22).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 23).unwrap(),
            ]
        );

        // Reshaping back per country reproduces the aggregate's rows.
        assert_eq!(view.series("X").unwrap(), vec![1, 4]);
        assert_eq!(view.series("Y").unwrap(), vec![2, 8]);
    }

    #[test]
    fn time_series_rejects_bad_date_label() {
        let agg = aggregate(&[("", "X", &[1])], &["not-a-date"]);
        match to_time_series(&agg) {
            Err(DashError::DateParse(label)) => assert_eq!(label, "not-a-date"),
            other => panic!("expected DateParse, got {other:?}"),
        }
    }

    #[test]
    fn global_trend_sums_all_countries_per_date() {
        let agg = aggregate(
            &[("", "X", &[1, 4]), ("", "Y", &[2, 8])],
            &["1/22/20", "1/23/20"],
        );
        let view = to_time_series(&agg).unwrap();
        let trend = global_trend(&view).unwrap();

        assert_eq!(trend.len(), view.dates().len());
        assert_eq!(trend[0].1, 3);
        assert_eq!(trend[1].1, 12);
        assert_eq!(trend[0].0, NaiveDate::from_ymd_opt(2020, 1, 22).unwrap());
    }

    #[test]
    fn top_n_sorts_descending_and_truncates() {
        let agg = aggregate(
            &[("", "X", &[0, 25]), ("", "Y", &[0, 10]), ("", "Z", &[0, 40])],
            &["1/22/20", "1/23/20"],
        );

        let top = top_n(&agg, 2).unwrap();
        assert_eq!(
            top,
            vec![("Z".to_string(), 40), ("X".to_string(), 25)]
        );

        // n larger than the country count returns them all.
        assert_eq!(top_n(&agg, 10).unwrap().len(), 3);

        // Worked example: top 1 over {X:25, Y:10} is [(X, 25)].
        let small = aggregate(&[("", "X", &[25]), ("", "Y", &[10])], &["1/22/20"]);
        assert_eq!(top_n(&small, 1).unwrap(), vec![("X".to_string(), 25)]);
    }

    #[test]
    fn top_n_breaks_ties_by_original_country_order() {
        let agg = aggregate(
            &[("", "B", &[10]), ("", "A", &[10]), ("", "C", &[10])],
            &["1/22/20"],
        );
        let top = top_n(&agg, 3).unwrap();
        let order: Vec<&str> = top.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn compute_rates_worked_example() {
        // Z: confirmed=100, deaths=5, recovered=50 => rates 5.0 and 50.0.
        let confirmed = aggregate(&[("", "Z", &[100])], &["1/22/20"]);
        let deaths = aggregate(&[("", "Z", &[5])], &["1/22/20"]);
        let recovered = aggregate(&[("", "Z", &[50])], &["1/22/20"]);

        let rows = compute_rates(&confirmed, &deaths, &recovered).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].country, "Z");
        assert_eq!(rows[0].confirmed, 100);
        assert_eq!(rows[0].deaths, 5);
        assert_eq!(rows[0].recovered, 50);
        assert_eq!(rows[0].death_rate, Some(5.0));
        assert_eq!(rows[0].recovery_rate, Some(50.0));
    }

    #[test]
    fn compute_rates_are_none_for_zero_confirmed() {
        let confirmed = aggregate(&[("", "X", &[0]), ("", "Y", &[10])], &["1/22/20"]);
        let deaths = aggregate(&[("", "X", &[0]), ("", "Y", &[1])], &["1/22/20"]);
        let recovered = aggregate(&[("", "X", &[0]), ("", "Y", &[5])], &["1/22/20"]);

        let rows = compute_rates(&confirmed, &deaths, &recovered).unwrap();
        let x = rows.iter().find(|r| r.country == "X").unwrap();
        assert_eq!(x.death_rate, None);
        assert_eq!(x.recovery_rate, None);
    }

    #[test]
    fn compute_rates_sorts_by_confirmed_descending() {
        let confirmed = aggregate(
            &[("", "X", &[10]), ("", "Y", &[30]), ("", "Z", &[20])],
            &["1/22/20"],
        );
        let deaths = aggregate(
            &[("", "X", &[0]), ("", "Y", &[0]), ("", "Z", &[0])],
            &["1/22/20"],
        );
        let recovered = aggregate(
            &[("", "X", &[0]), ("", "Y", &[0]), ("", "Z", &[0])],
            &["1/22/20"],
        );

        let rows = compute_rates(&confirmed, &deaths, &recovered).unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(order, vec!["Y", "Z", "X"]);
    }

    #[test]
    fn compute_rates_rejects_missing_country() {
        let confirmed = aggregate(&[("", "X", &[10])], &["1/22/20"]);
        let deaths = aggregate(&[("", "Other", &[0])], &["1/22/20"]);
        let recovered = aggregate(&[("", "X", &[0])], &["1/22/20"]);

        assert!(matches!(
            compute_rates(&confirmed, &deaths, &recovered),
            Err(DashError::Validation(_))
        ));
    }

    #[test]
    fn metrics_frame_has_exact_sink_columns() {
        let rows = vec![MetricsRow {
            country: "Z".to_string(),
            confirmed: 100,
            deaths: 5,
            recovered: 50,
            death_rate: Some(5.0),
            recovery_rate: Some(50.0),
        }];
        let frame = metrics_frame(&rows).unwrap();
        assert_eq!(frame.get_column_names_str(), metrics::ALL.to_vec());

        let nullable = metrics_frame(&[MetricsRow {
            country: "X".to_string(),
            confirmed: 0,
            deaths: 0,
            recovered: 0,
            death_rate: None,
            recovery_rate: None,
        }])
        .unwrap();
        assert_eq!(
            nullable.column(metrics::DEATH_RATE).unwrap().null_count(),
            1
        );
    }
}
