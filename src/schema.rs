/// Column-name constants for covid-dashkit.
/// Single source of truth for every string the pipeline keys on.

// ── Raw table columns ───────────────────────────────────────────────────────
pub mod raw {
    pub const PROVINCE: &str = "Province/State";
    pub const COUNTRY: &str = "Country/Region";
    pub const LAT: &str = "Lat";
    pub const LONG: &str = "Long";

    pub const IDENTIFIERS: [&str; 4] = [PROVINCE, COUNTRY, LAT, LONG];

    /// Header date labels, e.g. "1/22/20".
    pub const DATE_FORMAT: &str = "%m/%d/%y";
}

// ── Metrics table columns ───────────────────────────────────────────────────
pub mod metrics {
    pub const COUNTRY: &str = "Country/Region";
    pub const CONFIRMED: &str = "Confirmed";
    pub const DEATHS: &str = "Deaths";
    pub const RECOVERED: &str = "Recovered";
    pub const DEATH_RATE: &str = "Death Rate (%)";
    pub const RECOVERY_RATE: &str = "Recovery Rate (%)";

    pub const ALL: [&str; 6] = [
        COUNTRY,
        CONFIRMED,
        DEATHS,
        RECOVERED,
        DEATH_RATE,
        RECOVERY_RATE,
    ];
}

// ── Time series columns ─────────────────────────────────────────────────────
pub mod timeseries {
    pub const DATE: &str = "Date";
}

// ── Remote sources ──────────────────────────────────────────────────────────
pub mod sources {
    pub const CONFIRMED: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";
    pub const DEATHS: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_global.csv";
    pub const RECOVERED: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_recovered_global.csv";
}
