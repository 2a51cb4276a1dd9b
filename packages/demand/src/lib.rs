#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-subscriber traffic demand.
//!
//! Country-level mobile broadband traffic statistics are injected through
//! the [`ReferenceStatistics`] capability (keyed by ISO3 code and year), so
//! new countries or years are a data change rather than a code change.
//! [`estimate`] turns the statistic into the [`DemandFigure`] shared by
//! every sufficiency evaluation of a run.

pub mod itu;

use mobile_capacity_config::NetworkConfig;
use mobile_capacity_models::DemandFigure;

pub use itu::ReferenceTable;

/// Errors that can occur while estimating demand.
#[derive(Debug, thiserror::Error)]
pub enum DemandError {
    /// No traffic statistic exists for the requested country/year.
    #[error("No mobile broadband traffic statistic for {country_code} ({})", describe_year(.year.as_ref()))]
    MissingReferenceData {
        /// Requested ISO3 country code.
        country_code: String,
        /// Requested year, `None` when the latest year was requested.
        year: Option<u16>,
    },

    /// A reference CSV could not be parsed.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },
}

fn describe_year(year: Option<&u16>) -> String {
    year.map_or_else(|| "any year".to_string(), |y| format!("year {y}"))
}

/// Mobile broadband traffic per subscription for one country and year.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficStatistic {
    /// ISO3 country code.
    pub country_code: String,
    /// Year the statistic refers to.
    pub year: u16,
    /// Traffic per subscription per month, in GB.
    pub gb_per_subscription_month: f64,
}

/// Injected source of country reference statistics.
pub trait ReferenceStatistics: Send + Sync {
    /// Statistic for an exact country/year pair.
    fn lookup(&self, country_code: &str, year: u16) -> Option<TrafficStatistic>;

    /// Statistic for the most recent year available for a country.
    fn latest(&self, country_code: &str) -> Option<TrafficStatistic>;
}

/// Computes the run's demand figure for a country.
///
/// Uses `config.reference_year` when set, otherwise the latest year the
/// statistics provide. The per-capita volume scales the per-subscriber
/// volume by the subscription rate and the operator's population share.
///
/// # Errors
///
/// Returns [`DemandError::MissingReferenceData`] when no statistic exists.
/// No default is substituted.
pub fn estimate(
    config: &NetworkConfig,
    country_code: &str,
    statistics: &dyn ReferenceStatistics,
) -> Result<DemandFigure, DemandError> {
    let country_code = country_code.trim().to_uppercase();

    let statistic = match config.reference_year {
        Some(year) => statistics.lookup(&country_code, year),
        None => statistics.latest(&country_code),
    }
    .ok_or_else(|| DemandError::MissingReferenceData {
        country_code: country_code.clone(),
        year: config.reference_year,
    })?;

    let gb_per_capita_month = statistic.gb_per_subscription_month
        * (config.mbb_subscr / 100.0)
        * (config.oppopshare / 100.0);

    log::info!(
        "{country_code}: {:.3} GB per subscriber per month ({}), {:.3} GB per capita",
        statistic.gb_per_subscription_month,
        statistic.year,
        gb_per_capita_month
    );

    Ok(DemandFigure {
        country_code,
        udatavmonth_pu: statistic.gb_per_subscription_month,
        udatavmonth_year: statistic.year,
        gb_per_capita_month,
    })
}

#[cfg(test)]
mod tests {
    use mobile_capacity_config::example_config;

    use super::*;

    fn table() -> ReferenceTable {
        ReferenceTable::from_entries([("KEN", 2021, 4.0), ("KEN", 2022, 6.0), ("BRA", 2022, 9.5)])
    }

    #[test]
    fn uses_latest_year_by_default() {
        let figure = estimate(&example_config(), "ken", &table()).unwrap();
        assert_eq!(figure.country_code, "KEN");
        assert_eq!(figure.udatavmonth_year, 2022);
        assert!((figure.udatavmonth_pu - 6.0).abs() < 1e-12);
        // 6.0 * 1.13 * 0.5
        assert!((figure.gb_per_capita_month - 3.39).abs() < 1e-9);
    }

    #[test]
    fn uses_configured_reference_year() {
        let mut config = example_config();
        config.reference_year = Some(2021);
        let figure = estimate(&config, "KEN", &table()).unwrap();
        assert_eq!(figure.udatavmonth_year, 2021);
        assert!((figure.udatavmonth_pu - 4.0).abs() < 1e-12);
    }

    #[test]
    fn missing_country_is_fatal() {
        let err = estimate(&example_config(), "NGA", &table()).unwrap_err();
        assert!(matches!(
            err,
            DemandError::MissingReferenceData { ref country_code, year: None } if country_code == "NGA"
        ));
    }

    #[test]
    fn missing_year_is_fatal() {
        let mut config = example_config();
        config.reference_year = Some(2019);
        let err = estimate(&config, "BRA", &table()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No mobile broadband traffic statistic for BRA (year 2019)"
        );
    }
}
