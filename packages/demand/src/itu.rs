//! Traffic-per-subscription tables built from ITU indicators.
//!
//! Two shapes are supported: a precomputed table
//! (`entityIso_mbbsubscr,dataYear,mbb_traffic_per_subscr_per_month`) and the
//! raw ITU DataHub exports for "active mobile-broadband subscriptions" and
//! "mobile-broadband internet traffic within the country" (exabytes), which
//! are joined per country and year.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DemandError, ReferenceStatistics, TrafficStatistic};

/// Gigabytes in one exabyte (binary prefixes).
const GB_PER_EXABYTE: f64 = 1024.0 * 1024.0 * 1024.0;

const MONTHS_PER_YEAR: f64 = 12.0;

/// One row of an ITU DataHub indicator export.
#[derive(Debug, Deserialize)]
struct ItuRow {
    #[serde(rename = "entityName")]
    entity_name: String,
    #[serde(rename = "entityIso", default)]
    entity_iso: String,
    #[serde(rename = "dataYear")]
    data_year: u16,
    #[serde(rename = "dataValue")]
    data_value: Option<f64>,
}

/// One row of the precomputed traffic-per-subscription table.
#[derive(Debug, Serialize, Deserialize)]
struct TrafficRow {
    #[serde(rename = "entityIso_mbbsubscr")]
    entity_iso: String,
    #[serde(rename = "dataYear")]
    data_year: u16,
    mbb_traffic_per_subscr_per_month: f64,
}

/// In-memory traffic statistics keyed by (ISO3, year).
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    entries: BTreeMap<(String, u16), f64>,
}

impl ReferenceTable {
    /// Builds a table from `(iso3, year, gb_per_subscription_month)` triples.
    #[must_use]
    pub fn from_entries<S: AsRef<str>>(entries: impl IntoIterator<Item = (S, u16, f64)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(iso, year, value)| ((iso.as_ref().to_uppercase(), year), value))
                .collect(),
        }
    }

    /// Number of (country, year) statistics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no statistics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates all statistics ordered by country then year.
    pub fn statistics(&self) -> impl Iterator<Item = TrafficStatistic> + '_ {
        self.entries
            .iter()
            .map(|((iso, year), value)| TrafficStatistic {
                country_code: iso.clone(),
                year: *year,
                gb_per_subscription_month: *value,
            })
    }

    /// Loads a precomputed traffic-per-subscription CSV.
    ///
    /// # Errors
    ///
    /// Returns [`DemandError::Csv`] if the file cannot be opened or its
    /// header is unreadable. Malformed rows are skipped.
    pub fn load_csv(path: &Path) -> Result<Self, DemandError> {
        let file = std::fs::File::open(path).map_err(|e| DemandError::Csv {
            path: path.display().to_string(),
            source: e.into(),
        })?;
        let table = Self::from_reader(file).map_err(|e| DemandError::Csv {
            path: path.display().to_string(),
            source: e,
        })?;
        log::info!(
            "Loaded {} traffic statistics from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parses a precomputed traffic-per-subscription CSV.
    ///
    /// # Errors
    ///
    /// Returns an error if the header row cannot be read.
    pub fn from_reader(reader: impl Read) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        csv_reader.headers()?;

        let mut entries = BTreeMap::new();
        for result in csv_reader.deserialize::<TrafficRow>() {
            let row = match result {
                Ok(r) => r,
                Err(e) => {
                    log::trace!("  skipping malformed traffic row: {e}");
                    continue;
                }
            };
            if row.entity_iso.trim().is_empty() {
                continue;
            }
            entries.insert(
                (row.entity_iso.trim().to_uppercase(), row.data_year),
                row.mbb_traffic_per_subscr_per_month,
            );
        }

        Ok(Self { entries })
    }

    /// Derives the table from the two ITU indicator exports on disk.
    ///
    /// # Errors
    ///
    /// Returns [`DemandError::Csv`] naming the file that failed.
    pub fn from_itu_files(subscriptions: &Path, traffic: &Path) -> Result<Self, DemandError> {
        let subscriptions_rows = read_itu_file(subscriptions)?;
        let traffic_rows = read_itu_file(traffic)?;
        let table = Self::from_itu_rows(subscriptions_rows, traffic_rows);
        log::info!(
            "Derived {} traffic statistics from ITU indicators",
            table.len()
        );
        Ok(table)
    }

    /// Derives the table from the two ITU indicator exports.
    ///
    /// Rows are joined on `(entityName, dataYear)`; pairs where either value
    /// is missing or zero are dropped. Traffic in exabytes per year becomes
    /// GB per subscription per month. All years are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if either header row cannot be read.
    pub fn from_itu_readers(subscriptions: impl Read, traffic: impl Read) -> Result<Self, csv::Error> {
        Ok(Self::from_itu_rows(
            read_itu_rows(subscriptions)?,
            read_itu_rows(traffic)?,
        ))
    }

    fn from_itu_rows(subscriptions: Vec<ItuRow>, traffic: Vec<ItuRow>) -> Self {
        let traffic_by_entity: BTreeMap<(String, u16), f64> = traffic
            .into_iter()
            .filter_map(|row| Some(((row.entity_name, row.data_year), row.data_value?)))
            .collect();

        let mut entries = BTreeMap::new();
        for row in subscriptions {
            let Some(subscribers) = row.data_value else {
                continue;
            };
            let Some(&exabytes) = traffic_by_entity.get(&(row.entity_name.clone(), row.data_year))
            else {
                continue;
            };
            if subscribers == 0.0 || exabytes == 0.0 || row.entity_iso.trim().is_empty() {
                continue;
            }

            let per_month = exabytes * GB_PER_EXABYTE / subscribers / MONTHS_PER_YEAR;
            entries.insert((row.entity_iso.trim().to_uppercase(), row.data_year), per_month);
        }

        Self { entries }
    }

    /// Writes the table in the precomputed CSV shape.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying writer fails.
    pub fn write_csv(&self, writer: impl Write) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for ((iso, year), value) in &self.entries {
            csv_writer.serialize(TrafficRow {
                entity_iso: iso.clone(),
                data_year: *year,
                mbb_traffic_per_subscr_per_month: *value,
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

impl ReferenceStatistics for ReferenceTable {
    fn lookup(&self, country_code: &str, year: u16) -> Option<TrafficStatistic> {
        let key = (country_code.to_uppercase(), year);
        self.entries.get(&key).map(|value| TrafficStatistic {
            country_code: key.0.clone(),
            year,
            gb_per_subscription_month: *value,
        })
    }

    fn latest(&self, country_code: &str) -> Option<TrafficStatistic> {
        let iso = country_code.to_uppercase();
        self.entries
            .range((iso.clone(), 0)..=(iso, u16::MAX))
            .next_back()
            .map(|((iso, year), value)| TrafficStatistic {
                country_code: iso.clone(),
                year: *year,
                gb_per_subscription_month: *value,
            })
    }
}

fn read_itu_file(path: &Path) -> Result<Vec<ItuRow>, DemandError> {
    let file = std::fs::File::open(path).map_err(|e| DemandError::Csv {
        path: path.display().to_string(),
        source: e.into(),
    })?;
    read_itu_rows(file).map_err(|e| DemandError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

fn read_itu_rows(reader: impl Read) -> Result<Vec<ItuRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    csv_reader.headers()?;

    let mut rows = Vec::new();
    for result in csv_reader.deserialize::<ItuRow>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => log::trace!("  skipping malformed ITU row: {e}"),
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBSCRIPTIONS: &str = "entityName,entityIso,dataYear,dataValue\n\
        Kenya,KEN,2021,20000000\n\
        Kenya,KEN,2022,25000000\n\
        Chad,TCD,2022,0\n\
        Peru,PER,2022,30000000\n";

    const TRAFFIC: &str = "entityName,entityIso,dataYear,dataValue\n\
        Kenya,KEN,2021,0.5\n\
        Kenya,KEN,2022,1.2\n\
        Chad,TCD,2022,0.1\n\
        Peru,PER,2022,\n";

    #[test]
    fn joins_itu_indicators_per_country_and_year() {
        let table =
            ReferenceTable::from_itu_readers(SUBSCRIPTIONS.as_bytes(), TRAFFIC.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        let stat = table.lookup("KEN", 2022).unwrap();
        let expected = 1.2 * GB_PER_EXABYTE / 25_000_000.0 / 12.0;
        assert!((stat.gb_per_subscription_month - expected).abs() < 1e-9);
    }

    #[test]
    fn drops_zero_and_missing_values() {
        let table =
            ReferenceTable::from_itu_readers(SUBSCRIPTIONS.as_bytes(), TRAFFIC.as_bytes()).unwrap();
        assert!(table.latest("TCD").is_none());
        assert!(table.latest("PER").is_none());
    }

    #[test]
    fn latest_picks_greatest_year() {
        let table =
            ReferenceTable::from_itu_readers(SUBSCRIPTIONS.as_bytes(), TRAFFIC.as_bytes()).unwrap();
        assert_eq!(table.latest("ken").unwrap().year, 2022);
    }

    #[test]
    fn latest_does_not_leak_into_neighbouring_codes() {
        let table = ReferenceTable::from_entries([("KEM", 2030, 1.0), ("KEN", 2020, 2.0)]);
        assert_eq!(table.latest("KEN").unwrap().year, 2020);
    }

    #[test]
    fn precomputed_table_round_trips_through_csv() {
        let table = ReferenceTable::from_entries([("KEN", 2022, 6.25), ("BRA", 2021, 9.5)]);
        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();

        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("entityIso_mbbsubscr,dataYear,mbb_traffic_per_subscr_per_month"));

        let parsed = ReferenceTable::from_reader(buffer.as_slice()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!((parsed.lookup("BRA", 2021).unwrap().gb_per_subscription_month - 9.5).abs() < 1e-12);
    }

    #[test]
    fn skips_malformed_precomputed_rows() {
        let csv = "entityIso_mbbsubscr,dataYear,mbb_traffic_per_subscr_per_month\n\
                   KEN,2022,6.0\n\
                   BRA,not-a-year,3.0\n";
        let table = ReferenceTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
    }
}
