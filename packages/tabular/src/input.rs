//! CSV loading of points of interest, cell sites and bitrate tables.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use mobile_capacity_config::{Band, BandBitrates, BitrateTable};
use mobile_capacity_models::{CellSite, PointOfInterest, RadioType};
use serde::Deserialize;

use crate::TabularError;

#[derive(Debug, Deserialize)]
struct PoiRow {
    #[serde(alias = "id", alias = "giga_id_school")]
    poi_id: String,
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude", alias = "lng")]
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct CellSiteRow {
    #[serde(alias = "id")]
    ict_id: String,
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude", alias = "lng")]
    lon: f64,
    #[serde(default, alias = "radio")]
    radio_type: RadioType,
}

/// Loads points of interest from a `poi_id,lat,lon` CSV file.
///
/// Rows that fail to parse or carry coordinates outside WGS84 bounds are
/// skipped and logged.
///
/// # Errors
///
/// Returns [`TabularError::Csv`] if the file cannot be opened or its header
/// is unreadable.
pub fn load_pois(path: &Path) -> Result<Vec<PointOfInterest>, TabularError> {
    let file = open(path)?;
    let pois = read_pois(file).map_err(|e| csv_error(path, e))?;
    log::info!("Loaded {} points of interest from {}", pois.len(), path.display());
    Ok(pois)
}

/// Loads cell sites from an `ict_id,lat,lon,radio_type` CSV file.
///
/// `radio_type` is optional. Invalid rows are skipped and logged;
/// duplicate ids are kept here and resolved by the run.
///
/// # Errors
///
/// Returns [`TabularError::Csv`] if the file cannot be opened or its header
/// is unreadable.
pub fn load_cell_sites(path: &Path) -> Result<Vec<CellSite>, TabularError> {
    let file = open(path)?;
    let sites = read_cell_sites(file).map_err(|e| csv_error(path, e))?;
    log::info!("Loaded {} cell sites from {}", sites.len(), path.display());
    Ok(sites)
}

/// Loads a per-band bitrate table from two CSV files with one column per
/// band (`L850`, `L1800`, `L2600`): step distances in km and the
/// per-resource-block bitrate in kbps reached up to each distance.
///
/// Columns may be shorter than others; blank cells end a column. Bands
/// missing from either file are left out of the table.
///
/// # Errors
///
/// Returns [`TabularError::Csv`] if a file cannot be read, or
/// [`TabularError::Parse`] if a cell is not a number.
pub fn load_bitrate_table(distances: &Path, bitrates: &Path) -> Result<BitrateTable, TabularError> {
    let distance_columns = read_band_columns(open(distances)?, distances)?;
    let mut bitrate_columns = read_band_columns(open(bitrates)?, bitrates)?;

    let mut table = BitrateTable::default();
    for (band, distance_km) in distance_columns {
        let Some(kbps) = bitrate_columns.remove(&band) else {
            log::warn!("{band}: no bitrates in {}", bitrates.display());
            continue;
        };
        table.set_band(band, BandBitrates { distance_km, kbps });
    }
    log::info!(
        "Loaded bitrate steps for {} from {} and {}",
        Band::ALL
            .into_iter()
            .filter(|band| table.band(*band).is_some())
            .map(Band::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        distances.display(),
        bitrates.display()
    );
    Ok(table)
}

fn read_band_columns(reader: impl Read, path: &Path) -> Result<BTreeMap<Band, Vec<f64>>, TabularError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let bands: Vec<(usize, Band)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, name)| {
            Band::ALL
                .into_iter()
                .find(|band| band.as_str().eq_ignore_ascii_case(name.trim()))
                .map(|band| (i, band))
        })
        .collect();

    let mut columns: BTreeMap<Band, Vec<f64>> = bands.iter().map(|&(_, band)| (band, Vec::new())).collect();
    let mut ended: Vec<Band> = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        for &(i, band) in &bands {
            let cell = record.get(i).map_or("", str::trim);
            if cell.is_empty() {
                ended.push(band);
                continue;
            }
            if ended.contains(&band) {
                return Err(parse_error(path, format!("{band}: value after a blank cell on row {}", line + 2)));
            }
            let value = cell
                .parse::<f64>()
                .map_err(|e| parse_error(path, format!("{band}: {cell:?} on row {}: {e}", line + 2)))?;
            if let Some(column) = columns.get_mut(&band) {
                column.push(value);
            }
        }
    }

    columns.retain(|_, column| !column.is_empty());
    Ok(columns)
}

fn parse_error(path: &Path, message: String) -> TabularError {
    TabularError::Parse {
        path: path.display().to_string(),
        message,
    }
}

fn open(path: &Path) -> Result<std::fs::File, TabularError> {
    std::fs::File::open(path).map_err(|e| csv_error(path, e.into()))
}

fn csv_error(path: &Path, source: csv::Error) -> TabularError {
    TabularError::Csv {
        path: path.display().to_string(),
        source,
    }
}

fn valid_position(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

fn read_pois(reader: impl Read) -> Result<Vec<PointOfInterest>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    csv_reader.headers()?;

    let mut pois = Vec::new();
    for result in csv_reader.deserialize::<PoiRow>() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("  skipping malformed point of interest row: {e}");
                continue;
            }
        };
        if !valid_position(row.lat, row.lon) {
            log::warn!(
                "  skipping point of interest {} with invalid position ({}, {})",
                row.poi_id,
                row.lat,
                row.lon
            );
            continue;
        }
        pois.push(PointOfInterest {
            poi_id: row.poi_id,
            lat: row.lat,
            lon: row.lon,
        });
    }
    Ok(pois)
}

fn read_cell_sites(reader: impl Read) -> Result<Vec<CellSite>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    csv_reader.headers()?;

    let mut sites = Vec::new();
    for result in csv_reader.deserialize::<CellSiteRow>() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("  skipping malformed cell site row: {e}");
                continue;
            }
        };
        if !valid_position(row.lat, row.lon) {
            log::warn!("  skipping cell site {} with invalid position", row.ict_id);
            continue;
        }
        sites.push(CellSite {
            ict_id: row.ict_id,
            lat: row.lat,
            lon: row.lon,
            radio_type: row.radio_type,
        });
    }
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_points_and_skips_invalid_rows() {
        let csv = "poi_id,lat,lon\n\
                   school-1,-1.29,36.82\n\
                   school-2,91.0,36.82\n\
                   school-3,abc,36.82\n\
                   school-4,-1.30,36.80\n";
        let pois = read_pois(csv.as_bytes()).unwrap();
        let ids: Vec<&str> = pois.iter().map(|p| p.poi_id.as_str()).collect();
        assert_eq!(ids, vec!["school-1", "school-4"]);
    }

    #[test]
    fn accepts_long_coordinate_headers() {
        let csv = "id,latitude,longitude\nA,1.5,2.5\n";
        let pois = read_pois(csv.as_bytes()).unwrap();
        assert_eq!(pois.len(), 1);
        assert!((pois[0].lon - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn reads_cell_sites_with_optional_radio_type() {
        let csv = "ict_id,lat,lon,radio_type\n\
                   s1,-1.29,36.82,4G\n\
                   s2,-1.30,36.80,\n\
                   s3,-1.31,36.81,6G\n";
        let sites = read_cell_sites(csv.as_bytes()).unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].radio_type, RadioType::G4);
        assert_eq!(sites[1].radio_type, RadioType::Unknown);
    }

    #[test]
    fn reads_band_columns_of_uneven_length() {
        let csv = "L850,L1800,L2600\n0.5,0.25,\n1.0,0.5,\n2.0,,\n";
        let columns = read_band_columns(csv.as_bytes(), Path::new("bwdistance_km.csv")).unwrap();
        assert_eq!(columns[&Band::L850], vec![0.5, 1.0, 2.0]);
        assert_eq!(columns[&Band::L1800], vec![0.25, 0.5]);
        assert!(!columns.contains_key(&Band::L2600));
    }

    #[test]
    fn rejects_non_numeric_steps() {
        let csv = "L850\n0.5\nfar\n";
        let err = read_band_columns(csv.as_bytes(), Path::new("bwdistance_km.csv")).unwrap_err();
        assert!(matches!(err, TabularError::Parse { .. }));
        assert!(err.to_string().contains("row 3"), "{err}");
    }

    #[test]
    fn loads_bitrate_table_from_distance_and_bitrate_files() {
        let dir = std::env::temp_dir().join("mobile_capacity_bitrate_table_test");
        std::fs::create_dir_all(&dir).unwrap();
        let distances = dir.join("bwdistance_km.csv");
        let bitrates = dir.join("bwdlachievbr_kbps.csv");
        std::fs::write(&distances, "L850,L1800\n1.0,1.0\n2.0,2.0\n").unwrap();
        std::fs::write(&bitrates, "L850\n1200\n600\n").unwrap();

        let table = load_bitrate_table(&distances, &bitrates).unwrap();
        let l850 = table.band(Band::L850).unwrap();
        assert_eq!(l850.distance_km, vec![1.0, 2.0]);
        assert_eq!(l850.kbps, vec![1200.0, 600.0]);
        assert!(table.band(Band::L1800).is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_reports_missing_files() {
        let path = std::env::temp_dir().join("mobile_capacity_missing_pois.csv");
        let err = load_pois(&path).unwrap_err();
        assert!(matches!(err, TabularError::Csv { .. }));
    }
}
