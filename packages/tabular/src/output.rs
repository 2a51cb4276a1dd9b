//! Result table and ring geometry export.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use mobile_capacity_models::{MultiPolygon, SufficiencyResult};
use mobile_capacity_sufficiency::{BufferAreas, RunOutput};
use serde::Serialize;

use crate::{BUFFERS_FILE, RESULTS_FILE, RINGS_FILE, TabularError, country_dir};

/// One flattened row of the result table.
///
/// Absent values are written as empty cells; `sufcapch` is empty for
/// indeterminate points.
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    poi_id: &'a str,
    lat: f64,
    lon: f64,
    ict_id: Option<&'a str>,
    ground_distance: Option<f64>,
    ring_outer_radius: Option<u32>,
    sector: Option<u16>,
    ring_population: f64,
    site_population: f64,
    rbdlthtarg: f64,
    upoprbu: f64,
    cellavcap: f64,
    demand_mbps: f64,
    capacity_mbps: f64,
    sufcapch: Option<bool>,
    status: &'static str,
}

impl<'a> From<&'a SufficiencyResult> for ResultRow<'a> {
    fn from(result: &'a SufficiencyResult) -> Self {
        Self {
            poi_id: &result.poi_id,
            lat: result.lat,
            lon: result.lon,
            ict_id: result.ict_id.as_deref(),
            ground_distance: result.distance_m,
            ring_outer_radius: result.ring_outer_radius,
            sector: result.sector,
            ring_population: result.ring_population,
            site_population: result.site_population,
            rbdlthtarg: result.rbdlthtarg,
            upoprbu: result.upoprbu,
            cellavcap: result.cellavcap,
            demand_mbps: result.demand_mbps,
            capacity_mbps: result.capacity_mbps,
            sufcapch: result.sufcapch(),
            status: result.status.as_str(),
        }
    }
}

/// Writes result rows as CSV, in the order given.
///
/// # Errors
///
/// Returns an error if serialization or the underlying writer fails.
pub fn write_results_csv(results: &[SufficiencyResult], writer: impl Write) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for result in results {
        csv_writer.serialize(ResultRow::from(result))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Builds a `GeoJSON` feature collection with one feature per non-empty
/// ring, ordered by site, radius and sector.
#[must_use]
pub fn rings_feature_collection(areas: &BufferAreas) -> FeatureCollection {
    let features = areas
        .rings
        .values()
        .filter(|area| !area.ring.is_empty())
        .map(|area| {
            let ring = &area.ring;
            let properties = serde_json::json!({
                "ict_id": ring.anchor_id,
                "ring_index": ring.ring_index,
                "inner_radius": ring.inner_radius,
                "outer_radius": ring.outer_radius,
                "centre_distance": ring.centre_distance(),
                "sector": ring.sector.map(|s| s.index),
                "bearing_deg": ring.sector.map(|s| s.bearing_deg),
                "population": area.population,
            });
            feature(&ring.geometry, properties)
        })
        .collect();

    collection(features)
}

/// Builds a `GeoJSON` feature collection with one feature per site: the
/// union of its rings and the people living in them.
#[must_use]
pub fn buffers_feature_collection(areas: &BufferAreas) -> FeatureCollection {
    let features = areas
        .buffers
        .iter()
        .filter(|(_, buffer)| !buffer.0.is_empty())
        .map(|(ict_id, buffer)| {
            let population: f64 = areas
                .rings
                .values()
                .filter(|area| &area.ring.anchor_id == ict_id)
                .map(|area| area.population)
                .sum();
            let properties = serde_json::json!({
                "ict_id": ict_id,
                "population": population,
            });
            feature(buffer, properties)
        })
        .collect();

    collection(features)
}

fn feature(geometry: &MultiPolygon<f64>, properties: serde_json::Value) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(geometry))),
        id: None,
        properties: match properties {
            serde_json::Value::Object(map) => Some(map),
            _ => Some(JsonObject::new()),
        },
        foreign_members: None,
    }
}

const fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Writes the rings of a run as a `GeoJSON` feature collection.
///
/// # Errors
///
/// Returns an error if serialization or the underlying writer fails.
pub fn write_rings_geojson(areas: &BufferAreas, writer: impl Write) -> Result<(), serde_json::Error> {
    serde_json::to_writer(writer, &rings_feature_collection(areas))
}

/// Writes the per-site buffers of a run as a `GeoJSON` feature collection.
///
/// # Errors
///
/// Returns an error if serialization or the underlying writer fails.
pub fn write_buffers_geojson(areas: &BufferAreas, writer: impl Write) -> Result<(), serde_json::Error> {
    serde_json::to_writer(writer, &buffers_feature_collection(areas))
}

/// Paths written by [`write_run_output`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    /// The per-point result table.
    pub results: PathBuf,
    /// The ring geometry export.
    pub rings: PathBuf,
    /// The per-site buffer export.
    pub buffers: PathBuf,
}

/// Writes a run's result table, ring export and buffer export under
/// `<output_dir>/<country>/`.
///
/// # Errors
///
/// Returns [`TabularError`] naming the file that could not be written.
pub fn write_run_output(output_dir: &Path, output: &RunOutput) -> Result<WrittenFiles, TabularError> {
    let dir = country_dir(output_dir, &output.demand.country_code);
    std::fs::create_dir_all(&dir).map_err(|e| TabularError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let results = dir.join(RESULTS_FILE);
    let file = create(&results)?;
    write_results_csv(&output.poi_sufcapch_result, BufWriter::new(file)).map_err(|e| {
        TabularError::Csv {
            path: results.display().to_string(),
            source: e,
        }
    })?;

    let rings = dir.join(RINGS_FILE);
    write_geojson(&rings, |writer| write_rings_geojson(&output.buffer_areas, writer))?;

    let buffers = dir.join(BUFFERS_FILE);
    write_geojson(&buffers, |writer| write_buffers_geojson(&output.buffer_areas, writer))?;

    log::info!(
        "Wrote {} result rows to {}, {} rings to {} and {} site buffers to {}",
        output.poi_sufcapch_result.len(),
        results.display(),
        output.buffer_areas.rings.len(),
        rings.display(),
        output.buffer_areas.buffers.len(),
        buffers.display()
    );

    Ok(WrittenFiles {
        results,
        rings,
        buffers,
    })
}

fn write_geojson(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<std::fs::File>) -> Result<(), serde_json::Error>,
) -> Result<(), TabularError> {
    let mut writer = BufWriter::new(create(path)?);
    write(&mut writer).map_err(|e| TabularError::Json {
        path: path.display().to_string(),
        source: e,
    })?;
    writer.flush().map_err(|e| TabularError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn create(path: &Path) -> Result<std::fs::File, TabularError> {
    std::fs::File::create(path).map_err(|e| TabularError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, Polygon};
    use mobile_capacity_models::{
        BufferRing, CapacityFigure, DemandFigure, ResultStatus, Verdict,
    };
    use mobile_capacity_sufficiency::RingArea;

    use super::*;

    fn result(poi_id: &str, verdict: Verdict, status: ResultStatus) -> SufficiencyResult {
        SufficiencyResult {
            poi_id: poi_id.to_string(),
            lat: -1.29,
            lon: 36.82,
            ict_id: (status != ResultStatus::Uncovered).then(|| "s1".to_string()),
            distance_m: (status != ResultStatus::Uncovered).then_some(900.0),
            ring_outer_radius: (status != ResultStatus::Uncovered).then_some(1000),
            sector: None,
            ring_population: 2000.0,
            site_population: 2000.0,
            rbdlthtarg: 200.0 / 9.0,
            upoprbu: 200.0 / 9.0,
            cellavcap: 20.5 / 3.0 - 200.0 / 9.0,
            demand_mbps: 40.0,
            capacity_mbps: 6.15,
            verdict,
            status,
        }
    }

    fn areas() -> BufferAreas {
        let square = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]),
            vec![],
        )]);
        let ring = |outer_radius, geometry| BufferRing {
            anchor_id: "s1".to_string(),
            ring_index: 0,
            inner_radius: 0,
            outer_radius,
            sector: None,
            geometry,
        };

        let mut areas = BufferAreas::default();
        for area in [
            RingArea {
                ring: ring(1000, square.clone()),
                population: 2000.0,
            },
            RingArea {
                ring: ring(1500, MultiPolygon(vec![])),
                population: 0.0,
            },
        ] {
            areas.rings.insert(area.ring.key(), area);
        }
        areas.buffers.insert("s1".to_string(), square);
        areas
    }

    #[test]
    fn result_rows_flatten_verdicts() {
        let rows = vec![
            result("a", Verdict::Insufficient, ResultStatus::Evaluated),
            result("b", Verdict::Indeterminate, ResultStatus::OutsideRasterExtent),
            result("c", Verdict::Insufficient, ResultStatus::Uncovered),
        ];
        let mut buffer = Vec::new();
        write_results_csv(&rows, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "poi_id,lat,lon,ict_id,ground_distance,ring_outer_radius,sector,ring_population,\
             site_population,rbdlthtarg,upoprbu,cellavcap,demand_mbps,capacity_mbps,sufcapch,status"
        );
        assert!(lines[1].starts_with("a,-1.29,36.82,s1,900.0,1000,,"));
        assert!(lines[1].ends_with(",false,evaluated"));
        assert!(lines[2].ends_with(",,outside_raster_extent"));
        assert!(lines[3].starts_with("c,-1.29,36.82,,,,,"));
        assert!(lines[3].ends_with(",false,uncovered"));
    }

    #[test]
    fn ring_export_skips_empty_rings() {
        let collection = rings_feature_collection(&areas());
        assert_eq!(collection.features.len(), 1);

        let feature = &collection.features[0];
        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties["ict_id"], "s1");
        assert_eq!(properties["outer_radius"], 1000);
        assert_eq!(properties["centre_distance"], 500.0);
        assert!(properties["sector"].is_null());
    }

    #[test]
    fn buffer_export_has_one_feature_per_site() {
        let collection = buffers_feature_collection(&areas());
        assert_eq!(collection.features.len(), 1);

        let properties = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(properties["ict_id"], "s1");
        assert_eq!(properties["population"], 2000.0);
    }

    #[test]
    fn writes_country_scoped_files() {
        let dir = std::env::temp_dir().join("mobile_capacity_tabular_output_test");
        std::fs::remove_dir_all(&dir).ok();

        let output = RunOutput {
            buffer_areas: areas(),
            poi_sufcapch_result: vec![result("a", Verdict::Sufficient, ResultStatus::Evaluated)],
            demand: DemandFigure {
                country_code: "KEN".to_string(),
                udatavmonth_pu: 6.0,
                udatavmonth_year: 2022,
                gb_per_capita_month: 3.39,
            },
            capacity: CapacityFigure {
                config_hash: "0".repeat(32),
                total_resource_blocks: 25.0,
                usable_resource_blocks: 20.5,
                site_mbps: 18.45,
                sector_mbps: 6.15,
                busy_hour_concentration: 24.0 / 28.0,
                available_resource_blocks: 20.5 / 3.0,
                available_mbps: 6.15,
            },
        };

        let written = write_run_output(&dir, &output).unwrap();
        assert_eq!(written.results, dir.join("KEN").join(RESULTS_FILE));

        let csv = std::fs::read_to_string(&written.results).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().ends_with(",true,evaluated"));

        let geojson = std::fs::read_to_string(&written.rings).unwrap();
        let parsed: geojson::GeoJson = geojson.parse().unwrap();
        assert!(matches!(parsed, geojson::GeoJson::FeatureCollection(ref fc) if fc.features.len() == 1));

        assert_eq!(written.buffers, dir.join("KEN").join(BUFFERS_FILE));
        let buffers: geojson::GeoJson = std::fs::read_to_string(&written.buffers).unwrap().parse().unwrap();
        assert!(matches!(buffers, geojson::GeoJson::FeatureCollection(ref fc) if fc.features.len() == 1));

        std::fs::remove_dir_all(&dir).ok();
    }
}
