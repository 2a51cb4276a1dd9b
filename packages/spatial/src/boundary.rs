//! Study-area boundaries from `GeoJSON`.

use std::path::Path;

use geo::MultiPolygon;
use geojson::GeoJson;

use crate::SpatialError;

/// Parses a `GeoJSON` document into a single [`MultiPolygon`].
///
/// Accepts a bare geometry, a feature, or a feature collection; every
/// `Polygon` and `MultiPolygon` found is merged into the result. Other
/// geometry types are ignored.
///
/// # Errors
///
/// Returns [`SpatialError::Boundary`] if the document is not valid
/// `GeoJSON` or contains no polygonal geometry.
pub fn parse_study_area(geojson_str: &str) -> Result<MultiPolygon<f64>, SpatialError> {
    let geojson: GeoJson = geojson_str
        .parse()
        .map_err(|e: geojson::Error| SpatialError::Boundary(e.to_string()))?;

    let geometries: Vec<geojson::Geometry> = match geojson {
        GeoJson::Geometry(geom) => vec![geom],
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .collect(),
    };

    let mut polygons = Vec::new();
    for geom in geometries {
        let geo_geom: geo::Geometry<f64> = match geom.try_into() {
            Ok(g) => g,
            Err(e) => {
                log::trace!("  skipping unconvertible boundary geometry: {e}");
                continue;
            }
        };
        match geo_geom {
            geo::Geometry::MultiPolygon(mp) => polygons.extend(mp.0),
            geo::Geometry::Polygon(p) => polygons.push(p),
            _ => {}
        }
    }

    if polygons.is_empty() {
        return Err(SpatialError::Boundary(
            "no Polygon or MultiPolygon geometry found".to_string(),
        ));
    }

    Ok(MultiPolygon(polygons))
}

/// Reads a study-area boundary file.
///
/// # Errors
///
/// Returns [`SpatialError::Io`] if the file cannot be read, or
/// [`SpatialError::Boundary`] if it does not hold a polygonal boundary.
pub fn load_study_area(path: &Path) -> Result<MultiPolygon<f64>, SpatialError> {
    let text = std::fs::read_to_string(path).map_err(|e| SpatialError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let area = parse_study_area(&text)?;
    log::info!(
        "Loaded study area with {} polygon(s) from {}",
        area.0.len(),
        path.display()
    );
    Ok(area)
}
