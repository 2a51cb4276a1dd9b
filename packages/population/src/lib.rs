#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Population aggregation over buffer rings.
//!
//! A [`PopulationSource`] answers "how many people live inside this
//! polygon" for a given [`DatasetKey`]. The bundled implementation is the
//! in-memory [`PopulationRaster`], loaded from WorldPop-style CSV exports.

pub mod raster;

use geo::{MultiPolygon, Rect};
use mobile_capacity_config::NetworkConfig;
use mobile_capacity_models::{BufferRing, PopulationSample};

pub use raster::PopulationRaster;

/// Errors that can occur while sampling population.
#[derive(Debug, thiserror::Error)]
pub enum PopulationError {
    /// The source holds a different dataset than the one requested.
    #[error("Population dataset mismatch: loaded {loaded}, requested {requested}")]
    DatasetMismatch {
        /// Dataset the source was loaded for.
        loaded: DatasetKey,
        /// Dataset that was requested.
        requested: DatasetKey,
    },

    /// A raster file contained no usable cells.
    #[error("Population raster {path} contains no cells")]
    EmptyRaster {
        /// Path to the raster file.
        path: String,
    },

    /// A raster CSV could not be parsed.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },
}

/// Identifies a population dataset vintage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetKey {
    /// ISO3 country code, uppercase.
    pub country_code: String,
    /// Dataset year.
    pub year: u16,
    /// 1 km aggregated grid instead of the 100 m grid.
    pub one_km_res: bool,
    /// UN-adjusted population counts.
    pub un_adjusted: bool,
}

impl DatasetKey {
    /// The dataset a configuration selects for a country.
    #[must_use]
    pub fn from_config(config: &NetworkConfig, country_code: &str) -> Self {
        Self {
            country_code: country_code.trim().to_uppercase(),
            year: config.dataset_year,
            one_km_res: config.one_km_res,
            un_adjusted: config.un_adjusted,
        }
    }

    /// Cell size of the dataset's grid in degrees (30" or 3").
    #[must_use]
    pub fn cell_size_deg(&self) -> f64 {
        if self.one_km_res {
            1.0 / 120.0
        } else {
            1.0 / 1200.0
        }
    }

    /// File stem following the WorldPop naming scheme, e.g.
    /// `ken_ppp_2020_1km_Aggregated_UNadj`.
    #[must_use]
    pub fn stem(&self) -> String {
        let mut stem = format!("{}_ppp_{}", self.country_code.to_lowercase(), self.year);
        if self.one_km_res {
            stem.push_str("_1km_Aggregated");
        }
        if self.un_adjusted {
            stem.push_str("_UNadj");
        }
        stem
    }

    /// CSV file name of the dataset.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.stem())
    }
}

impl std::fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.stem())
    }
}

/// Injected source of population counts.
pub trait PopulationSource: Send + Sync {
    /// People living inside `polygon` (lon/lat) according to dataset `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::DatasetMismatch`] when the source does not
    /// hold `key`.
    fn population_in_polygon(
        &self,
        polygon: &MultiPolygon<f64>,
        key: &DatasetKey,
    ) -> Result<f64, PopulationError>;

    /// Lon/lat extent the source has data for.
    fn extent(&self) -> Option<Rect<f64>>;
}

/// Samples the population of every ring.
///
/// Rings emptied by clipping contribute zero. Samples are returned in ring
/// order.
///
/// # Errors
///
/// Propagates the first error of the source.
pub fn aggregate(
    source: &dyn PopulationSource,
    key: &DatasetKey,
    rings: &[BufferRing],
) -> Result<Vec<PopulationSample>, PopulationError> {
    rings
        .iter()
        .map(|ring| {
            let population = if ring.is_empty() {
                0.0
            } else {
                source.population_in_polygon(&ring.geometry, key)?
            };
            Ok(PopulationSample {
                key: ring.key(),
                population,
            })
        })
        .collect()
}
