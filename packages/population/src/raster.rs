//! In-memory population grid.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use geo::{Area as _, BooleanOps as _, BoundingRect as _, Coord, MultiPolygon, Rect};
use serde::Deserialize;

use crate::{DatasetKey, PopulationError, PopulationSource};

/// One cell of a WorldPop XYZ export (cell centre and count).
#[derive(Debug, Deserialize)]
struct RasterRow {
    #[serde(alias = "X", alias = "x", alias = "longitude")]
    lon: f64,
    #[serde(alias = "Y", alias = "y", alias = "latitude")]
    lat: f64,
    #[serde(alias = "Z", alias = "z", alias = "value")]
    population: f64,
}

/// Regular lon/lat population grid.
///
/// Samples are cell centres. The grid is aligned on the data: its origin is
/// half a cell below and left of the westernmost and southernmost centres,
/// so every centre lies in the middle of its cell whatever lattice the
/// dataset uses (WorldPop centres fall on whole multiples of the cell size).
///
/// Only non-empty cells are stored. A polygon's population is the sum of
/// every overlapping cell's count weighted by the share of the cell the
/// polygon covers.
#[derive(Debug, Clone)]
pub struct PopulationRaster {
    key: DatasetKey,
    cell_size: f64,
    /// Lower-left corner of cell `(0, 0)`.
    origin: Coord<f64>,
    cells: HashMap<(i64, i64), f64>,
    min: (i64, i64),
    max: (i64, i64),
}

impl PopulationRaster {
    /// Builds a raster from `(lon, lat, population)` cell samples.
    ///
    /// Samples are snapped to the dataset's grid; samples in the same cell
    /// are summed. Non-finite, negative and zero counts are ignored.
    /// Returns `None` when no sample remains.
    #[must_use]
    pub fn from_points(
        key: DatasetKey,
        points: impl IntoIterator<Item = (f64, f64, f64)>,
    ) -> Option<Self> {
        let cell_size = key.cell_size_deg();
        let samples: Vec<(f64, f64, f64)> = points
            .into_iter()
            .filter(|(lon, lat, population)| {
                lon.is_finite() && lat.is_finite() && population.is_finite() && *population > 0.0
            })
            .collect();

        let (west, south) = samples
            .iter()
            .map(|&(lon, lat, _)| (lon, lat))
            .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1)))?;
        let origin = Coord {
            x: west - cell_size / 2.0,
            y: south - cell_size / 2.0,
        };

        let mut cells: HashMap<(i64, i64), f64> = HashMap::new();
        for (lon, lat, population) in samples {
            *cells
                .entry(cell_of(origin, cell_size, lon, lat))
                .or_default() += population;
        }

        let min = cells.keys().copied().reduce(|a, b| (a.0.min(b.0), a.1.min(b.1)))?;
        let max = cells.keys().copied().reduce(|a, b| (a.0.max(b.0), a.1.max(b.1)))?;

        Some(Self {
            key,
            cell_size,
            origin,
            cells,
            min,
            max,
        })
    }

    /// Loads the dataset `key` from `dir`, using its WorldPop file name.
    ///
    /// # Errors
    ///
    /// See [`PopulationRaster::load_csv`].
    pub fn load_dataset(dir: &Path, key: DatasetKey) -> Result<Self, PopulationError> {
        let path = dir.join(key.file_name());
        Self::load_csv(&path, key)
    }

    /// Loads a raster from a `lon,lat,population` CSV file.
    ///
    /// `X,Y,Z` headers (the WorldPop XYZ export) are accepted too.
    /// Malformed rows are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::Csv`] if the file cannot be read, or
    /// [`PopulationError::EmptyRaster`] if it holds no populated cell.
    pub fn load_csv(path: &Path, key: DatasetKey) -> Result<Self, PopulationError> {
        let csv_error = |source: csv::Error| PopulationError::Csv {
            path: path.display().to_string(),
            source,
        };

        let file = std::fs::File::open(path).map_err(|e| csv_error(e.into()))?;
        let points = read_points(file).map_err(csv_error)?;
        let count = points.len();

        let raster = Self::from_points(key, points).ok_or_else(|| PopulationError::EmptyRaster {
            path: path.display().to_string(),
        })?;

        log::info!(
            "Loaded population raster {} ({count} rows, {} cells, {:.0} people)",
            path.display(),
            raster.cell_count(),
            raster.total_population()
        );
        Ok(raster)
    }

    /// Dataset the raster was loaded for.
    #[must_use]
    pub const fn key(&self) -> &DatasetKey {
        &self.key
    }

    /// Number of populated cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Sum of all cells.
    #[must_use]
    pub fn total_population(&self) -> f64 {
        self.cells.values().sum()
    }

    fn cell_rect(&self, (col, row): (i64, i64)) -> Rect<f64> {
        #[allow(clippy::cast_precision_loss)]
        let min = Coord {
            x: (col as f64).mul_add(self.cell_size, self.origin.x),
            y: (row as f64).mul_add(self.cell_size, self.origin.y),
        };
        Rect::new(
            min,
            Coord {
                x: min.x + self.cell_size,
                y: min.y + self.cell_size,
            },
        )
    }
}

impl PopulationSource for PopulationRaster {
    fn population_in_polygon(
        &self,
        polygon: &MultiPolygon<f64>,
        key: &DatasetKey,
    ) -> Result<f64, PopulationError> {
        if *key != self.key {
            return Err(PopulationError::DatasetMismatch {
                loaded: self.key.clone(),
                requested: key.clone(),
            });
        }

        let Some(bounds) = polygon.bounding_rect() else {
            return Ok(0.0);
        };

        let low = cell_of(self.origin, self.cell_size, bounds.min().x, bounds.min().y);
        let high = cell_of(self.origin, self.cell_size, bounds.max().x, bounds.max().y);
        let cell_area = self.cell_size * self.cell_size;

        let mut total = 0.0;
        for col in low.0.max(self.min.0)..=high.0.min(self.max.0) {
            for row in low.1.max(self.min.1)..=high.1.min(self.max.1) {
                let Some(&value) = self.cells.get(&(col, row)) else {
                    continue;
                };
                let cell = MultiPolygon(vec![self.cell_rect((col, row)).to_polygon()]);
                let overlap = cell.intersection(polygon).unsigned_area();
                if overlap > 0.0 {
                    total += value * (overlap / cell_area).min(1.0);
                }
            }
        }

        Ok(total)
    }

    fn extent(&self) -> Option<Rect<f64>> {
        let low = self.cell_rect(self.min);
        let high = self.cell_rect(self.max);
        Some(Rect::new(low.min(), high.max()))
    }
}

/// Grid cell containing a position, for a grid whose cell `(0, 0)` starts
/// at `origin`.
fn cell_of(origin: Coord<f64>, cell_size: f64, lon: f64, lat: f64) -> (i64, i64) {
    #[allow(clippy::cast_possible_truncation)]
    let index = |v: f64, start: f64| ((v - start) / cell_size).floor() as i64;
    (index(lon, origin.x), index(lat, origin.y))
}

fn read_points(reader: impl Read) -> Result<Vec<(f64, f64, f64)>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    csv_reader.headers()?;

    let mut points = Vec::new();
    for result in csv_reader.deserialize::<RasterRow>() {
        match result {
            Ok(row) => points.push((row.lon, row.lat, row.population)),
            Err(e) => log::trace!("  skipping malformed raster row: {e}"),
        }
    }
    Ok(points)
}
