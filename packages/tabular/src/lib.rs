#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! File input and output for capacity runs.
//!
//! Points of interest, cell sites and per-band bitrate steps are read from
//! flat CSV files. A run's results are written under a country-scoped
//! directory:
//!
//! ```text
//! <output>/<ISO3>/poi_sufcapch_result.csv
//! <output>/<ISO3>/buffer_rings.geojson
//! <output>/<ISO3>/buffers.geojson
//! ```

pub mod input;
pub mod output;

use std::path::{Path, PathBuf};

pub use input::{load_bitrate_table, load_cell_sites, load_pois};
pub use output::{write_buffers_geojson, write_results_csv, write_rings_geojson, write_run_output};

/// File name of the per-point result table.
pub const RESULTS_FILE: &str = "poi_sufcapch_result.csv";

/// File name of the ring geometry export.
pub const RINGS_FILE: &str = "buffer_rings.geojson";

/// File name of the per-site buffer export.
pub const BUFFERS_FILE: &str = "buffers.geojson";

/// Errors that can occur while reading inputs or writing outputs.
#[derive(Debug, thiserror::Error)]
pub enum TabularError {
    /// A CSV file could not be read or written.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// A file or directory could not be created or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An input table holds a value that is not a number.
    #[error("Invalid value in {path}: {message}")]
    Parse {
        /// Path to the input file.
        path: String,
        /// What was wrong and where.
        message: String,
    },

    /// A `GeoJSON` document could not be serialized.
    #[error("JSON error in {path}: {source}")]
    Json {
        /// Path to the JSON file.
        path: String,
        /// Underlying serialization error.
        source: serde_json::Error,
    },
}

/// Country-scoped output directory, e.g. `out/KEN`.
#[must_use]
pub fn country_dir(output_dir: &Path, country_code: &str) -> PathBuf {
    output_dir.join(country_code.trim().to_uppercase())
}
