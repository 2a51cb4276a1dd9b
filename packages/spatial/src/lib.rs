#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geometry for the sufficiency engine.
//!
//! Builds the concentric ring ladder (and optional sector wedges) around
//! each cell site, clips it to the site's Voronoi service area, the
//! population extent and the study area, and provides R-tree lookups of
//! the sites within reach of a point of interest.

pub mod boundary;
pub mod buffer;
pub mod frame;
pub mod index;
pub mod ladder;
pub mod service_area;

pub use boundary::{load_study_area, parse_study_area};
pub use buffer::{BufferGenerator, ClipRegion};
pub use frame::LocalFrame;
pub use index::{SiteDistance, SiteIndex};
pub use ladder::{RingLadder, SectorLayout};

/// Errors that can occur while building geometry.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// Every ring around an anchor fell outside the clipping regions.
    #[error("Buffers around {anchor_id} lie entirely outside the population extent")]
    GeometryExtent {
        /// Anchor whose rings were all clipped away.
        anchor_id: String,
    },

    /// A boundary document was not usable.
    #[error("Invalid boundary: {0}")]
    Boundary(String),

    /// A boundary file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path to the file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
