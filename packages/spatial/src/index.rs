//! R-tree lookup of cell sites around a location.

use mobile_capacity_models::CellSite;
use rstar::{AABB, RTree, primitives::GeomWithData};

use crate::frame::LocalFrame;

type SiteEntry = GeomWithData<[f64; 2], usize>;

/// Latitude cap applied when widening longitude windows towards the poles.
const MAX_WINDOW_LAT: f64 = 89.0;

/// A site within reach of a queried location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteDistance {
    /// Position of the site in the slice the index was built from.
    pub index: usize,
    /// Ground distance in meters, measured in the site's local frame.
    pub distance_m: f64,
}

/// Spatial index over cell-site positions.
///
/// Entries are stored in lon/lat; each radius query is turned into a
/// degree window wide enough for the query latitude, then filtered by the
/// exact distance from every candidate site.
pub struct SiteIndex {
    tree: RTree<SiteEntry>,
    frames: Vec<LocalFrame>,
}

impl SiteIndex {
    /// Bulk-loads the index.
    #[must_use]
    pub fn new(sites: &[CellSite]) -> Self {
        let entries = sites
            .iter()
            .enumerate()
            .map(|(i, site)| GeomWithData::new([site.lon, site.lat], i))
            .collect();
        let frames = sites
            .iter()
            .map(|site| LocalFrame::new(site.lon, site.lat))
            .collect();

        let tree = RTree::bulk_load(entries);
        log::debug!("Indexed {} cell sites", tree.size());
        Self { tree, frames }
    }

    /// Number of indexed sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Local frame of the site at `index`, if it was indexed.
    #[must_use]
    pub fn frame(&self, index: usize) -> Option<&LocalFrame> {
        self.frames.get(index)
    }

    /// Sites within `radius_m` meters of `(lon, lat)`.
    ///
    /// Sorted by distance, ties by position in the input slice.
    #[must_use]
    pub fn within(&self, lon: f64, lat: f64, radius_m: f64) -> Vec<SiteDistance> {
        let window = search_window(lon, lat, radius_m);

        let mut found: Vec<SiteDistance> = self
            .tree
            .locate_in_envelope(&window)
            .filter_map(|entry| {
                let distance_m = self.frames[entry.data].distance(lon, lat);
                (distance_m <= radius_m).then_some(SiteDistance {
                    index: entry.data,
                    distance_m,
                })
            })
            .collect();

        found.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then(a.index.cmp(&b.index))
        });
        found
    }
}

/// Degree envelope containing every site within `radius_m` of a location.
///
/// A site's own frame scales longitude by the cosine of its latitude, so
/// the window is widened for the most poleward latitude it can contain.
fn search_window(lon: f64, lat: f64, radius_m: f64) -> AABB<[f64; 2]> {
    let meters_per_degree = crate::frame::EARTH_RADIUS_M.to_radians();
    let dlat = radius_m / meters_per_degree;
    let poleward = (lat.abs() + dlat).min(MAX_WINDOW_LAT);
    let dlon = (dlat / poleward.to_radians().cos()).min(180.0);

    AABB::from_corners([lon - dlon, lat - dlat], [lon + dlon, lat + dlat])
}
