//! Ring ladder and sector layout.

use mobile_capacity_config::NetworkConfig;
use mobile_capacity_models::SectorSpan;

/// Sorted outer radii of the concentric rings around an anchor.
///
/// Ring 0 is the disk `[0, min_radius]`; ring `k > 0` spans
/// `(min_radius + (k-1)·step, min_radius + k·step]`. Together the rings tile
/// `[0, max_radius]` without gaps or overlaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingLadder {
    outer_radii: Vec<u32>,
}

impl RingLadder {
    /// Builds the ladder of a validated configuration.
    #[must_use]
    pub fn from_config(config: &NetworkConfig) -> Self {
        let outer_radii = (0..config.ring_count())
            .map(|k| {
                // ring_count() bounds k so the product stays within max_radius
                #[allow(clippy::cast_possible_truncation)]
                let k = k as u32;
                config.min_radius + k * config.radius_step
            })
            .collect();
        Self { outer_radii }
    }

    /// Number of rings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outer_radii.len()
    }

    /// Always `false` for a ladder built from a valid configuration.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outer_radii.is_empty()
    }

    /// Outer radii, innermost first.
    #[must_use]
    pub fn outer_radii(&self) -> &[u32] {
        &self.outer_radii
    }

    /// Outer radius of the last ring.
    #[must_use]
    pub fn max_radius(&self) -> u32 {
        self.outer_radii.last().copied().unwrap_or(0)
    }

    /// `(inner, outer)` radii of ring `k`, or `None` past the last ring.
    #[must_use]
    pub fn bounds(&self, k: usize) -> Option<(u32, u32)> {
        let outer = *self.outer_radii.get(k)?;
        let inner = k.checked_sub(1).map_or(0, |i| self.outer_radii[i]);
        Some((inner, outer))
    }

    /// `(inner, outer)` radii of every ring, innermost first.
    pub fn rings(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.outer_radii.iter().scan(0, |inner, &outer| {
            let ring = (*inner, outer);
            *inner = outer;
            Some(ring)
        })
    }

    /// Distance from the anchor to the middle of ring `k`.
    ///
    /// The innermost ring is a disk, so its middle is half its radius.
    #[must_use]
    pub fn centre_distance(&self, k: usize) -> Option<f64> {
        self.bounds(k)
            .map(|(inner, outer)| f64::midpoint(f64::from(inner), f64::from(outer)))
    }

    /// Index of the smallest ring enclosing a point at `distance` meters.
    ///
    /// Binary search over the sorted radii, so the answer never depends on
    /// the order rings were generated in. A point exactly on a boundary
    /// belongs to the inner ring. Returns `None` beyond `max_radius`.
    #[must_use]
    pub fn ring_index(&self, distance: f64) -> Option<usize> {
        if !distance.is_finite() || distance < 0.0 {
            return None;
        }
        let k = self
            .outer_radii
            .partition_point(|&r| f64::from(r) < distance);
        (k < self.outer_radii.len()).then_some(k)
    }
}

/// Evenly spaced sector wedges around a site.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorLayout {
    count: u16,
    half_width_deg: f64,
    arc_points: usize,
}

impl SectorLayout {
    /// The layout of a configuration, or `None` when sectorization is off.
    #[must_use]
    pub fn from_config(config: &NetworkConfig) -> Option<Self> {
        config.sectorized.then(|| Self {
            count: config.sectors_per_site,
            half_width_deg: config.rotation_angle,
            arc_points: usize::from(config.angles_num),
        })
    }

    /// Number of sectors.
    #[must_use]
    pub const fn count(&self) -> u16 {
        self.count
    }

    /// Vertices used to sample each wedge arc.
    #[must_use]
    pub const fn arc_points(&self) -> usize {
        self.arc_points
    }

    /// Centre bearing of sector `index`, clockwise from north.
    #[must_use]
    pub fn bearing(&self, index: u16) -> f64 {
        f64::from(index) * 360.0 / f64::from(self.count)
    }

    /// All sector spans in index order.
    pub fn spans(&self) -> impl Iterator<Item = SectorSpan> + '_ {
        (0..self.count).map(|index| SectorSpan {
            index,
            bearing_deg: self.bearing(index),
            half_width_deg: self.half_width_deg,
        })
    }

    /// Sector whose centre bearing is angularly closest to `bearing`.
    ///
    /// Ties resolve to the lower index.
    #[must_use]
    pub fn nearest_sector(&self, bearing: f64) -> u16 {
        let mut best = 0;
        let mut best_delta = f64::INFINITY;
        for index in 0..self.count {
            let delta = angular_distance(bearing, self.bearing(index));
            if delta < best_delta - 1e-9 {
                best = index;
                best_delta = delta;
            }
        }
        best
    }
}

/// Smallest absolute difference between two bearings, in `[0, 180]`.
#[must_use]
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}
