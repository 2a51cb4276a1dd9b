//! Local metric frames around an anchor.
//!
//! Buffers are built in meters east/north of the anchor and converted back
//! to WGS84 lon/lat. Within the few kilometers a ring ladder spans, the
//! equirectangular approximation stays well under a meter of error.

use geo::{Coord, MapCoords as _, MultiPolygon};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Equirectangular projection centred on an anchor point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    origin: Coord<f64>,
    meters_per_degree_lon: f64,
    meters_per_degree_lat: f64,
}

impl LocalFrame {
    /// Creates a frame centred on `(lon, lat)`.
    #[must_use]
    pub fn new(lon: f64, lat: f64) -> Self {
        let meters_per_degree_lat = EARTH_RADIUS_M.to_radians();
        Self {
            origin: Coord { x: lon, y: lat },
            meters_per_degree_lon: meters_per_degree_lat * lat.to_radians().cos(),
            meters_per_degree_lat,
        }
    }

    /// The anchor in lon/lat.
    #[must_use]
    pub const fn origin(&self) -> Coord<f64> {
        self.origin
    }

    /// Meters east/north of the anchor for a lon/lat position.
    #[must_use]
    pub fn project(&self, lon: f64, lat: f64) -> Coord<f64> {
        Coord {
            x: (lon - self.origin.x) * self.meters_per_degree_lon,
            y: (lat - self.origin.y) * self.meters_per_degree_lat,
        }
    }

    /// Lon/lat of a position given in meters east/north of the anchor.
    #[must_use]
    pub fn unproject(&self, offset: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.origin.x + offset.x / self.meters_per_degree_lon,
            y: self.origin.y + offset.y / self.meters_per_degree_lat,
        }
    }

    /// Ground distance from the anchor in meters.
    #[must_use]
    pub fn distance(&self, lon: f64, lat: f64) -> f64 {
        let offset = self.project(lon, lat);
        offset.x.hypot(offset.y)
    }

    /// Bearing from the anchor in degrees clockwise from north, in `[0, 360)`.
    #[must_use]
    pub fn bearing(&self, lon: f64, lat: f64) -> f64 {
        let offset = self.project(lon, lat);
        offset.x.atan2(offset.y).to_degrees().rem_euclid(360.0)
    }

    /// Converts a geometry from this frame's meters to lon/lat.
    #[must_use]
    pub fn to_lon_lat(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        geometry.map_coords(|c| self.unproject(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_and_unproject_are_inverse() {
        let frame = LocalFrame::new(36.8, -1.3);
        let back = frame.unproject(frame.project(36.81, -1.29));
        assert!((back.x - 36.81).abs() < 1e-12);
        assert!((back.y - -1.29).abs() < 1e-12);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let frame = LocalFrame::new(0.0, 0.0);
        let d = frame.distance(0.0, 1.0);
        assert!((d - 111_195.0).abs() < 10.0, "{d}");
    }

    #[test]
    fn longitude_shrinks_with_latitude() {
        let frame = LocalFrame::new(10.0, 60.0);
        let d = frame.distance(11.0, 60.0);
        assert!((d - 55_597.0).abs() < 10.0, "{d}");
    }

    #[test]
    fn bearings_are_clockwise_from_north() {
        let frame = LocalFrame::new(0.0, 0.0);
        assert!((frame.bearing(0.0, 0.01) - 0.0).abs() < 1e-9);
        assert!((frame.bearing(0.01, 0.0) - 90.0).abs() < 1e-9);
        assert!((frame.bearing(0.0, -0.01) - 180.0).abs() < 1e-9);
        assert!((frame.bearing(-0.01, 0.0) - 270.0).abs() < 1e-9);
    }
}
