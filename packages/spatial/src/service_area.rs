//! Voronoi service areas.
//!
//! A site's service area is the set of points closer to it than to any
//! other site. It is computed per site in the site's local frame by
//! clipping a bounding square against the bisector half-plane of every
//! neighbour that could influence it.

use geo::{Coord, LineString, Polygon};

/// Builds the service area of the site at the origin of a local frame.
///
/// `neighbours` are `(ict_id, offset)` pairs in the same frame; only sites
/// within twice `half_extent` can affect the result. The returned cell is
/// bounded by a square of half-size `half_extent`.
///
/// Two sites at the same position would share a degenerate bisector; the
/// site with the lower id owns the position and `None` is returned for the
/// other one.
#[must_use]
pub fn service_area<'a>(
    site_id: &str,
    neighbours: impl IntoIterator<Item = (&'a str, Coord<f64>)>,
    half_extent: f64,
) -> Option<Polygon<f64>> {
    let mut cell = vec![
        Coord { x: -half_extent, y: -half_extent },
        Coord { x: half_extent, y: -half_extent },
        Coord { x: half_extent, y: half_extent },
        Coord { x: -half_extent, y: half_extent },
    ];

    for (neighbour_id, offset) in neighbours {
        if neighbour_id == site_id {
            continue;
        }
        let norm_sq = offset.x.mul_add(offset.x, offset.y * offset.y);
        if norm_sq < 1e-6 {
            if neighbour_id < site_id {
                log::debug!("Site {site_id} is shadowed by co-located site {neighbour_id}");
                return None;
            }
            continue;
        }

        cell = clip_half_plane(&cell, offset, norm_sq / 2.0);
        if cell.len() < 3 {
            return None;
        }
    }

    Some(Polygon::new(LineString::new(cell), vec![]))
}

/// Sutherland–Hodgman step keeping the part of a convex ring where
/// `normal · p <= limit`.
fn clip_half_plane(ring: &[Coord<f64>], normal: Coord<f64>, limit: f64) -> Vec<Coord<f64>> {
    let side = |p: Coord<f64>| normal.x.mul_add(p.x, normal.y * p.y) - limit;

    let mut clipped = Vec::with_capacity(ring.len() + 1);
    for (i, &current) in ring.iter().enumerate() {
        let next = ring[(i + 1) % ring.len()];
        let (a, b) = (side(current), side(next));

        if a <= 0.0 {
            clipped.push(current);
        }
        if (a < 0.0 && b > 0.0) || (a > 0.0 && b < 0.0) {
            let t = a / (a - b);
            clipped.push(Coord {
                x: (next.x - current.x).mul_add(t, current.x),
                y: (next.y - current.y).mul_add(t, current.y),
            });
        }
    }
    clipped
}

#[cfg(test)]
mod tests {
    use geo::{Area as _, Contains as _, Point};

    use super::*;

    #[test]
    fn lone_site_gets_the_whole_square() {
        let cell = service_area("a", Vec::<(&str, Coord<f64>)>::new(), 1000.0).unwrap();
        assert!((cell.unsigned_area() - 4_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn neighbour_splits_along_the_bisector() {
        let cell = service_area("a", [("b", Coord { x: 1000.0, y: 0.0 })], 2000.0).unwrap();
        assert!(cell.contains(&Point::new(400.0, 0.0)));
        assert!(!cell.contains(&Point::new(600.0, 0.0)));
        // 2500 m wide (from -2000 to 500) by 4000 m tall.
        assert!((cell.unsigned_area() - 10_000_000.0).abs() < 1e-3);
    }

    #[test]
    fn own_entry_is_ignored() {
        let cell = service_area("a", [("a", Coord { x: 0.0, y: 0.0 })], 1000.0).unwrap();
        assert!((cell.unsigned_area() - 4_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn co_located_sites_resolve_to_lower_id() {
        let origin = Coord { x: 0.0, y: 0.0 };
        assert!(service_area("a", [("b", origin)], 1000.0).is_some());
        assert!(service_area("b", [("a", origin)], 1000.0).is_none());
    }

    #[test]
    fn surrounded_site_gets_a_closed_cell() {
        let neighbours = [
            ("n", Coord { x: 0.0, y: 1000.0 }),
            ("e", Coord { x: 1000.0, y: 0.0 }),
            ("s", Coord { x: 0.0, y: -1000.0 }),
            ("w", Coord { x: -1000.0, y: 0.0 }),
        ];
        let cell = service_area("c", neighbours, 5000.0).unwrap();
        assert!((cell.unsigned_area() - 1_000_000.0).abs() < 1e-3);
    }
}
