//! Concentric ring and sector wedge geometry around an anchor.

use geo::{BooleanOps as _, BoundingRect as _, Coord, LineString, MultiPolygon, Polygon, Rect};
use mobile_capacity_config::NetworkConfig;
use mobile_capacity_models::{BufferRing, SectorSpan};

use crate::SpatialError;
use crate::frame::LocalFrame;
use crate::ladder::{RingLadder, SectorLayout};

/// Vertices used to sample a full circle.
pub const CIRCLE_SEGMENTS: usize = 96;

/// Regions every ring is clipped to, in lon/lat.
#[derive(Debug, Clone, Default)]
pub struct ClipRegion {
    /// Extent of the available population data.
    pub extent: Option<Rect<f64>>,
    /// Study area boundary (e.g. the country outline).
    pub study_area: Option<MultiPolygon<f64>>,
}

/// Generates the ring ladder (and optional wedges) around anchors.
#[derive(Debug, Clone)]
pub struct BufferGenerator {
    ladder: RingLadder,
    sectors: Option<SectorLayout>,
}

impl BufferGenerator {
    /// Creates a generator for a validated configuration.
    #[must_use]
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            ladder: RingLadder::from_config(config),
            sectors: SectorLayout::from_config(config),
        }
    }

    /// The radius ladder.
    #[must_use]
    pub const fn ladder(&self) -> &RingLadder {
        &self.ladder
    }

    /// The sector layout, when sectorization is enabled.
    #[must_use]
    pub const fn sectors(&self) -> Option<&SectorLayout> {
        self.sectors.as_ref()
    }

    /// Unclipped ring shapes in the anchor's local frame (meters).
    ///
    /// Ordered by ring index, then sector index.
    #[must_use]
    pub fn local_shapes(&self) -> Vec<(usize, Option<SectorSpan>, Polygon<f64>)> {
        let mut shapes = Vec::new();
        for (k, (inner, outer)) in self.ladder.rings().enumerate() {
            let (inner, outer) = (f64::from(inner), f64::from(outer));
            match &self.sectors {
                None => shapes.push((k, None, annulus(inner, outer))),
                Some(layout) => {
                    for span in layout.spans() {
                        shapes.push((k, Some(span), wedge(inner, outer, &span, layout.arc_points())));
                    }
                }
            }
        }
        shapes
    }

    /// Builds the clipped rings of one anchor.
    ///
    /// `service_area` is the anchor's Voronoi cell in its local frame; the
    /// rings are additionally clipped to `clip` in lon/lat.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeometryExtent`] when clipping removes every
    /// ring of the anchor.
    pub fn generate(
        &self,
        anchor_id: &str,
        frame: &LocalFrame,
        service_area: Option<&Polygon<f64>>,
        clip: &ClipRegion,
    ) -> Result<Vec<BufferRing>, SpatialError> {
        let service_area = service_area.map(|cell| MultiPolygon(vec![cell.clone()]));

        let rings: Vec<BufferRing> = self
            .local_shapes()
            .into_iter()
            .filter_map(|(ring_index, sector, shape)| {
                let (inner_radius, outer_radius) = self.ladder.bounds(ring_index)?;
                let mut local = MultiPolygon(vec![shape]);
                if let Some(cell) = &service_area {
                    local = local.intersection(cell);
                }

                let mut geometry = frame.to_lon_lat(&local);
                if let Some(extent) = &clip.extent {
                    geometry = clip_to_rect(geometry, extent);
                }
                if let Some(area) = &clip.study_area {
                    geometry = geometry.intersection(area);
                }

                Some(BufferRing {
                    anchor_id: anchor_id.to_string(),
                    ring_index,
                    inner_radius,
                    outer_radius,
                    sector,
                    geometry,
                })
            })
            .collect();

        if rings.iter().all(BufferRing::is_empty) {
            return Err(SpatialError::GeometryExtent {
                anchor_id: anchor_id.to_string(),
            });
        }

        Ok(rings)
    }
}

/// Point at `radius` meters along `bearing` degrees (clockwise from north).
fn polar(radius: f64, bearing: f64) -> Coord<f64> {
    let (sin, cos) = bearing.to_radians().sin_cos();
    Coord {
        x: radius * sin,
        y: radius * cos,
    }
}

fn circle(radius: f64) -> LineString<f64> {
    #[allow(clippy::cast_precision_loss)]
    let step = 360.0 / CIRCLE_SEGMENTS as f64;
    #[allow(clippy::cast_precision_loss)]
    let coords = (0..CIRCLE_SEGMENTS)
        .map(|i| polar(radius, i as f64 * step))
        .collect();
    LineString::new(coords)
}

/// Disk when `inner` is zero, annulus otherwise.
fn annulus(inner: f64, outer: f64) -> Polygon<f64> {
    let holes = if inner > 0.0 { vec![circle(inner)] } else { vec![] };
    Polygon::new(circle(outer), holes)
}

/// Wedge of a ring between `bearing ± half_width`.
fn wedge(inner: f64, outer: f64, span: &SectorSpan, arc_points: usize) -> Polygon<f64> {
    let start = span.bearing_deg - span.half_width_deg;
    #[allow(clippy::cast_precision_loss)]
    let step = 2.0 * span.half_width_deg / (arc_points - 1) as f64;
    #[allow(clippy::cast_precision_loss)]
    let bearing = |i: usize| start + i as f64 * step;

    let mut coords: Vec<Coord<f64>> = (0..arc_points).map(|i| polar(outer, bearing(i))).collect();
    if inner > 0.0 {
        coords.extend((0..arc_points).rev().map(|i| polar(inner, bearing(i))));
    } else {
        coords.push(Coord { x: 0.0, y: 0.0 });
    }

    Polygon::new(LineString::new(coords), vec![])
}

/// Intersects with a rectangle, skipping the boolean operation when the
/// geometry lies entirely inside or outside it.
fn clip_to_rect(geometry: MultiPolygon<f64>, rect: &Rect<f64>) -> MultiPolygon<f64> {
    let Some(bounds) = geometry.bounding_rect() else {
        return geometry;
    };

    let inside = bounds.min().x >= rect.min().x
        && bounds.min().y >= rect.min().y
        && bounds.max().x <= rect.max().x
        && bounds.max().y <= rect.max().y;
    if inside {
        return geometry;
    }

    let disjoint = bounds.max().x <= rect.min().x
        || bounds.min().x >= rect.max().x
        || bounds.max().y <= rect.min().y
        || bounds.min().y >= rect.max().y;
    if disjoint {
        return MultiPolygon(vec![]);
    }

    geometry.intersection(&MultiPolygon(vec![rect.to_polygon()]))
}
