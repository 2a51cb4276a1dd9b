//! Per-site ring generation and population sampling.

use std::collections::BTreeMap;

use geo::{BooleanOps as _, MultiPolygon};
use mobile_capacity_models::{BufferRing, CellSite, RingKey};
use mobile_capacity_population::{PopulationSource, aggregate};
use mobile_capacity_spatial::{ClipRegion, SiteIndex, SpatialError, service_area::service_area};

use crate::RunError;
use crate::context::RunContext;

/// A clipped ring together with the people living in it.
#[derive(Debug, Clone, PartialEq)]
pub struct RingArea {
    /// The clipped ring.
    pub ring: BufferRing,
    /// Area-weighted population of the ring.
    pub population: f64,
}

/// Outcome of processing one cell site.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteAreas {
    /// Rings in ladder order (then sector order).
    Rings(Vec<RingArea>),
    /// A co-located site with a lower id owns this position.
    Shadowed,
    /// Every ring fell outside the population extent or the study area.
    OutsideExtent,
}

impl SiteAreas {
    /// The ring at ladder position `ring_index` in the given sector.
    #[must_use]
    pub fn ring(&self, ring_index: usize, sector: Option<u16>) -> Option<&RingArea> {
        let Self::Rings(rings) = self else {
            return None;
        };
        rings
            .iter()
            .find(|r| r.ring.ring_index == ring_index && r.ring.sector.map(|s| s.index) == sector)
    }

    /// Total population over every ring of the site.
    #[must_use]
    pub fn site_population(&self) -> f64 {
        match self {
            Self::Rings(rings) => rings.iter().map(|r| r.population).sum(),
            Self::Shadowed | Self::OutsideExtent => 0.0,
        }
    }
}

/// Rings and buffers of every site in a run.
#[derive(Debug, Clone, Default)]
pub struct BufferAreas {
    /// Every ring keyed by site, outer radius and sector.
    pub rings: BTreeMap<RingKey, RingArea>,
    /// Union of each site's rings.
    pub buffers: BTreeMap<String, MultiPolygon<f64>>,
}

impl BufferAreas {
    /// Collects the rings of all processed sites.
    #[must_use]
    pub fn from_sites(sites: &[CellSite], areas: Vec<SiteAreas>) -> Self {
        let mut buffer_areas = Self::default();

        for (site, site_areas) in sites.iter().zip(areas) {
            let SiteAreas::Rings(rings) = site_areas else {
                continue;
            };

            let buffer = rings
                .iter()
                .filter(|r| !r.ring.is_empty())
                .fold(MultiPolygon(vec![]), |acc, r| acc.union(&r.ring.geometry));
            buffer_areas.buffers.insert(site.ict_id.clone(), buffer);

            for ring in rings {
                buffer_areas.rings.insert(ring.ring.key(), ring);
            }
        }

        buffer_areas
    }
}

/// Generates and samples the rings of the site at `site_index`.
///
/// # Errors
///
/// Returns [`RunError::Population`] if the population source cannot be
/// queried, or [`RunError::UnknownSite`] if `site_index` is not a position
/// of `sites` and `index`. Rings clipped away entirely are not an error:
/// they yield [`SiteAreas::OutsideExtent`].
pub fn compute_site(
    context: &RunContext,
    sites: &[CellSite],
    index: &SiteIndex,
    site_index: usize,
    clip: &ClipRegion,
    population: &dyn PopulationSource,
) -> Result<SiteAreas, RunError> {
    let (Some(site), Some(frame)) = (sites.get(site_index), index.frame(site_index)) else {
        return Err(RunError::UnknownSite(site_index));
    };
    let max_radius = f64::from(context.generator.ladder().max_radius());

    let cell = if context.config.clip_to_service_area {
        let neighbours = index
            .within(site.lon, site.lat, 2.0 * max_radius)
            .into_iter()
            .filter_map(|n| {
                let other = sites.get(n.index)?;
                Some((other.ict_id.as_str(), frame.project(other.lon, other.lat)))
            });
        match service_area(&site.ict_id, neighbours, max_radius + 1.0) {
            Some(cell) => Some(cell),
            None => return Ok(SiteAreas::Shadowed),
        }
    } else {
        None
    };

    let rings = match context
        .generator
        .generate(&site.ict_id, frame, cell.as_ref(), clip)
    {
        Ok(rings) => rings,
        Err(SpatialError::GeometryExtent { anchor_id }) => {
            log::warn!("Site {anchor_id}: all rings outside the population extent or study area");
            return Ok(SiteAreas::OutsideExtent);
        }
        Err(e) => return Err(e.into()),
    };

    let samples = aggregate(population, &context.dataset, &rings)?;
    log::trace!(
        "Site {}: {} rings, {:.1} people",
        site.ict_id,
        rings.len(),
        samples.iter().map(|s| s.population).sum::<f64>()
    );

    Ok(SiteAreas::Rings(
        rings
            .into_iter()
            .zip(samples)
            .map(|(ring, sample)| RingArea {
                ring,
                population: sample.population,
            })
            .collect(),
    ))
}
