//! Association of points with sites and the sufficiency verdict.

use std::cmp::Ordering;

use mobile_capacity_config::{NetworkConfig, OverlapPolicy};
use mobile_capacity_models::{
    CapacityFigure, CellSite, PointOfInterest, ResultStatus, SufficiencyResult, Verdict,
};
use mobile_capacity_radio::{nominal_mbps, resource_blocks};
use mobile_capacity_spatial::SiteIndex;

use crate::areas::SiteAreas;
use crate::context::RunContext;

/// Bits in one (binary) gigabyte.
const BITS_PER_GB: f64 = 8.0 * 1024.0 * 1024.0 * 1024.0;

/// Average month length used to spread monthly volumes over days.
const DAYS_PER_MONTH: f64 = 30.4;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Average throughput a population draws, in Mbps.
#[must_use]
pub fn population_mbps(population: f64, gb_per_capita_month: f64) -> f64 {
    population * gb_per_capita_month * BITS_PER_GB / DAYS_PER_MONTH / SECONDS_PER_DAY / 1e6
}

/// Throughput reserved for a sector population: its average throughput
/// expressed as concurrent sessions at the target rate, rounded up.
#[must_use]
pub fn population_sessions_mbps(sector_population: f64, gb_per_capita_month: f64, dlthtarg: f64) -> f64 {
    (population_mbps(sector_population, gb_per_capita_month) / dlthtarg).ceil() * dlthtarg
}

/// Resource-block budget of the sector serving a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorLoad {
    /// Resource blocks of the point's own session at its distance.
    pub rbdlthtarg: f64,
    /// Resource blocks of the population sessions at the ring's centre.
    pub upoprbu: f64,
    /// Resource blocks left once the population is served.
    pub cellavcap: f64,
}

impl SectorLoad {
    /// Budget of a point `distance_m` from the site, in a ring whose middle
    /// lies `ring_centre_m` from the site and whose sector houses
    /// `sector_population` people.
    ///
    /// Returns `None` when the bitrate table does not reach either distance.
    #[must_use]
    pub fn new(
        config: &NetworkConfig,
        capacity: &CapacityFigure,
        gb_per_capita_month: f64,
        sector_population: f64,
        distance_m: f64,
        ring_centre_m: f64,
    ) -> Option<Self> {
        let sessions = population_sessions_mbps(sector_population, gb_per_capita_month, config.dlthtarg);
        let upoprbu = resource_blocks(config, sessions, ring_centre_m)?;
        let rbdlthtarg = resource_blocks(config, config.dlthtarg, distance_m)?;
        Some(Self {
            rbdlthtarg,
            upoprbu,
            cellavcap: capacity.available_resource_blocks - upoprbu,
        })
    }

    /// Demand on the sector in Mbps: the population and the point together,
    /// at the nominal resource block bitrate.
    #[must_use]
    pub fn demand_mbps(&self, config: &NetworkConfig) -> f64 {
        nominal_mbps(config, self.rbdlthtarg + self.upoprbu)
    }
}

/// Sufficient when demand does not exceed capacity.
#[must_use]
pub fn verdict(demand_mbps: f64, capacity_mbps: f64) -> Verdict {
    if demand_mbps <= capacity_mbps {
        Verdict::Sufficient
    } else {
        Verdict::Insufficient
    }
}

/// Where a point falls around one candidate site.
#[derive(Debug, Clone, Copy)]
struct Placement<'s> {
    site_index: usize,
    site: &'s CellSite,
    areas: &'s SiteAreas,
    distance_m: f64,
    ring_index: usize,
    sector: Option<u16>,
}

impl Placement<'_> {
    /// People in the ring (or wedge) containing the point.
    fn ring_population(&self) -> f64 {
        self.areas
            .ring(self.ring_index, self.sector)
            .map_or(0.0, |ring| ring.population)
    }
}

/// Evaluates points of interest against the processed sites of a run.
pub struct Evaluator<'a> {
    context: &'a RunContext,
    sites: &'a [CellSite],
    index: &'a SiteIndex,
    areas: &'a [SiteAreas],
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator. `areas` must be parallel to `sites`.
    #[must_use]
    pub const fn new(
        context: &'a RunContext,
        sites: &'a [CellSite],
        index: &'a SiteIndex,
        areas: &'a [SiteAreas],
    ) -> Self {
        Self {
            context,
            sites,
            index,
            areas,
        }
    }

    /// Produces the result row of one point.
    #[must_use]
    pub fn evaluate(&self, poi: &PointOfInterest) -> SufficiencyResult {
        let config = &self.context.config;
        let capacity = &self.context.capacity;

        let Some(placement) = self.associate(poi) else {
            log::debug!("POI {}: no site within reach", poi.poi_id);
            return self.uncovered(poi);
        };

        let ladder = self.context.generator.ladder();
        let (ring_outer_radius, ring_centre_m) = match (
            ladder.bounds(placement.ring_index),
            ladder.centre_distance(placement.ring_index),
        ) {
            (Some((_, outer)), Some(centre)) => (outer, centre),
            _ => return self.uncovered(poi),
        };

        let mut result = SufficiencyResult {
            poi_id: poi.poi_id.clone(),
            lat: poi.lat,
            lon: poi.lon,
            ict_id: Some(placement.site.ict_id.clone()),
            distance_m: Some(placement.distance_m),
            ring_outer_radius: Some(ring_outer_radius),
            sector: placement.sector,
            ring_population: 0.0,
            site_population: 0.0,
            rbdlthtarg: 0.0,
            upoprbu: 0.0,
            cellavcap: capacity.available_resource_blocks,
            demand_mbps: 0.0,
            capacity_mbps: capacity.available_mbps,
            verdict: Verdict::Indeterminate,
            status: ResultStatus::OutsideRasterExtent,
        };

        if matches!(placement.areas, SiteAreas::OutsideExtent) {
            return result;
        }

        let ring_population = placement.ring_population();
        let Some(load) = SectorLoad::new(
            config,
            capacity,
            self.context.demand.gb_per_capita_month,
            self.sector_population(ring_population, placement.sector),
            placement.distance_m,
            ring_centre_m,
        ) else {
            log::warn!(
                "POI {}: no bitrate at {:.0} m from site {}",
                poi.poi_id,
                placement.distance_m,
                placement.site.ict_id
            );
            return result;
        };

        let demand_mbps = load.demand_mbps(config);
        result.ring_population = ring_population;
        result.site_population = placement.areas.site_population();
        result.rbdlthtarg = load.rbdlthtarg;
        result.upoprbu = load.upoprbu;
        result.cellavcap = load.cellavcap;
        result.demand_mbps = demand_mbps;
        result.verdict = verdict(demand_mbps, capacity.available_mbps);
        result.status = ResultStatus::Evaluated;
        result
    }

    /// Row of a point no site serves. Its own session still needs the
    /// target rate while no capacity is available to it.
    fn uncovered(&self, poi: &PointOfInterest) -> SufficiencyResult {
        let config = &self.context.config;
        let rbdlthtarg = config.dlthtarg * 1000.0 / config.rb_bitrate_kbps;
        SufficiencyResult {
            poi_id: poi.poi_id.clone(),
            lat: poi.lat,
            lon: poi.lon,
            ict_id: None,
            distance_m: None,
            ring_outer_radius: None,
            sector: None,
            ring_population: 0.0,
            site_population: 0.0,
            rbdlthtarg,
            upoprbu: 0.0,
            cellavcap: 0.0,
            demand_mbps: config.dlthtarg,
            capacity_mbps: 0.0,
            verdict: Verdict::Insufficient,
            status: ResultStatus::Uncovered,
        }
    }

    /// Share of a ring's people served by one sector.
    fn sector_population(&self, ring_population: f64, sector: Option<u16>) -> f64 {
        if sector.is_some() {
            ring_population
        } else {
            ring_population / f64::from(self.context.config.sectors_per_site)
        }
    }

    /// Every site whose rings reach the point.
    fn placements(&self, poi: &PointOfInterest) -> Vec<Placement<'a>> {
        let ladder = self.context.generator.ladder();
        let max_radius = f64::from(ladder.max_radius());

        self.index
            .within(poi.lon, poi.lat, max_radius)
            .into_iter()
            .filter_map(|candidate| {
                let site = self.sites.get(candidate.index)?;
                let areas = self.areas.get(candidate.index)?;
                if matches!(areas, SiteAreas::Shadowed) {
                    return None;
                }
                let ring_index = ladder.ring_index(candidate.distance_m)?;
                let sector = match self.context.generator.sectors() {
                    Some(layout) => {
                        let bearing = self.index.frame(candidate.index)?.bearing(poi.lon, poi.lat);
                        Some(layout.nearest_sector(bearing))
                    }
                    None => None,
                };
                Some(Placement {
                    site_index: candidate.index,
                    site,
                    areas,
                    distance_m: candidate.distance_m,
                    ring_index,
                    sector,
                })
            })
            .collect()
    }

    /// Picks the serving site according to the overlap policy.
    ///
    /// Distance then site id break every remaining tie.
    fn associate(&self, poi: &PointOfInterest) -> Option<Placement<'a>> {
        let nearest = |a: &Placement<'_>, b: &Placement<'_>| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| a.site.ict_id.cmp(&b.site.ict_id))
                .then_with(|| a.site_index.cmp(&b.site_index))
        };

        let placements = self.placements(poi);
        match self.context.config.overlap_policy {
            OverlapPolicy::NearestSite => placements.into_iter().min_by(nearest),
            OverlapPolicy::LeastLoaded => placements.into_iter().min_by(|a, b| {
                self.load_order(a, b).then_with(|| nearest(a, b))
            }),
        }
    }

    /// Lighter sector populations first; sites without population data
    /// last.
    fn load_order(&self, a: &Placement<'_>, b: &Placement<'_>) -> Ordering {
        let load = |p: &Placement<'_>| match p.areas {
            SiteAreas::Rings(_) => Some(self.sector_population(p.ring_population(), p.sector)),
            SiteAreas::Shadowed | SiteAreas::OutsideExtent => None,
        };
        match (load(a), load(b)) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use mobile_capacity_config::{Band, BandBitrates, BitrateTable, example_config};
    use mobile_capacity_radio::capacity_figure;

    use super::*;

    #[test]
    fn equal_demand_and_capacity_is_sufficient() {
        assert_eq!(verdict(40.0, 40.0), Verdict::Sufficient);
        assert_eq!(verdict(40.0, 39.999), Verdict::Insufficient);
        assert_eq!(verdict(20.0, 64.5), Verdict::Sufficient);
    }

    #[test]
    fn population_throughput_matches_monthly_volume() {
        // 1000 people at 1 GB/month each.
        let mbps = population_mbps(1000.0, 1.0);
        let expected = 1000.0 * 8.0 * 1024.0_f64.powi(3) / (30.4 * 86_400.0) / 1e6;
        assert!((mbps - expected).abs() < 1e-12);
        assert!((mbps - 3.270_5).abs() < 1e-3, "{mbps}");
    }

    #[test]
    fn sessions_round_up() {
        // 666.67 people at 3.39 GB/month draw ~7.39 Mbps: one session.
        let sessions = population_sessions_mbps(2000.0 / 3.0, 3.39, 20.0);
        assert!((sessions - 20.0).abs() < 1e-12);

        // Ten times the population needs four sessions.
        let sessions = population_sessions_mbps(20_000.0 / 3.0, 3.39, 20.0);
        assert!((sessions - 80.0).abs() < 1e-12);

        assert!(population_sessions_mbps(0.0, 3.39, 20.0).abs() < 1e-12);
    }

    #[test]
    fn empty_sector_still_carries_the_point_session() {
        let config = example_config();
        let capacity = capacity_figure(&config);
        let load = SectorLoad::new(&config, &capacity, 3.39, 0.0, 900.0, 500.0).unwrap();
        assert!(load.upoprbu.abs() < 1e-12);
        assert!((load.cellavcap - capacity.available_resource_blocks).abs() < 1e-12);
        assert!((load.demand_mbps(&config) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn constant_bitrate_demand_counts_sessions() {
        let config = example_config();
        let capacity = capacity_figure(&config);
        let load = SectorLoad::new(&config, &capacity, 3.39, 2000.0 / 3.0, 900.0, 500.0).unwrap();
        // One population session plus the point, 20 Mbps each.
        assert!((load.demand_mbps(&config) - 40.0).abs() < 1e-9);
        assert!((load.rbdlthtarg - 200.0 / 9.0).abs() < 1e-9);
        assert!((load.cellavcap - (20.5 / 3.0 - 200.0 / 9.0)).abs() < 1e-9);
    }

    #[test]
    fn population_is_priced_at_the_ring_centre_and_the_point_at_its_distance() {
        let mut config = example_config();
        let mut table = BitrateTable::default();
        table.set_band(
            Band::L850,
            BandBitrates {
                distance_km: vec![0.6, 1.2, 2.0],
                kbps: vec![2000.0, 1000.0, 500.0],
            },
        );
        config.bitrate_table = Some(table);
        config.validate().unwrap();
        let capacity = capacity_figure(&config);

        // Ring centre at 500 m (2000 kbps), point at 1100 m (1000 kbps).
        let load = SectorLoad::new(&config, &capacity, 3.39, 2000.0 / 3.0, 1100.0, 500.0).unwrap();
        assert!((load.upoprbu - 10.0).abs() < 1e-9);
        assert!((load.rbdlthtarg - 20.0).abs() < 1e-9);
        assert!((load.demand_mbps(&config) - 27.0).abs() < 1e-9);

        assert!(SectorLoad::new(&config, &capacity, 3.39, 0.0, 2500.0, 500.0).is_none());
    }
}
