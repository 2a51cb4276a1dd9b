#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Entity and result types for the mobile capacity sufficiency engine.
//!
//! Input entities ([`PointOfInterest`], [`CellSite`]) are immutable once
//! loaded. Everything else in this crate is derived during a single run and
//! never mutated after creation: each pipeline stage produces new values.

pub use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// A location (e.g. a school) whose connectivity need is being assessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    /// Stable identifier from the input dataset.
    pub poi_id: String,
    /// WGS84 latitude.
    pub lat: f64,
    /// WGS84 longitude.
    pub lon: f64,
}

/// Radio access technology advertised by a cell site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RadioType {
    /// Technology not reported by the source dataset.
    #[default]
    #[serde(rename = "unknown", alias = "")]
    Unknown,
    /// GSM.
    #[serde(rename = "2G")]
    G2,
    /// UMTS.
    #[serde(rename = "3G")]
    G3,
    /// LTE.
    #[serde(rename = "4G")]
    G4,
    /// NR.
    #[serde(rename = "5G")]
    G5,
}

impl RadioType {
    /// Returns the tag used in input and output files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::G2 => "2G",
            Self::G3 => "3G",
            Self::G4 => "4G",
            Self::G5 => "5G",
        }
    }
}

impl std::fmt::Display for RadioType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical radio installation providing coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSite {
    /// Site identifier (`ict_id` in the source datasets).
    pub ict_id: String,
    /// WGS84 latitude.
    pub lat: f64,
    /// WGS84 longitude.
    pub lon: f64,
    /// Radio technology tag.
    #[serde(default)]
    pub radio_type: RadioType,
}

/// Angular span of one sector wedge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorSpan {
    /// Zero-based sector index around the site.
    pub index: u16,
    /// Centre bearing in degrees, clockwise from north.
    pub bearing_deg: f64,
    /// Half-width of the wedge in degrees.
    pub half_width_deg: f64,
}

/// Identifies a ring (or wedge) by anchor and outer radius.
///
/// Ordering is by anchor id, then radius, then sector, so maps keyed by
/// [`RingKey`] iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RingKey {
    /// Identifier of the anchor the ring was generated around.
    pub anchor_id: String,
    /// Outer radius in meters.
    pub outer_radius: u32,
    /// Sector index when the ring is split into wedges.
    pub sector: Option<u16>,
}

/// An annular (or wedge) geometry at a fixed radius band around an anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferRing {
    /// Identifier of the anchor (cell site) the ring surrounds.
    pub anchor_id: String,
    /// Position in the ring ladder, innermost first.
    pub ring_index: usize,
    /// Inner radius in meters (0 for the innermost disk).
    pub inner_radius: u32,
    /// Outer radius in meters.
    pub outer_radius: u32,
    /// Sector wedge span, if the ring was sectorized.
    pub sector: Option<SectorSpan>,
    /// Clipped geometry in WGS84 lon/lat. May be empty after clipping.
    pub geometry: MultiPolygon<f64>,
}

impl BufferRing {
    /// Returns the key identifying this ring.
    #[must_use]
    pub fn key(&self) -> RingKey {
        RingKey {
            anchor_id: self.anchor_id.clone(),
            outer_radius: self.outer_radius,
            sector: self.sector.map(|s| s.index),
        }
    }

    /// Distance from the anchor to the middle of the radius band.
    #[must_use]
    pub fn centre_distance(&self) -> f64 {
        f64::from(self.inner_radius + self.outer_radius) / 2.0
    }

    /// Whether clipping removed the whole ring.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }
}

/// Population found within one ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSample {
    /// Ring the population was aggregated over.
    pub key: RingKey,
    /// Area-weighted population count.
    pub population: f64,
}

/// Available downlink throughput derived from a network configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityFigure {
    /// Digest of the capacity-relevant configuration parameters.
    pub config_hash: String,
    /// Resource blocks across all configured bands.
    pub total_resource_blocks: f64,
    /// Resource blocks left after control channel overhead.
    pub usable_resource_blocks: f64,
    /// Downlink throughput of a whole site in Mbps.
    pub site_mbps: f64,
    /// Downlink throughput of one sector in Mbps.
    pub sector_mbps: f64,
    /// Busy-hour usage per hour relative to a uniform day.
    pub busy_hour_concentration: f64,
    /// Resource blocks available per sector after busy-hour adjustment.
    pub available_resource_blocks: f64,
    /// `available_resource_blocks` at the nominal resource block bitrate,
    /// in Mbps.
    pub available_mbps: f64,
}

/// Per-subscriber traffic volume used by every evaluation in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandFigure {
    /// ISO3 country code.
    pub country_code: String,
    /// Mobile broadband traffic per subscriber per month, in GB.
    pub udatavmonth_pu: f64,
    /// Year of the reference statistic.
    pub udatavmonth_year: u16,
    /// Expected monthly volume per inhabitant after subscription and
    /// operator share scaling, in GB.
    pub gb_per_capita_month: f64,
}

/// Outcome of comparing modeled demand to modeled capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Demand fits within available capacity.
    Sufficient,
    /// Demand exceeds available capacity, or no site serves the point.
    Insufficient,
    /// Inputs did not allow a verdict (e.g. rings outside the raster).
    Indeterminate,
}

impl Verdict {
    /// Boolean view used by the `sufcapch` output column.
    #[must_use]
    pub const fn sufcapch(self) -> Option<bool> {
        match self {
            Self::Sufficient => Some(true),
            Self::Insufficient => Some(false),
            Self::Indeterminate => None,
        }
    }
}

/// Why a result row carries the verdict it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Demand and capacity were both computed.
    Evaluated,
    /// No cell site within the maximum radius.
    Uncovered,
    /// The associated site's rings fall outside the population raster or
    /// the study area.
    OutsideRasterExtent,
}

impl ResultStatus {
    /// Returns the tag written to result files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evaluated => "evaluated",
            Self::Uncovered => "uncovered",
            Self::OutsideRasterExtent => "outside_raster_extent",
        }
    }
}

/// One row of the sufficiency result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SufficiencyResult {
    /// Point of interest identifier.
    pub poi_id: String,
    /// Point latitude.
    pub lat: f64,
    /// Point longitude.
    pub lon: f64,
    /// Associated cell site, if any.
    pub ict_id: Option<String>,
    /// Ground distance to the associated site in meters.
    pub distance_m: Option<f64>,
    /// Outer radius of the smallest ring containing the point.
    pub ring_outer_radius: Option<u32>,
    /// Sector wedge containing the point, when sectorized.
    pub sector: Option<u16>,
    /// Population of the containing ring (or wedge).
    pub ring_population: f64,
    /// Population over all rings of the associated site.
    pub site_population: f64,
    /// Resource blocks the point's own target session needs at its distance.
    pub rbdlthtarg: f64,
    /// Resource blocks used by the sector population of the containing ring.
    pub upoprbu: f64,
    /// Resource blocks left in the sector once the population is served.
    pub cellavcap: f64,
    /// Aggregated demand in Mbps (`rbdlthtarg + upoprbu` resource blocks at
    /// the nominal bitrate).
    pub demand_mbps: f64,
    /// Available sector capacity in Mbps; 0 when no site serves the point.
    pub capacity_mbps: f64,
    /// Sufficiency verdict.
    pub verdict: Verdict,
    /// Reason for the verdict.
    pub status: ResultStatus,
}

impl SufficiencyResult {
    /// `true` when demand fits, `false` when it does not, `None` when
    /// indeterminate.
    #[must_use]
    pub const fn sufcapch(&self) -> Option<bool> {
        self.verdict.sufcapch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_keys_order_by_anchor_then_radius() {
        let mut keys = vec![
            RingKey {
                anchor_id: "b".to_string(),
                outer_radius: 1000,
                sector: None,
            },
            RingKey {
                anchor_id: "a".to_string(),
                outer_radius: 1500,
                sector: None,
            },
            RingKey {
                anchor_id: "a".to_string(),
                outer_radius: 1000,
                sector: Some(2),
            },
        ];
        keys.sort();
        assert_eq!(keys[0].anchor_id, "a");
        assert_eq!(keys[0].outer_radius, 1000);
        assert_eq!(keys[1].outer_radius, 1500);
        assert_eq!(keys[2].anchor_id, "b");
    }

    #[test]
    fn verdict_maps_to_sufcapch() {
        assert_eq!(Verdict::Sufficient.sufcapch(), Some(true));
        assert_eq!(Verdict::Insufficient.sufcapch(), Some(false));
        assert_eq!(Verdict::Indeterminate.sufcapch(), None);
    }

    #[test]
    fn centre_distance_is_band_midpoint() {
        let ring = BufferRing {
            anchor_id: "s1".to_string(),
            ring_index: 1,
            inner_radius: 1000,
            outer_radius: 1500,
            sector: None,
            geometry: MultiPolygon(vec![]),
        };
        assert!((ring.centre_distance() - 1250.0).abs() < f64::EPSILON);
        assert!(ring.is_empty());
    }

    #[test]
    fn radio_type_tags_round_trip_through_display() {
        assert_eq!(RadioType::G4.to_string(), "4G");
        assert_eq!(RadioType::default(), RadioType::Unknown);
    }
}
