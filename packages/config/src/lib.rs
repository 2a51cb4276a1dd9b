#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Network configuration for a capacity run.
//!
//! [`NetworkConfig`] is deserialized from TOML, filled with defaults where
//! a parameter is optional, and validated once up front. A configuration
//! that fails [`NetworkConfig::validate`] never reaches the computation:
//! every offending parameter is reported in a single
//! [`ConfigError::Invalid`].

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Example configuration shipped with the CLI (`init-config`).
pub const EXAMPLE_CONFIG: &str = include_str!("../configs/example.toml");

/// Errors that can occur while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// One or more parameters violate their invariants.
    #[error("Invalid configuration: {}", join_problems(.problems))]
    Invalid {
        /// Every violation found, in field order.
        problems: Vec<ConfigProblem>,
    },

    /// The TOML document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("Failed to read configuration {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A single invariant violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigProblem {
    /// Name of the offending parameter.
    pub parameter: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl std::fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.parameter, self.message)
    }
}

fn join_problems(problems: &[ConfigProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// How a point is associated with a site when several sites are within
/// reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// The nearest site within the maximum radius (ties: lowest id).
    ///
    /// Ring indices grow with distance, so the nearest site is also the one
    /// whose enclosing ring is narrowest.
    #[default]
    NearestSite,
    /// The site whose ring (or wedge) at the point's distance holds the
    /// fewest people (ties: nearest, then lowest id).
    LeastLoaded,
}

/// Spectrum band groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Band {
    /// L700 to L900.
    L850,
    /// L1800 to L2100.
    L1800,
    /// L2300 to L2600.
    L2600,
}

impl Band {
    /// Every band, lowest frequency first.
    pub const ALL: [Self; 3] = [Self::L850, Self::L1800, Self::L2600];

    /// Column name used by bitrate table files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L850 => "L850",
            Self::L1800 => "L1800",
            Self::L2600 => "L2600",
        }
    }

    /// Name of the bandwidth parameter.
    #[must_use]
    pub const fn parameter(self) -> &'static str {
        match self {
            Self::L850 => "bw_l850",
            Self::L1800 => "bw_l1800",
            Self::L2600 => "bw_l2600",
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Achievable downlink bitrate of one resource block by distance from the
/// site, for one band.
///
/// Step `i` applies up to `distance_km[i]`; a distance is served by the
/// first step that reaches it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandBitrates {
    /// Upper distance bound of each step in km, strictly increasing.
    pub distance_km: Vec<f64>,
    /// Bitrate of one resource block within each step, in kbps.
    pub kbps: Vec<f64>,
}

impl BandBitrates {
    /// Bitrate at `distance_km`, or `None` beyond the last step.
    #[must_use]
    pub fn kbps_at(&self, distance_km: f64) -> Option<f64> {
        if distance_km.is_nan() {
            return None;
        }
        let step = self.distance_km.partition_point(|&d| d < distance_km);
        self.kbps.get(step).copied()
    }

    /// Distance covered by the last step, in km.
    #[must_use]
    pub fn reach_km(&self) -> Option<f64> {
        self.distance_km.last().copied()
    }

    fn problem(&self, max_radius_m: u32) -> Option<String> {
        if self.distance_km.is_empty() {
            return Some("no steps".to_string());
        }
        if self.distance_km.len() != self.kbps.len() {
            return Some(format!(
                "{} distances but {} bitrates",
                self.distance_km.len(),
                self.kbps.len()
            ));
        }
        if self.distance_km.iter().any(|d| !d.is_finite() || *d <= 0.0)
            || self.distance_km.windows(2).any(|w| w[1] <= w[0])
        {
            return Some("distances must be positive and strictly increasing".to_string());
        }
        if let Some(kbps) = self.kbps.iter().find(|k| !k.is_finite() || **k <= 0.0) {
            return Some(format!("bitrates must be > 0 kbps, got {kbps}"));
        }
        let reach_km = self.reach_km().unwrap_or(0.0);
        if reach_km * 1000.0 < f64::from(max_radius_m) {
            return Some(format!(
                "reaches {reach_km} km but rings extend to {} km",
                f64::from(max_radius_m) / 1000.0
            ));
        }
        None
    }
}

/// Per-band distance/bitrate steps replacing the constant
/// `rb_bitrate_kbps`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BitrateTable {
    /// Steps of the L700 to L900 band.
    #[serde(default, alias = "L850", skip_serializing_if = "Option::is_none")]
    pub l850: Option<BandBitrates>,
    /// Steps of the L1800 to L2100 band.
    #[serde(default, alias = "L1800", skip_serializing_if = "Option::is_none")]
    pub l1800: Option<BandBitrates>,
    /// Steps of the L2300 to L2600 band.
    #[serde(default, alias = "L2600", skip_serializing_if = "Option::is_none")]
    pub l2600: Option<BandBitrates>,
}

impl BitrateTable {
    /// Steps of `band`, if the table has any.
    #[must_use]
    pub const fn band(&self, band: Band) -> Option<&BandBitrates> {
        match band {
            Band::L850 => self.l850.as_ref(),
            Band::L1800 => self.l1800.as_ref(),
            Band::L2600 => self.l2600.as_ref(),
        }
    }

    /// Replaces the steps of `band`.
    pub fn set_band(&mut self, band: Band, steps: BandBitrates) {
        let slot = match band {
            Band::L850 => &mut self.l850,
            Band::L1800 => &mut self.l1800,
            Band::L2600 => &mut self.l2600,
        };
        *slot = Some(steps);
    }
}

/// Radio network, traffic profile and buffer ladder parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// MHz on the L700 to L900 spectrum.
    #[serde(default, alias = "bw_L850")]
    pub bw_l850: f64,
    /// MHz on the L1800 to L2100 spectrum.
    #[serde(default, alias = "bw_L1800")]
    pub bw_l1800: f64,
    /// MHz on the L2300 to L2600 spectrum.
    #[serde(default, alias = "bw_L2600")]
    pub bw_l2600: f64,
    /// Resource blocks per MHz.
    #[serde(default = "default_rb_num_multiplier")]
    pub rb_num_multiplier: f64,
    /// Downlink throughput of one resource block in kbps. Demand and
    /// capacity are reported in Mbps at this rate.
    #[serde(default = "default_rb_bitrate_kbps")]
    pub rb_bitrate_kbps: f64,
    /// Distance-dependent resource block bitrates per band. When unset,
    /// every distance gets `rb_bitrate_kbps`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_table: Option<BitrateTable>,
    /// Control channel overhead in %.
    pub cco: f64,
    /// Number of sectors per site.
    #[serde(default = "default_sectors_per_site")]
    pub sectors_per_site: u16,
    /// Split rings into sector wedges.
    #[serde(default)]
    pub sectorized: bool,
    /// Vertices used to sample a wedge arc.
    pub angles_num: u16,
    /// Half-width of a sector wedge in degrees.
    pub rotation_angle: f64,
    /// Download throughput target per point in Mbps.
    pub dlthtarg: f64,
    /// Active mobile-broadband subscriptions per 100 people.
    pub mbb_subscr: f64,
    /// Share of the population using the operator, in %.
    #[serde(default = "default_oppopshare")]
    pub oppopshare: f64,
    /// Population dataset year.
    #[serde(default = "default_dataset_year")]
    pub dataset_year: u16,
    /// Use the 1 km aggregated population raster.
    #[serde(default = "default_true")]
    pub one_km_res: bool,
    /// Use the UN-adjusted population raster.
    #[serde(default = "default_true")]
    pub un_adjusted: bool,
    /// Innermost ring radius in meters.
    pub min_radius: u32,
    /// Outermost ring radius in meters.
    pub max_radius: u32,
    /// Radius increment between rings in meters.
    pub radius_step: u32,
    /// Number of non-busy hours per day.
    #[serde(default = "default_nbhours")]
    pub nbhours: u8,
    /// Share of daily usage falling in non-busy hours, in %.
    pub nonbhu: f64,
    /// Year of the traffic statistic; the latest available when unset.
    #[serde(default)]
    pub reference_year: Option<u16>,
    /// Association rule for points within reach of several sites.
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
    /// Clip each site's rings to its Voronoi cell among neighbouring sites.
    #[serde(default = "default_true")]
    pub clip_to_service_area: bool,
}

const fn default_rb_num_multiplier() -> f64 {
    5.0
}

const fn default_rb_bitrate_kbps() -> f64 {
    900.0
}

const fn default_sectors_per_site() -> u16 {
    3
}

const fn default_oppopshare() -> f64 {
    50.0
}

const fn default_dataset_year() -> u16 {
    2020
}

const fn default_nbhours() -> u8 {
    10
}

const fn default_true() -> bool {
    true
}

impl NetworkConfig {
    /// Total configured bandwidth in MHz.
    #[must_use]
    pub fn total_bandwidth(&self) -> f64 {
        self.bw_l850 + self.bw_l1800 + self.bw_l2600
    }

    /// Bandwidth of one band in MHz.
    #[must_use]
    pub const fn bandwidth(&self, band: Band) -> f64 {
        match band {
            Band::L850 => self.bw_l850,
            Band::L1800 => self.bw_l1800,
            Band::L2600 => self.bw_l2600,
        }
    }

    /// Number of rings in the buffer ladder.
    ///
    /// Only meaningful on a validated configuration.
    #[must_use]
    pub const fn ring_count(&self) -> usize {
        ((self.max_radius - self.min_radius) / self.radius_step) as usize + 1
    }

    /// Checks every invariant and reports all violations at once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing each offending parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        let mut problem = |parameter: &'static str, message: String| {
            problems.push(ConfigProblem { parameter, message });
        };

        for band in Band::ALL {
            let value = self.bandwidth(band);
            if !value.is_finite() || value < 0.0 {
                problem(
                    band.parameter(),
                    format!("bandwidth must be >= 0 MHz, got {value}"),
                );
            }
        }
        if self.total_bandwidth().is_nan() || self.total_bandwidth() <= 0.0 {
            problem(
                "bw_*",
                "at least one band must have a positive bandwidth".to_string(),
            );
        }
        if self.rb_num_multiplier.is_nan() || self.rb_num_multiplier <= 0.0 {
            problem(
                "rb_num_multiplier",
                format!("must be > 0, got {}", self.rb_num_multiplier),
            );
        }
        if self.rb_bitrate_kbps.is_nan() || self.rb_bitrate_kbps <= 0.0 {
            problem(
                "rb_bitrate_kbps",
                format!("must be > 0, got {}", self.rb_bitrate_kbps),
            );
        }

        for (name, value) in [
            ("cco", self.cco),
            ("oppopshare", self.oppopshare),
            ("nonbhu", self.nonbhu),
        ] {
            if !(0.0..=100.0).contains(&value) {
                problem(name, format!("percentage must lie in [0, 100], got {value}"));
            }
        }
        if (self.cco - 100.0).abs() < f64::EPSILON {
            problem("cco", "100% overhead leaves no capacity".to_string());
        }
        if (self.nonbhu - 100.0).abs() < f64::EPSILON {
            problem(
                "nonbhu",
                "100% non-busy-hour usage leaves no busy-hour traffic".to_string(),
            );
        }

        if self.mbb_subscr.is_nan() || self.mbb_subscr < 0.0 {
            problem("mbb_subscr", format!("must be >= 0, got {}", self.mbb_subscr));
        }
        if self.dlthtarg.is_nan() || self.dlthtarg <= 0.0 {
            problem("dlthtarg", format!("must be > 0 Mbps, got {}", self.dlthtarg));
        }

        if self.sectors_per_site == 0 {
            problem("sectors_per_site", "must be at least 1".to_string());
        }
        if self.angles_num < 2 {
            problem(
                "angles_num",
                format!("must be at least 2, got {}", self.angles_num),
            );
        }
        if self.rotation_angle.is_nan() || self.rotation_angle <= 0.0 {
            problem(
                "rotation_angle",
                format!("must be > 0 degrees, got {}", self.rotation_angle),
            );
        } else if 2.0 * self.rotation_angle * f64::from(self.sectors_per_site) > 360.0 + 1e-9 {
            problem(
                "rotation_angle",
                format!(
                    "{} sectors of +/-{} degrees overlap",
                    self.sectors_per_site, self.rotation_angle
                ),
            );
        }

        if self.nbhours >= 24 {
            problem("nbhours", format!("must be < 24, got {}", self.nbhours));
        }

        if self.radius_step == 0 {
            problem("radius_step", "must be > 0".to_string());
        }
        if self.min_radius == 0 {
            problem("min_radius", "must be > 0".to_string());
        }
        if self.max_radius < self.min_radius {
            problem(
                "max_radius",
                format!(
                    "must be >= min_radius ({}), got {}",
                    self.min_radius, self.max_radius
                ),
            );
        } else if self.radius_step > 0 && (self.max_radius - self.min_radius) % self.radius_step != 0
        {
            problem(
                "max_radius",
                format!(
                    "{} is not reachable from {} in steps of {}",
                    self.max_radius, self.min_radius, self.radius_step
                ),
            );
        }

        if let Some(table) = &self.bitrate_table {
            for band in Band::ALL.into_iter().filter(|b| self.bandwidth(*b) > 0.0) {
                let message = match table.band(band) {
                    None => Some("no steps".to_string()),
                    Some(steps) => steps.problem(self.max_radius),
                };
                if let Some(message) = message {
                    problem("bitrate_table", format!("{band}: {message}"));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }
}

/// Parses and validates a configuration from a TOML string.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML and
/// [`ConfigError::Invalid`] for invariant violations.
pub fn parse_config_toml(toml_str: &str) -> Result<NetworkConfig, ConfigError> {
    let config: NetworkConfig = toml::de::from_str(toml_str)?;
    config.validate()?;
    Ok(config)
}

/// Reads, parses and validates a configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
/// errors of [`parse_config_toml`].
pub fn load_config(path: &Path) -> Result<NetworkConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let config = parse_config_toml(&contents)?;
    log::info!(
        "Loaded network configuration from {} ({} rings, {} MHz)",
        path.display(),
        config.ring_count(),
        config.total_bandwidth()
    );
    Ok(config)
}

/// Returns the parsed example configuration.
///
/// # Panics
///
/// Panics if the embedded example is malformed (covered by tests).
#[must_use]
pub fn example_config() -> NetworkConfig {
    parse_config_toml(EXAMPLE_CONFIG)
        .unwrap_or_else(|e| panic!("Failed to parse embedded example.toml: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problems_of(config: &NetworkConfig) -> Vec<&'static str> {
        match config.validate() {
            Err(ConfigError::Invalid { problems }) => {
                problems.iter().map(|p| p.parameter).collect()
            }
            Ok(()) => vec![],
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn example_config_is_valid() {
        let config = example_config();
        assert!((config.bw_l850 - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.ring_count(), 3);
    }

    #[test]
    fn applies_defaults_for_optional_parameters() {
        let config = parse_config_toml(
            "bw_L850 = 10.0\n\
             cco = 18.0\n\
             angles_num = 30\n\
             rotation_angle = 60.0\n\
             dlthtarg = 20.0\n\
             mbb_subscr = 80.0\n\
             min_radius = 1000\n\
             max_radius = 3000\n\
             radius_step = 1000\n\
             nonbhu = 50.0\n",
        )
        .unwrap();

        assert_eq!(config.sectors_per_site, 3);
        assert!((config.rb_num_multiplier - 5.0).abs() < f64::EPSILON);
        assert!((config.oppopshare - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.dataset_year, 2020);
        assert!(config.one_km_res);
        assert!(config.un_adjusted);
        assert_eq!(config.nbhours, 10);
        assert_eq!(config.overlap_policy, OverlapPolicy::NearestSite);
        assert!(config.clip_to_service_area);
        assert!(!config.sectorized);
        assert_eq!(config.reference_year, None);
    }

    #[test]
    fn degenerate_ladder_is_valid() {
        let mut config = example_config();
        config.min_radius = 1000;
        config.max_radius = 1000;
        config.radius_step = 500;
        assert!(config.validate().is_ok());
        assert_eq!(config.ring_count(), 1);
    }

    #[test]
    fn rejects_unreachable_max_radius() {
        let mut config = example_config();
        config.max_radius = 2200;
        assert_eq!(problems_of(&config), vec!["max_radius"]);
    }

    #[test]
    fn rejects_zero_step() {
        let mut config = example_config();
        config.radius_step = 0;
        assert_eq!(problems_of(&config), vec!["radius_step"]);
    }

    #[test]
    fn reports_every_out_of_range_percentage() {
        let mut config = example_config();
        config.cco = 120.0;
        config.oppopshare = -1.0;
        config.nonbhu = 100.0;
        assert_eq!(problems_of(&config), vec!["cco", "oppopshare", "nonbhu"]);
    }

    #[test]
    fn rejects_overlapping_sectors() {
        let mut config = example_config();
        config.rotation_angle = 90.0;
        assert_eq!(problems_of(&config), vec!["rotation_angle"]);
    }

    #[test]
    fn rejects_missing_bandwidth() {
        let mut config = example_config();
        config.bw_l850 = 0.0;
        assert_eq!(problems_of(&config), vec!["bw_*"]);
    }

    #[test]
    fn error_message_names_parameters() {
        let mut config = example_config();
        config.nbhours = 24;
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("nbhours"), "{message}");
    }

    fn table_config() -> NetworkConfig {
        let toml = format!(
            "{EXAMPLE_CONFIG}\n\
             [bitrate_table.L850]\n\
             distance_km = [0.5, 1.0, 2.0]\n\
             kbps = [1400.0, 900.0, 450.0]\n"
        );
        parse_config_toml(&toml).unwrap()
    }

    #[test]
    fn parses_bitrate_table() {
        let config = table_config();
        let steps = config.bitrate_table.as_ref().unwrap().band(Band::L850).unwrap();
        assert_eq!(steps.distance_km, vec![0.5, 1.0, 2.0]);
        assert_eq!(steps.reach_km(), Some(2.0));
    }

    #[test]
    fn bitrate_steps_apply_up_to_their_distance() {
        let config = table_config();
        let steps = config.bitrate_table.as_ref().unwrap().band(Band::L850).unwrap();
        assert_eq!(steps.kbps_at(0.0), Some(1400.0));
        assert_eq!(steps.kbps_at(0.5), Some(1400.0));
        assert_eq!(steps.kbps_at(0.75), Some(900.0));
        assert_eq!(steps.kbps_at(2.0), Some(450.0));
        assert_eq!(steps.kbps_at(2.01), None);
        assert_eq!(steps.kbps_at(f64::NAN), None);
    }

    #[test]
    fn bitrate_table_must_reach_max_radius() {
        let mut config = table_config();
        config.max_radius = 2500;
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("bitrate_table: L850: reaches 2 km"), "{message}");
    }

    #[test]
    fn bitrate_table_must_cover_every_configured_band() {
        let mut config = table_config();
        config.bw_l1800 = 10.0;
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("L1800: no steps"), "{message}");

        // A band without bandwidth needs no steps.
        config.bw_l1800 = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unsorted_or_mismatched_steps() {
        let mut config = table_config();
        let table = config.bitrate_table.as_mut().unwrap();
        table.set_band(
            Band::L850,
            BandBitrates {
                distance_km: vec![1.0, 0.5, 2.0],
                kbps: vec![900.0, 800.0, 700.0],
            },
        );
        assert_eq!(problems_of(&config), vec!["bitrate_table"]);

        let table = config.bitrate_table.as_mut().unwrap();
        table.set_band(
            Band::L850,
            BandBitrates {
                distance_km: vec![0.5, 2.0],
                kbps: vec![900.0],
            },
        );
        assert_eq!(problems_of(&config), vec!["bitrate_table"]);
    }

    #[test]
    fn parses_least_loaded_policy() {
        let toml = EXAMPLE_CONFIG.replace(
            "overlap_policy = \"nearest_site\"",
            "overlap_policy = \"least_loaded\"",
        );
        let config = parse_config_toml(&toml).unwrap();
        assert_eq!(config.overlap_policy, OverlapPolicy::LeastLoaded);
    }

    #[test]
    fn rejects_unknown_fields() {
        let toml = format!("{EXAMPLE_CONFIG}\nbw_l900 = 5.0\n");
        assert!(matches!(
            parse_config_toml(&toml),
            Err(ConfigError::Parse(_))
        ));
    }
}
