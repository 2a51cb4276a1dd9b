#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Capacity model.
//!
//! Capacity is counted in resource blocks. The configured spectrum gives the
//! resource blocks one sector can hand out during the busy hour:
//!
//! ```text
//! total_rbs     = (bw_l850 + bw_l1800 + bw_l2600) * rb_num_multiplier
//! usable_rbs    = total_rbs * (1 - cco / 100)
//! concentration = ((100 - nonbhu) / 100 / (24 - nbhours)) * 24
//! available_rbs = usable_rbs / sectors_per_site / max(concentration, 1)
//! ```
//!
//! Traffic is converted into resource blocks with the bitrate one block
//! achieves at the distance it is carried over ([`rb_bitrate_kbps`]).
//! Throughput figures in Mbps are resource blocks at the nominal
//! `rb_bitrate_kbps`.

use mobile_capacity_config::{Band, NetworkConfig};
use mobile_capacity_models::CapacityFigure;

const HOURS_PER_DAY: f64 = 24.0;

/// Computes the capacity figure of a validated configuration.
///
/// The result is strictly positive and grows with every bandwidth
/// parameter. It depends on the configuration only, so one figure serves
/// every site of a run.
#[must_use]
pub fn capacity_figure(config: &NetworkConfig) -> CapacityFigure {
    let total_resource_blocks = config.total_bandwidth() * config.rb_num_multiplier;
    let usable_resource_blocks = total_resource_blocks * (1.0 - config.cco / 100.0);
    let site_mbps = nominal_mbps(config, usable_resource_blocks);
    let sector_mbps = site_mbps / f64::from(config.sectors_per_site);
    let busy_hour_concentration = busy_hour_concentration(config);
    let available_resource_blocks = usable_resource_blocks
        / f64::from(config.sectors_per_site)
        / busy_hour_concentration.max(1.0);
    let available_mbps = nominal_mbps(config, available_resource_blocks);

    let figure = CapacityFigure {
        config_hash: config_hash(config),
        total_resource_blocks,
        usable_resource_blocks,
        site_mbps,
        sector_mbps,
        busy_hour_concentration,
        available_resource_blocks,
        available_mbps,
    };

    log::debug!(
        "Capacity: {total_resource_blocks} RBs ({usable_resource_blocks:.2} usable), \
         {site_mbps:.2} Mbps/site, {available_resource_blocks:.2} RBs \
         ({available_mbps:.3} Mbps) per sector in the busy hour"
    );

    figure
}

/// Usage per busy hour relative to a day with uniform usage.
///
/// The `24 - nbhours` busy hours share `100 - nonbhu` percent of daily
/// traffic. Values below 1 mean the busy hours are quieter than average;
/// [`capacity_figure`] then keeps the full sector throughput.
#[must_use]
pub fn busy_hour_concentration(config: &NetworkConfig) -> f64 {
    let busy_hours = HOURS_PER_DAY - f64::from(config.nbhours);
    let busy_share = (100.0 - config.nonbhu) / 100.0;
    busy_share / busy_hours * HOURS_PER_DAY
}

/// Downlink bitrate of one resource block at `distance_m` from the site,
/// in kbps.
///
/// Without a bitrate table every distance gets `rb_bitrate_kbps`. With
/// one, each configured band contributes the step reaching `distance_m`,
/// weighted by its share of the total bandwidth. Returns `None` when a
/// configured band has no step that far out.
#[must_use]
pub fn rb_bitrate_kbps(config: &NetworkConfig, distance_m: f64) -> Option<f64> {
    let Some(table) = &config.bitrate_table else {
        return Some(config.rb_bitrate_kbps);
    };

    let total = config.total_bandwidth();
    let distance_km = distance_m / 1000.0;
    Band::ALL
        .into_iter()
        .filter(|band| config.bandwidth(*band) > 0.0)
        .try_fold(0.0, |kbps, band| {
            let step = table.band(band)?.kbps_at(distance_km)?;
            Some(config.bandwidth(band).mul_add(step / total, kbps))
        })
}

/// Resource blocks needed to carry `mbps` to a receiver `distance_m` away.
#[must_use]
pub fn resource_blocks(config: &NetworkConfig, mbps: f64, distance_m: f64) -> Option<f64> {
    rb_bitrate_kbps(config, distance_m).map(|kbps| mbps * 1000.0 / kbps)
}

/// Throughput of `resource_blocks` at the nominal `rb_bitrate_kbps`, in
/// Mbps.
#[must_use]
pub fn nominal_mbps(config: &NetworkConfig, resource_blocks: f64) -> f64 {
    resource_blocks * config.rb_bitrate_kbps / 1000.0
}

/// MD5 digest of the parameters the capacity figure depends on.
#[must_use]
pub fn config_hash(config: &NetworkConfig) -> String {
    let canonical = format!(
        "bw_l850={:?};bw_l1800={:?};bw_l2600={:?};rb_num_multiplier={:?};\
         rb_bitrate_kbps={:?};cco={:?};sectors_per_site={};nbhours={};nonbhu={:?};\
         bitrate_table={:?}",
        config.bw_l850,
        config.bw_l1800,
        config.bw_l2600,
        config.rb_num_multiplier,
        config.rb_bitrate_kbps,
        config.cco,
        config.sectors_per_site,
        config.nbhours,
        config.nonbhu,
        config.bitrate_table,
    );

    let mut context = md5::Context::new();
    context.consume(canonical.as_bytes());
    format!("{:x}", context.finalize())
}

#[cfg(test)]
mod tests {
    use mobile_capacity_config::{BandBitrates, BitrateTable, example_config};

    use super::*;

    fn steps(distance_km: &[f64], kbps: &[f64]) -> BandBitrates {
        BandBitrates {
            distance_km: distance_km.to_vec(),
            kbps: kbps.to_vec(),
        }
    }

    #[test]
    fn example_configuration_figures() {
        let figure = capacity_figure(&example_config());
        assert!((figure.total_resource_blocks - 25.0).abs() < 1e-12);
        assert!((figure.usable_resource_blocks - 20.5).abs() < 1e-12);
        assert!((figure.site_mbps - 18.45).abs() < 1e-9);
        assert!((figure.sector_mbps - 6.15).abs() < 1e-9);
        // 14 busy hours carry half the daily traffic: quieter than average.
        assert!((figure.busy_hour_concentration - 24.0 / 28.0).abs() < 1e-12);
        assert!((figure.available_resource_blocks - 20.5 / 3.0).abs() < 1e-12);
        assert!((figure.available_mbps - 6.15).abs() < 1e-9);
    }

    #[test]
    fn concentrated_busy_hours_reduce_capacity() {
        let mut config = example_config();
        config.nbhours = 12;
        config.nonbhu = 20.0;
        let figure = capacity_figure(&config);
        // 12 busy hours carry 80% of the traffic.
        assert!((figure.busy_hour_concentration - 1.6).abs() < 1e-12);
        assert!((figure.available_mbps - 6.15 / 1.6).abs() < 1e-9);
    }

    #[test]
    fn available_never_exceeds_sector_throughput() {
        let mut config = example_config();
        for nbhours in [0, 6, 10, 16, 23] {
            for nonbhu in [0.0, 25.0, 50.0, 75.0, 99.0] {
                config.nbhours = nbhours;
                config.nonbhu = nonbhu;
                let figure = capacity_figure(&config);
                assert!(
                    figure.available_mbps <= figure.sector_mbps + 1e-12,
                    "nbhours={nbhours} nonbhu={nonbhu}: {} > {}",
                    figure.available_mbps,
                    figure.sector_mbps
                );
            }
        }
    }

    #[test]
    fn capacity_is_strictly_positive() {
        let mut config = example_config();
        config.bw_l850 = 0.0;
        config.bw_l2600 = 0.1;
        config.cco = 99.0;
        config.nonbhu = 0.0;
        config.validate().unwrap();
        assert!(capacity_figure(&config).available_mbps > 0.0);
    }

    #[test]
    fn capacity_grows_with_each_band() {
        let base = example_config();
        let baseline = capacity_figure(&base).available_mbps;

        for band in Band::ALL {
            let mut config = base.clone();
            match band {
                Band::L850 => config.bw_l850 += 10.0,
                Band::L1800 => config.bw_l1800 += 10.0,
                Band::L2600 => config.bw_l2600 += 10.0,
            }
            assert!(capacity_figure(&config).available_mbps > baseline, "{band}");
        }
    }

    #[test]
    fn constant_bitrate_without_table() {
        let config = example_config();
        assert_eq!(rb_bitrate_kbps(&config, 0.0), Some(900.0));
        assert_eq!(rb_bitrate_kbps(&config, 1900.0), Some(900.0));
        let rbs = resource_blocks(&config, 20.0, 900.0).unwrap();
        assert!((rbs - 200.0 / 9.0).abs() < 1e-12);
        assert!((nominal_mbps(&config, rbs) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn table_bitrate_is_weighted_by_band_share() {
        let mut config = example_config();
        config.bw_l850 = 5.0;
        config.bw_l1800 = 15.0;
        let mut table = BitrateTable::default();
        table.set_band(Band::L850, steps(&[1.0, 2.0], &[1000.0, 600.0]));
        table.set_band(Band::L1800, steps(&[0.5, 2.0], &[2000.0, 400.0]));
        config.bitrate_table = Some(table);
        config.validate().unwrap();

        // 0.4 km: 1/4 of 1000 + 3/4 of 2000.
        assert!((rb_bitrate_kbps(&config, 400.0).unwrap() - 1750.0).abs() < 1e-9);
        // 1.5 km: 1/4 of 600 + 3/4 of 400.
        assert!((rb_bitrate_kbps(&config, 1500.0).unwrap() - 450.0).abs() < 1e-9);
        assert_eq!(rb_bitrate_kbps(&config, 2500.0), None);
    }

    #[test]
    fn far_receivers_need_more_resource_blocks() {
        let mut config = example_config();
        let mut table = BitrateTable::default();
        table.set_band(Band::L850, steps(&[1.0, 2.0], &[1200.0, 300.0]));
        config.bitrate_table = Some(table);

        let near = resource_blocks(&config, 20.0, 800.0).unwrap();
        let far = resource_blocks(&config, 20.0, 1800.0).unwrap();
        assert!((far / near - 4.0).abs() < 1e-12);
    }

    #[test]
    fn hash_tracks_capacity_parameters_only() {
        let base = example_config();
        let hash = config_hash(&base);
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, config_hash(&base.clone()));

        let mut radii = base.clone();
        radii.max_radius = 5000;
        assert_eq!(config_hash(&radii), hash);

        let mut table = base.clone();
        let mut steps_table = BitrateTable::default();
        steps_table.set_band(Band::L850, steps(&[2.0], &[900.0]));
        table.bitrate_table = Some(steps_table);
        assert_ne!(config_hash(&table), hash);

        let mut overhead = base;
        overhead.cco = 20.0;
        assert_ne!(config_hash(&overhead), hash);
    }
}
