//! Read-only state shared by every stage of a run.

use mobile_capacity_config::NetworkConfig;
use mobile_capacity_demand::ReferenceStatistics;
use mobile_capacity_models::{CapacityFigure, DemandFigure};
use mobile_capacity_population::DatasetKey;
use mobile_capacity_spatial::BufferGenerator;

use crate::RunError;

/// Everything derived once per run before any site is processed.
///
/// Built up front so configuration and reference-data failures abort the
/// run before a single ring is generated; shared through an `Arc` with the
/// site workers afterwards.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Validated network configuration.
    pub config: NetworkConfig,
    /// Per-sector capacity, identical for every site.
    pub capacity: CapacityFigure,
    /// Per-capita traffic demand of the country.
    pub demand: DemandFigure,
    /// Population dataset the rings are sampled from.
    pub dataset: DatasetKey,
    /// Ring (and wedge) generator for the configured ladder.
    pub generator: BufferGenerator,
}

impl RunContext {
    /// Validates `config` and derives the run's capacity and demand.
    ///
    /// # Errors
    ///
    /// * [`RunError::Config`] if the configuration is invalid
    /// * [`RunError::Demand`] if no traffic statistic exists for the country
    pub fn new(
        config: NetworkConfig,
        country_code: &str,
        statistics: &dyn ReferenceStatistics,
    ) -> Result<Self, RunError> {
        config.validate()?;

        let demand = mobile_capacity_demand::estimate(&config, country_code, statistics)?;
        let capacity = mobile_capacity_radio::capacity_figure(&config);
        let dataset = DatasetKey::from_config(&config, &demand.country_code);
        let generator = BufferGenerator::from_config(&config);

        log::info!(
            "Run context for {}: {:.3} Mbps available per sector (config {}), dataset {}",
            demand.country_code,
            capacity.available_mbps,
            capacity.config_hash,
            dataset
        );

        Ok(Self {
            config,
            capacity,
            demand,
            dataset,
            generator,
        })
    }

    /// ISO3 code of the country being evaluated.
    #[must_use]
    pub fn country_code(&self) -> &str {
        &self.demand.country_code
    }
}
