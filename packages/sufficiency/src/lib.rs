#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Capacity sufficiency evaluation.
//!
//! A run derives its [`RunContext`] (validated configuration, capacity and
//! demand figures, population dataset) once, generates and samples the ring
//! ladder around every cell site in parallel, then associates each point of
//! interest with a serving site and compares the demand of the point's
//! sector against the sector's available capacity.

pub mod areas;
pub mod context;
pub mod evaluate;
pub mod progress;
pub mod run;

pub use areas::{BufferAreas, RingArea, SiteAreas};
pub use context::RunContext;
pub use evaluate::{Evaluator, SectorLoad, verdict};
pub use progress::{RunProgress, RunStage, SilentProgress, VerdictTally, silent_progress};
pub use run::{RunInputs, RunOutput, default_concurrency, run};

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The network configuration is invalid.
    #[error(transparent)]
    Config(#[from] mobile_capacity_config::ConfigError),

    /// Demand could not be estimated.
    #[error(transparent)]
    Demand(#[from] mobile_capacity_demand::DemandError),

    /// The population source failed.
    #[error(transparent)]
    Population(#[from] mobile_capacity_population::PopulationError),

    /// Geometry could not be built.
    #[error(transparent)]
    Spatial(#[from] mobile_capacity_spatial::SpatialError),

    /// A site worker was handed a position outside the run's site list.
    #[error("No cell site at position {0}")]
    UnknownSite(usize),

    /// A site worker panicked.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
