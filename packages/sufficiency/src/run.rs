//! The run pipeline: sites in parallel, then points in input order.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::stream::{self, StreamExt as _};
use geo::MultiPolygon;
use mobile_capacity_models::{CapacityFigure, CellSite, DemandFigure, PointOfInterest, SufficiencyResult};
use mobile_capacity_population::PopulationSource;
use mobile_capacity_spatial::{ClipRegion, SiteIndex};

use crate::RunError;
use crate::areas::{BufferAreas, SiteAreas, compute_site};
use crate::context::RunContext;
use crate::evaluate::Evaluator;
use crate::progress::{RunProgress, RunStage, VerdictTally};

/// Input records of a run.
pub struct RunInputs {
    /// Points to evaluate, in output order.
    pub pois: Vec<PointOfInterest>,
    /// Cell sites; duplicate ids are dropped keeping the first.
    pub sites: Vec<CellSite>,
    /// Population counts for the run's dataset.
    pub population: Arc<dyn PopulationSource>,
    /// Optional study-area boundary every ring is clipped to.
    pub study_area: Option<MultiPolygon<f64>>,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Rings and buffers of every processed site.
    pub buffer_areas: BufferAreas,
    /// One row per point of interest, in input order.
    pub poi_sufcapch_result: Vec<SufficiencyResult>,
    /// Demand figure the run used.
    pub demand: DemandFigure,
    /// Capacity figure the run used.
    pub capacity: CapacityFigure,
}

impl RunOutput {
    /// Result rows counted by outcome.
    #[must_use]
    pub fn tally(&self) -> VerdictTally {
        self.poi_sufcapch_result.iter().collect()
    }
}

/// Default number of parallel site workers.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Drops sites whose `ict_id` was already seen, keeping the first.
#[must_use]
pub fn dedupe_sites(sites: Vec<CellSite>) -> Vec<CellSite> {
    let mut seen = BTreeSet::new();
    let mut kept = Vec::with_capacity(sites.len());
    for site in sites {
        if seen.insert(site.ict_id.clone()) {
            kept.push(site);
        } else {
            log::warn!("Dropping duplicate cell site {}", site.ict_id);
        }
    }
    kept
}

/// Runs the sufficiency analysis.
///
/// Sites are processed on blocking workers, at most `concurrency` at a
/// time, and collected in input order so repeated runs produce identical
/// output.
///
/// # Errors
///
/// * [`RunError::Population`] if the population source rejects a query
/// * [`RunError::UnknownSite`] if a worker is handed a site index the run
///   does not hold
/// * [`RunError::Join`] if a worker panics
pub async fn run(
    context: Arc<RunContext>,
    inputs: RunInputs,
    concurrency: usize,
    progress: Arc<dyn RunProgress>,
) -> Result<RunOutput, RunError> {
    let RunInputs {
        pois,
        sites,
        population,
        study_area,
    } = inputs;

    let sites = Arc::new(dedupe_sites(sites));
    let index = Arc::new(SiteIndex::new(&sites));
    let clip = Arc::new(ClipRegion {
        extent: population.extent(),
        study_area,
    });

    log::info!(
        "Processing {} cell sites and {} points of interest (concurrency={concurrency})",
        sites.len(),
        pois.len()
    );
    progress.stage_started(RunStage::Sites, sites.len() as u64);

    let results: Vec<_> = stream::iter((0..sites.len()).map(|site_index| {
        let context = context.clone();
        let sites = sites.clone();
        let index = index.clone();
        let clip = clip.clone();
        let population = population.clone();
        let progress = progress.clone();
        tokio::task::spawn_blocking(move || {
            let areas = compute_site(
                &context,
                &sites,
                &index,
                site_index,
                &clip,
                population.as_ref(),
            );
            if let Some(site) = sites.get(site_index) {
                progress.site_processed(&site.ict_id);
            }
            areas
        })
    }))
    .buffered(concurrency.max(1))
    .collect()
    .await;

    let mut areas = Vec::with_capacity(results.len());
    for result in results {
        areas.push(result??);
    }

    let shadowed = areas.iter().filter(|a| matches!(a, SiteAreas::Shadowed)).count();
    let outside = areas
        .iter()
        .filter(|a| matches!(a, SiteAreas::OutsideExtent))
        .count();
    if shadowed + outside > 0 {
        log::info!("{shadowed} co-located sites shadowed, {outside} sites outside the population extent");
    }

    progress.stage_started(RunStage::Points, pois.len() as u64);
    let evaluator = Evaluator::new(&context, &sites, &index, &areas);
    let poi_sufcapch_result: Vec<SufficiencyResult> = pois
        .iter()
        .map(|poi| {
            let result = evaluator.evaluate(poi);
            progress.point_evaluated(&result);
            result
        })
        .collect();

    let output = RunOutput {
        buffer_areas: BufferAreas::from_sites(&sites, areas),
        poi_sufcapch_result,
        demand: context.demand.clone(),
        capacity: context.capacity.clone(),
    };
    let tally = output.tally();
    log::info!("{tally}");
    progress.finished(&tally);

    Ok(output)
}
