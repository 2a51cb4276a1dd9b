//! Run progress events and verdict tallies.
//!
//! The pipeline reports through [`RunProgress`] so the CLI can render bars
//! while tests stay silent.

use std::fmt;
use std::sync::Arc;

use mobile_capacity_models::{ResultStatus, SufficiencyResult, Verdict};

/// The two passes of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Ring generation and population sampling, one unit per cell site.
    Sites,
    /// Association and verdicts, one unit per point of interest.
    Points,
}

impl RunStage {
    /// Human-readable description of the stage.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sites => "Sampling population around cell sites",
            Self::Points => "Evaluating points of interest",
        }
    }
}

/// Receives progress events from a run.
///
/// Shared with blocking site workers through an `Arc`, hence `Send + Sync`.
pub trait RunProgress: Send + Sync {
    /// A stage begins with `total` units of work.
    fn stage_started(&self, stage: RunStage, total: u64);

    /// The rings of site `ict_id` have been sampled.
    fn site_processed(&self, ict_id: &str);

    /// One point has its result row.
    fn point_evaluated(&self, result: &SufficiencyResult);

    /// Every point has been evaluated.
    fn finished(&self, tally: &VerdictTally);
}

/// Ignores every event.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn stage_started(&self, _stage: RunStage, _total: u64) {}
    fn site_processed(&self, _ict_id: &str) {}
    fn point_evaluated(&self, _result: &SufficiencyResult) {}
    fn finished(&self, _tally: &VerdictTally) {}
}

/// Returns a shared [`SilentProgress`].
#[must_use]
pub fn silent_progress() -> Arc<dyn RunProgress> {
    Arc::new(SilentProgress)
}

/// Result rows counted by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerdictTally {
    /// Points whose demand fits.
    pub sufficient: usize,
    /// Covered points whose demand does not fit.
    pub insufficient: usize,
    /// Points no site serves.
    pub uncovered: usize,
    /// Points without a verdict.
    pub indeterminate: usize,
}

impl VerdictTally {
    /// Counts one row.
    pub fn record(&mut self, result: &SufficiencyResult) {
        match (result.verdict, result.status) {
            (Verdict::Sufficient, _) => self.sufficient += 1,
            (Verdict::Insufficient, ResultStatus::Uncovered) => self.uncovered += 1,
            (Verdict::Insufficient, _) => self.insufficient += 1,
            (Verdict::Indeterminate, _) => self.indeterminate += 1,
        }
    }

    /// Every row counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.sufficient + self.insufficient + self.uncovered + self.indeterminate
    }
}

impl<'a> FromIterator<&'a SufficiencyResult> for VerdictTally {
    fn from_iter<I: IntoIterator<Item = &'a SufficiencyResult>>(iter: I) -> Self {
        let mut tally = Self::default();
        for result in iter {
            tally.record(result);
        }
        tally
    }
}

impl fmt::Display for VerdictTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} sufficient, {} insufficient, {} uncovered, {} indeterminate",
            self.sufficient,
            self.total(),
            self.insufficient,
            self.uncovered,
            self.indeterminate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(verdict: Verdict, status: ResultStatus) -> SufficiencyResult {
        SufficiencyResult {
            poi_id: "p".to_string(),
            lat: 0.0,
            lon: 0.0,
            ict_id: None,
            distance_m: None,
            ring_outer_radius: None,
            sector: None,
            ring_population: 0.0,
            site_population: 0.0,
            rbdlthtarg: 0.0,
            upoprbu: 0.0,
            cellavcap: 0.0,
            demand_mbps: 0.0,
            capacity_mbps: 0.0,
            verdict,
            status,
        }
    }

    #[test]
    fn uncovered_points_are_counted_apart_from_insufficient_ones() {
        let rows = [
            row(Verdict::Sufficient, ResultStatus::Evaluated),
            row(Verdict::Insufficient, ResultStatus::Evaluated),
            row(Verdict::Insufficient, ResultStatus::Uncovered),
            row(Verdict::Insufficient, ResultStatus::Uncovered),
            row(Verdict::Indeterminate, ResultStatus::OutsideRasterExtent),
        ];
        let tally: VerdictTally = rows.iter().collect();
        assert_eq!(
            tally,
            VerdictTally {
                sufficient: 1,
                insufficient: 1,
                uncovered: 2,
                indeterminate: 1,
            }
        );
        assert_eq!(tally.total(), 5);
        assert_eq!(
            tally.to_string(),
            "1/5 sufficient, 1 insufficient, 2 uncovered, 1 indeterminate"
        );
    }
}
