#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for mobile capacity runs.
//!
//! [`RunProgressBars`] renders a run's [`RunProgress`] events as one
//! `indicatif` bar per stage, with a running verdict count while points are
//! evaluated. [`init_logger`] sets up `indicatif-log-bridge` so that log
//! lines don't tear the bars while they redraw.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use mobile_capacity_models::SufficiencyResult;
use mobile_capacity_sufficiency::{RunProgress, RunStage, VerdictTally};

pub use indicatif::MultiProgress;

/// `indicatif` bars for the site and point stages of a run.
pub struct RunProgressBars {
    multi: MultiProgress,
    bar: Mutex<Option<ProgressBar>>,
    tally: Mutex<VerdictTally>,
}

impl RunProgressBars {
    /// Creates the progress reporter. Bars are added to `multi` as stages
    /// start.
    #[must_use]
    pub fn new(multi: &MultiProgress) -> Arc<dyn RunProgress> {
        Arc::new(Self {
            multi: multi.clone(),
            bar: Mutex::new(None),
            tally: Mutex::new(VerdictTally::default()),
        })
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let Ok(bar) = self.bar.lock() else {
            return;
        };
        if let Some(bar) = bar.as_ref() {
            f(bar);
        }
    }
}

fn stage_style(stage: RunStage) -> ProgressStyle {
    let template = match stage {
        RunStage::Sites => "  {prefix} {wide_bar:.cyan/dim} {pos}/{len} {percent}% [{eta}] {msg}",
        RunStage::Points => "  {prefix} {wide_bar:.green/dim} {pos}/{len} {msg}",
    };
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

impl RunProgress for RunProgressBars {
    fn stage_started(&self, stage: RunStage, total: u64) {
        let bar = self.multi.add(ProgressBar::new(total));
        bar.set_style(stage_style(stage));
        bar.set_prefix(stage.label());
        bar.enable_steady_tick(Duration::from_millis(100));

        let previous = self.bar.lock().ok().and_then(|mut current| current.replace(bar));
        if let Some(previous) = previous {
            previous.finish();
        }
    }

    fn site_processed(&self, ict_id: &str) {
        self.with_bar(|bar| {
            bar.set_message(ict_id.to_string());
            bar.inc(1);
        });
    }

    fn point_evaluated(&self, result: &SufficiencyResult) {
        let Ok(mut tally) = self.tally.lock() else {
            return;
        };
        tally.record(result);
        let message = format!("{} sufficient", tally.sufficient);
        drop(tally);
        self.with_bar(|bar| {
            bar.set_message(message);
            bar.inc(1);
        });
    }

    fn finished(&self, tally: &VerdictTally) {
        self.with_bar(|bar| bar.finish_with_message(tally.to_string()));
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set in tests

    log::set_max_level(level);

    multi
}
