//! Interactive menu used when no subcommand is given.
//!
//! Prompts with `dialoguer` for the same inputs the subcommands take, so a
//! run can be configured without remembering flags.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};
use mobile_capacity_cli_utils::MultiProgress;

use crate::pipeline::{self, RunArgs};

enum Action {
    Run,
    ValidateConfig,
    InitConfig,
    TrafficTable,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Run,
        Self::ValidateConfig,
        Self::InitConfig,
        Self::TrafficTable,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Run => "Evaluate capacity sufficiency for a country",
            Self::ValidateConfig => "Validate a network configuration",
            Self::InitConfig => "Write the example network configuration",
            Self::TrafficTable => "Build a traffic table from ITU exports",
        }
    }
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if user input fails or the chosen action fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Mobile Capacity Sufficiency");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Run => pipeline::execute(&prompt_run_args()?, multi).await?,
        Action::ValidateConfig => {
            let path = prompt_path("Network configuration", Some("network.toml"))?;
            crate::validate_config(&path)?;
        }
        Action::InitConfig => {
            let path = prompt_path("Destination", Some("network.toml"))?;
            let force = path.exists()
                && Confirm::new()
                    .with_prompt(format!("{} exists. Overwrite?", path.display()))
                    .default(false)
                    .interact()?;
            crate::init_config(&path, force)?;
        }
        Action::TrafficTable => {
            let subscriptions = prompt_path("ITU subscriptions export", None)?;
            let traffic = prompt_path("ITU traffic export", None)?;
            let output = prompt_path("Destination", Some("traffic_per_subscription.csv"))?;
            crate::traffic_table(&subscriptions, &traffic, &output)?;
        }
    }

    Ok(())
}

fn prompt_run_args() -> Result<RunArgs, Box<dyn std::error::Error>> {
    let config = prompt_path("Network configuration", Some("network.toml"))?;

    let country: String = Input::new()
        .with_prompt("ISO3 country code")
        .validate_with(|input: &String| -> Result<(), &'static str> {
            if input.trim().len() == 3 && input.trim().chars().all(|c| c.is_ascii_alphabetic()) {
                Ok(())
            } else {
                Err("expected a three-letter code such as KEN")
            }
        })
        .interact_text()?;

    let pois = prompt_path("Points of interest CSV", None)?;
    let cell_sites = prompt_path("Cell sites CSV", None)?;
    let population_dir = prompt_path("Population dataset directory", Some("data/population"))?;

    let reference_choices = &[
        "Precomputed traffic table",
        "ITU subscriptions + traffic exports",
    ];
    let reference = Select::new()
        .with_prompt("Reference traffic data")
        .items(reference_choices)
        .default(0)
        .interact()?;

    let (traffic, itu_subscriptions, itu_traffic) = if reference == 0 {
        (Some(prompt_path("Traffic table CSV", None)?), None, None)
    } else {
        (
            None,
            Some(prompt_path("ITU subscriptions export", None)?),
            Some(prompt_path("ITU traffic export", None)?),
        )
    };

    let study_area = prompt_optional_path("Study-area GeoJSON (leave empty for none)")?;
    let output = prompt_path("Output directory", Some("output"))?;

    let concurrency_str: String = Input::new()
        .with_prompt("Parallel site workers (leave empty for default)")
        .allow_empty(true)
        .interact_text()?;
    let concurrency = if concurrency_str.trim().is_empty() {
        None
    } else {
        Some(
            concurrency_str
                .trim()
                .parse()
                .map_err(|e| format!("Invalid worker count '{concurrency_str}': {e}"))?,
        )
    };

    Ok(RunArgs {
        config,
        country: country.trim().to_uppercase(),
        pois,
        cell_sites,
        population_dir,
        population: None,
        traffic,
        itu_subscriptions,
        itu_traffic,
        band_distances: None,
        band_bitrates: None,
        study_area,
        output,
        concurrency,
    })
}

fn prompt_path(prompt: &str, default: Option<&str>) -> Result<PathBuf, dialoguer::Error> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default.to_string());
    }
    Ok(PathBuf::from(input.interact_text()?.trim()))
}

fn prompt_optional_path(prompt: &str) -> Result<Option<PathBuf>, dialoguer::Error> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| PathBuf::from(value)))
}
