#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for mobile capacity sufficiency runs.
//!
//! Without a subcommand the tool falls back to an interactive menu that
//! prompts for the same inputs. Log output is routed through
//! [`mobile_capacity_cli_utils::init_logger`] so progress bars and log lines
//! share the terminal cleanly.

mod interactive;
mod pipeline;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mobile_capacity_config::{EXAMPLE_CONFIG, load_config};
use mobile_capacity_demand::ReferenceTable;

#[derive(Parser)]
#[command(
    name = "mobile_capacity",
    about = "Mobile broadband capacity sufficiency tool"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every point of interest against the capacity of its serving cell site
    Run(pipeline::RunArgs),
    /// Validate a network configuration file and print its capacity figure
    ValidateConfig {
        /// Path to the network configuration TOML file
        path: PathBuf,
    },
    /// Write the example network configuration to a file
    InitConfig {
        /// Destination path
        #[arg(default_value = "network.toml")]
        path: PathBuf,
        /// Overwrite the destination if it already exists
        #[arg(long)]
        force: bool,
    },
    /// Derive a traffic-per-subscription table from ITU indicator exports
    TrafficTable {
        /// ITU "active mobile-broadband subscriptions" export
        #[arg(long)]
        subscriptions: PathBuf,
        /// ITU "mobile-broadband internet traffic" export
        #[arg(long)]
        traffic: PathBuf,
        /// Destination CSV, usable with `run --traffic`
        #[arg(long, default_value = "traffic_per_subscription.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = mobile_capacity_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Run(args) => pipeline::execute(&args, &multi).await?,
        Commands::ValidateConfig { path } => validate_config(&path)?,
        Commands::InitConfig { path, force } => init_config(&path, force)?,
        Commands::TrafficTable {
            subscriptions,
            traffic,
            output,
        } => traffic_table(&subscriptions, &traffic, &output)?,
    }

    Ok(())
}

/// Loads and validates a configuration, then prints the capacity it implies.
fn validate_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let capacity = mobile_capacity_radio::capacity_figure(&config);

    println!("{} is valid", path.display());
    println!("  config hash:              {}", capacity.config_hash);
    println!("  rings:                    {}", config.ring_count());
    println!("  resource blocks:          {:.2}", capacity.total_resource_blocks);
    println!("  usable resource blocks:   {:.2}", capacity.usable_resource_blocks);
    println!("  site throughput:          {:.3} Mbps", capacity.site_mbps);
    println!("  sector throughput:        {:.3} Mbps", capacity.sector_mbps);
    println!("  busy-hour concentration:  {:.4}", capacity.busy_hour_concentration);
    println!(
        "  available per sector:     {:.2} RBs ({:.3} Mbps)",
        capacity.available_resource_blocks, capacity.available_mbps
    );
    println!(
        "  resource block bitrate:   {}",
        if config.bitrate_table.is_some() {
            "per-band distance steps"
        } else {
            "constant"
        }
    );

    Ok(())
}

/// Writes the embedded example configuration.
fn init_config(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    std::fs::write(path, EXAMPLE_CONFIG)?;
    log::info!("Wrote example network configuration to {}", path.display());
    Ok(())
}

/// Joins the two ITU exports into a precomputed traffic table.
fn traffic_table(
    subscriptions: &Path,
    traffic: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = ReferenceTable::from_itu_files(subscriptions, traffic)?;
    if table.is_empty() {
        log::warn!("No country/year has both indicators; writing an empty table");
    }

    let file = std::fs::File::create(output)?;
    table.write_csv(std::io::BufWriter::new(file))?;
    log::info!(
        "Wrote {} traffic statistics to {}",
        table.len(),
        output.display()
    );
    Ok(())
}
