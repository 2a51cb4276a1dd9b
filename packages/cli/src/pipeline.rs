//! The `run` command: load inputs, evaluate, write results.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use mobile_capacity_cli_utils::{MultiProgress, RunProgressBars};
use mobile_capacity_config::{NetworkConfig, load_config};
use mobile_capacity_demand::ReferenceTable;
use mobile_capacity_population::{PopulationRaster, PopulationSource};
use mobile_capacity_spatial::load_study_area;
use mobile_capacity_sufficiency::{RunContext, RunInputs, default_concurrency, run};
use mobile_capacity_tabular::{load_bitrate_table, load_cell_sites, load_pois, write_run_output};

/// Inputs of a single-country run.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Network configuration TOML file
    #[arg(long)]
    pub config: PathBuf,

    /// ISO3 code of the country being evaluated (e.g. "KEN")
    #[arg(long)]
    pub country: String,

    /// Points of interest CSV (`poi_id,lat,lon`)
    #[arg(long)]
    pub pois: PathBuf,

    /// Cell sites CSV (`ict_id,lat,lon[,radio_type]`)
    #[arg(long)]
    pub cell_sites: PathBuf,

    /// Directory holding population datasets named after their vintage,
    /// e.g. `ken_ppp_2020_1km_Aggregated_UNadj.csv`
    #[arg(long, default_value = "data/population")]
    pub population_dir: PathBuf,

    /// Population CSV to use instead of looking one up in `--population-dir`
    #[arg(long)]
    pub population: Option<PathBuf>,

    /// Precomputed traffic-per-subscription CSV (see `traffic-table`)
    #[arg(long, conflicts_with_all = ["itu_subscriptions", "itu_traffic"])]
    pub traffic: Option<PathBuf>,

    /// ITU mobile-broadband subscriptions export
    #[arg(long, requires = "itu_traffic")]
    pub itu_subscriptions: Option<PathBuf>,

    /// ITU mobile-broadband traffic export
    #[arg(long, requires = "itu_subscriptions")]
    pub itu_traffic: Option<PathBuf>,

    /// Per-band step distances in km (columns `L850,L1800,L2600`); replaces
    /// the configuration's bitrate table
    #[arg(long, requires = "band_bitrates")]
    pub band_distances: Option<PathBuf>,

    /// Per-band resource block bitrates in kbps reached up to each step
    /// distance
    #[arg(long, requires = "band_distances")]
    pub band_bitrates: Option<PathBuf>,

    /// Optional GeoJSON boundary every ring is clipped to
    #[arg(long)]
    pub study_area: Option<PathBuf>,

    /// Output directory; results land in `<output>/<ISO3>/`
    #[arg(long, default_value = "output")]
    pub output: PathBuf,

    /// Number of cell sites processed in parallel (defaults to the
    /// available parallelism)
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl RunArgs {
    fn load_config(&self) -> Result<NetworkConfig, Box<dyn std::error::Error>> {
        let mut config = load_config(&self.config)?;
        if let (Some(distances), Some(bitrates)) = (&self.band_distances, &self.band_bitrates) {
            config.bitrate_table = Some(load_bitrate_table(distances, bitrates)?);
        }
        Ok(config)
    }

    fn load_statistics(&self) -> Result<ReferenceTable, Box<dyn std::error::Error>> {
        let table = match (&self.traffic, &self.itu_subscriptions, &self.itu_traffic) {
            (Some(path), _, _) => ReferenceTable::load_csv(path)?,
            (None, Some(subscriptions), Some(traffic)) => {
                ReferenceTable::from_itu_files(subscriptions, traffic)?
            }
            _ => {
                return Err(
                    "Reference traffic data is required: pass --traffic, or both \
                     --itu-subscriptions and --itu-traffic"
                        .into(),
                );
            }
        };
        log::info!("Loaded {} traffic statistics", table.len());
        Ok(table)
    }

    fn load_population(
        &self,
        context: &RunContext,
    ) -> Result<PopulationRaster, Box<dyn std::error::Error>> {
        let raster = match &self.population {
            Some(path) => PopulationRaster::load_csv(path, context.dataset.clone())?,
            None => PopulationRaster::load_dataset(&self.population_dir, context.dataset.clone())?,
        };
        log::info!(
            "Population raster {}: {} cells, {:.0} people",
            raster.key(),
            raster.cell_count(),
            raster.total_population()
        );
        Ok(raster)
    }
}

/// Runs one country end to end.
///
/// Configuration and reference data are resolved before any input file is
/// read, so a fatal error leaves the output directory untouched.
///
/// # Errors
///
/// Returns the first fatal error: invalid configuration, missing reference
/// statistic, unreadable input, or a failed write.
pub async fn execute(args: &RunArgs, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let config = args.load_config()?;
    let statistics = args.load_statistics()?;
    let context = Arc::new(RunContext::new(config, &args.country, &statistics)?);

    let pois = load_pois(&args.pois)?;
    let sites = load_cell_sites(&args.cell_sites)?;
    let population: Arc<dyn PopulationSource> = Arc::new(args.load_population(&context)?);
    let study_area = args.study_area.as_deref().map(load_study_area).transpose()?;

    let concurrency = args
        .concurrency
        .filter(|&n| n > 0)
        .unwrap_or_else(default_concurrency);
    let progress = RunProgressBars::new(multi);

    let output = run(
        context,
        RunInputs {
            pois,
            sites,
            population,
            study_area,
        },
        concurrency,
        progress,
    )
    .await?;

    let written = write_run_output(&args.output, &output)?;

    let tally = output.tally();
    println!();
    println!("Country:           {}", output.demand.country_code);
    println!(
        "Traffic statistic: {:.2} GB per subscription per month ({})",
        output.demand.udatavmonth_pu, output.demand.udatavmonth_year
    );
    println!("Available capacity: {:.3} Mbps per sector", output.capacity.available_mbps);
    println!("Sufficient:        {}", tally.sufficient);
    println!("Insufficient:      {}", tally.insufficient);
    println!("Uncovered:         {}", tally.uncovered);
    println!("Indeterminate:     {}", tally.indeterminate);
    println!("Results:           {}", written.results.display());
    println!("Rings:             {}", written.rings.display());
    println!("Buffers:           {}", written.buffers.display());

    log::info!("Run finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn args(dir: &Path) -> RunArgs {
        let config = dir.join("network.toml");
        std::fs::copy(
            concat!(env!("CARGO_MANIFEST_DIR"), "/../config/configs/example.toml"),
            &config,
        )
        .unwrap();

        RunArgs {
            config,
            country: "KEN".to_string(),
            pois: write(dir, "pois.csv", "poi_id,lat,lon\nschool-1,0.004,0.012\n"),
            cell_sites: write(dir, "sites.csv", "ict_id,lat,lon\ns1,0.004,0.004\n"),
            population_dir: dir.to_path_buf(),
            population: Some(write(dir, "population.csv", "X,Y,Z\n0.004,0.004,2000\n")),
            traffic: Some(write(
                dir,
                "traffic.csv",
                "entity_iso,data_year,mbb_traffic_per_subscr_per_month\nUGA,2022,4.5\n",
            )),
            itu_subscriptions: None,
            itu_traffic: None,
            band_distances: None,
            band_bitrates: None,
            study_area: None,
            output: dir.join("output"),
            concurrency: Some(1),
        }
    }

    #[tokio::test]
    async fn missing_reference_statistic_writes_nothing() {
        let dir = std::env::temp_dir().join("mobile_capacity_cli_missing_statistic_test");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        let args = args(&dir);

        let err = execute(&args, &MultiProgress::new()).await.unwrap_err();
        assert!(err.to_string().contains("KEN"), "{err}");
        assert!(!args.output.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn complete_run_writes_every_output_file() {
        let dir = std::env::temp_dir().join("mobile_capacity_cli_complete_run_test");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        let mut args = args(&dir);
        args.traffic = Some(write(
            &dir,
            "traffic.csv",
            "entity_iso,data_year,mbb_traffic_per_subscr_per_month\nKEN,2022,6.0\n",
        ));

        execute(&args, &MultiProgress::new()).await.unwrap();
        let country = args.output.join("KEN");
        for name in ["poi_sufcapch_result.csv", "buffer_rings.geojson", "buffers.geojson"] {
            assert!(country.join(name).is_file(), "{name}");
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn band_tables_replace_the_configured_bitrates() {
        let dir = std::env::temp_dir().join("mobile_capacity_cli_band_tables_test");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        let mut args = args(&dir);
        args.band_distances = Some(write(&dir, "bwdistance_km.csv", "L850\n1.0\n2.0\n"));
        args.band_bitrates = Some(write(&dir, "bwdlachievbr_kbps.csv", "L850\n1200\n600\n"));

        let config = args.load_config().unwrap();
        let table = config.bitrate_table.unwrap();
        let l850 = table.band(mobile_capacity_config::Band::L850).unwrap();
        assert_eq!(l850.kbps, vec![1200.0, 600.0]);

        args.band_bitrates = Some(write(&dir, "bwdlachievbr_kbps.csv", "L850\n1200\nfast\n"));
        assert!(args.load_config().is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
