//! mfpanel CLI binary.
//!
//! Runs the stages of the mutual fund factor-exposure pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mfpanel::{
    BetasStageOutput, PanelStageOutput, PipelineConfig, betas_stage, build_panel_stage,
    cache_info, import,
};
use mfpanel_data::{CacheStats, ParquetExportSource};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mfpanel")]
#[command(about = "Mutual fund universe and factor-exposure panels", long_about = None)]
#[command(version)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull the raw extracts into the local cache
    Import {
        /// Directory holding the raw parquet exports
        #[arg(long)]
        source: PathBuf,
    },

    /// Build the fund-year universe and print Table 1
    BuildPanel,

    /// Run the rolling factor regressions and print Panels A, B and C
    Betas,

    /// Build the panel, then run the regressions
    Run,

    /// Show cached snapshots
    CacheInfo,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "mfpanel=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(cli.config.as_deref())?;
    info!(
        cache = %config.paths.cache_db.display(),
        output = %config.paths.output_dir.display(),
        "configuration loaded"
    );

    match cli.command {
        Commands::Import { source } => {
            let pb = spinner("Importing extracts...")?;
            let source = ParquetExportSource::new(source);
            match import(&config, &source) {
                Ok(stats) => {
                    pb.finish_with_message(format!(
                        "Imported {} extracts",
                        stats.snapshots.len()
                    ));
                    print_cache_stats(&config, &stats);
                }
                Err(e) => {
                    pb.finish_with_message("Failed!");
                    return Err(e.into());
                }
            }
        }
        Commands::BuildPanel => {
            let output = panel_with_progress(&config)?;
            print_panel(&output);
        }
        Commands::Betas => {
            let output = betas_with_progress(&config)?;
            print_betas(&output);
        }
        Commands::Run => {
            let panel = panel_with_progress(&config)?;
            print_panel(&panel);
            let betas = betas_with_progress(&config)?;
            print_betas(&betas);
        }
        Commands::CacheInfo => {
            let stats = cache_info(&config)?;
            print_cache_stats(&config, &stats);
        }
    }

    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {elapsed} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}

fn panel_with_progress(
    config: &PipelineConfig,
) -> Result<PanelStageOutput, Box<dyn std::error::Error>> {
    let pb = spinner("Building fund-year universe...")?;
    match build_panel_stage(config) {
        Ok(output) => {
            pb.finish_with_message(format!(
                "Main sample: {} fund-years",
                output.main_sample.len()
            ));
            Ok(output)
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            Err(e.into())
        }
    }
}

fn betas_with_progress(
    config: &PipelineConfig,
) -> Result<BetasStageOutput, Box<dyn std::error::Error>> {
    let pb = spinner("Running rolling factor regressions...")?;
    match betas_stage(config) {
        Ok(output) => {
            pb.finish_with_message(format!(
                "{} coefficient rows from {} funds",
                output.run.overall.len(),
                output.run.overall.qualifying_funds
            ));
            Ok(output)
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            Err(e.into())
        }
    }
}

fn print_panel(output: &PanelStageOutput) {
    println!();
    println!("{}", output.summary);
    println!("{}", output.universe.funnel.to_table());
    println!("  Main sample written to {}", output.main_sample_path.display());
}

fn print_betas(output: &BetasStageOutput) {
    println!();
    println!("{}", output.run.panels);
    println!("  Partition regressions:");
    for p in &output.run.partitions {
        println!(
            "    {} {:<22} {:>8} fund-months {:>6} funds {:>8} rows",
            p.panel, p.label, p.fund_months, p.qualifying_funds, p.coefficient_rows
        );
    }
    println!();
    for path in &output.files {
        println!("  Wrote {}", path.display());
    }
}

fn print_cache_stats(config: &PipelineConfig, stats: &CacheStats) {
    println!("  Cache location: {}", config.paths.cache_db.display());
    if stats.snapshots.is_empty() {
        println!("  No cached extracts; run `mfpanel import --source DIR` first.");
        return;
    }
    for s in &stats.snapshots {
        println!(
            "  {:<20} {:>10} rows  pulled {}",
            s.dataset.name(),
            s.row_count,
            s.pulled_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    let missing = stats.missing();
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(|d| d.to_string()).collect();
        println!("  Missing: {}", names.join(", "));
    }
}
