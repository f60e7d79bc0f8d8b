mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use quali_pipeline::{Pipeline, PipelineConfig, PipelineError, SeasonStatus};

#[derive(Parser)]
#[command(
    name = "quali-timeline",
    version,
    about = "Builds qualifying career timelines from per-season lap tables"
)]
struct Cli {
    /// JSON pipeline config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of per-season CSV lap tables
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Where to write the timeline document
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Process season tables on worker threads
    #[arg(long)]
    parallel: bool,

    /// Print the run manifest as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let mut cfg = match &cli.config {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = cli.input_dir {
        cfg.input_dir = dir;
    }
    if let Some(out) = cli.output {
        cfg.output_path = out;
    }
    cfg.parallel |= cli.parallel;
    tracing::debug!(?cfg, "effective config");

    let pipeline = Pipeline::new(cfg)?;
    let report = match pipeline.run_dir() {
        Ok(report) => report,
        Err(e @ PipelineError::NoSeasons { .. }) => {
            for s in e.seasons().unwrap_or_default() {
                eprintln!("  {}: {:?}", s.source, s.status);
            }
            return Err(e.into());
        }
        Err(e) => return Err(e).context("pipeline run failed"),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("run {}", report.run_id);
    for s in &report.seasons {
        match &s.status {
            SeasonStatus::Loaded { laps, races, results, skipped_rows } => println!(
                "  {}: {laps} laps, {races} races, {results} results, {} rows skipped",
                s.source,
                skipped_rows.len()
            ),
            SeasonStatus::Empty => println!("  {}: no results", s.source),
            SeasonStatus::Failed { reason } => println!("  {}: failed ({reason})", s.source),
        }
    }
    for flag in &report.review_flags {
        println!(
            "  review {} {} {}: {}",
            flag.season,
            flag.race,
            flag.team,
            flag.drivers.join(", ")
        );
    }
    println!(
        "{} drivers, {} race entries -> {}",
        report.drivers,
        report.races,
        report.output_path.display()
    );
    Ok(())
}
