//! SCHISM to structured-grid ingester.
//!
//! Regrids a sequence of SCHISM `out2d_*.nc` files onto a regular lon/lat
//! grid and writes a Zarr dataset plus `settings.json` descriptor.

mod config;
mod sources;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ingestion::ConversionPipeline;
use mesh_common::AxisBounds;
use netcdf_parser::{silence_hdf5_errors, SchismLayout};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::{IngesterConfig, LoggingConfig, Overrides};
use sources::discover_inputs;

#[derive(Parser, Debug)]
#[command(name = "mesh-ingester")]
#[command(about = "Regrid SCHISM out2d output into a structured Zarr dataset")]
struct Args {
    /// Input file, comma-separated list, file-name pattern or directory
    #[arg(short, long, env = "SCHISM_INPUT")]
    input: Option<String>,

    /// Output directory for the Zarr files and settings.json
    #[arg(short, long, env = "PARCELS_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, env = "INGESTER_CONFIG")]
    config: Option<PathBuf>,

    /// Grid step in degrees
    #[arg(long)]
    resolution: Option<f64>,

    /// Longitude window as "min,max"
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    lon_bounds: Option<AxisBounds>,

    /// Latitude window as "min,max"
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    lat_bounds: Option<AxisBounds>,

    /// Output files: aggregate, daily or hourly
    #[arg(long)]
    granularity: Option<String>,

    /// Time coordinate: seconds or hours
    #[arg(long)]
    encoding: Option<String>,

    /// Unreadable snapshots: abort or skip
    #[arg(long)]
    strictness: Option<String>,

    /// Regrid the variables of each snapshot in parallel
    #[arg(long)]
    parallel: bool,

    /// Walk input directories recursively
    #[arg(long)]
    recursive: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Log as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print the conversion report as JSON on stdout
    #[arg(long)]
    report_json: bool,
}

fn parse_bounds(s: &str) -> Result<AxisBounds, String> {
    AxisBounds::parse(s).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = IngesterConfig::load(args.config.as_deref())?;
    let report_json = args.report_json;
    config.apply(Overrides {
        input: args.input,
        output: args.output,
        resolution: args.resolution,
        lon_bounds: args.lon_bounds,
        lat_bounds: args.lat_bounds,
        granularity: args.granularity,
        encoding: args.encoding,
        strictness: args.strictness,
        parallel: args.parallel,
        recursive: args.recursive,
        log_level: args.log_level,
        json_logs: args.json_logs,
    })?;

    init_tracing(&config.logging)?;
    silence_hdf5_errors();

    let input = config
        .input
        .clone()
        .context("No input given (use --input or set `input` in the config file)")?;
    let output = config
        .output
        .clone()
        .context("No output directory given (use --output or set `output` in the config file)")?;

    let paths = discover_inputs(&input, config.recursive)?;
    info!(files = paths.len(), input = %input, output = %output.display(), "Discovered SCHISM output");

    let layout: SchismLayout = config.layout.clone().into();
    let pipeline = ConversionPipeline::new(config.conversion);
    let report = pipeline
        .run_files(&paths, &layout, &output)
        .with_context(|| format!("Conversion into {} failed", output.display()))?;

    for warning in &report.warnings {
        warn!(warning = %warning, "No valid data");
    }
    for skipped in &report.skipped {
        warn!(snapshot = %skipped.snapshot, reason = %skipped.reason, "Skipped snapshot");
    }

    if report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!(
            descriptor = %report.descriptor.display(),
            nx = report.nx,
            ny = report.ny,
            time_steps = report.time_steps,
            wet_cells = report.wet_cells,
            files = report.files_written,
            bytes = report.bytes_written,
            "Dataset written"
        );
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let level = match logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if logging.is_json() {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
