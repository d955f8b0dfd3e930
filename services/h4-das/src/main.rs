//! HDF4 attribute service.
//!
//! Loads a prepared HDF4 / HDF-EOS2 file snapshot, builds its CF DAS (and
//! optionally DDS) and prints it as JSON. A single field can also be read
//! through the dimension-map reader.

mod report;

use std::io::Write;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use h4_cf::MemoryFile;
use h4_common::H4Config;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use report::{build_report, read_field, ObjectName, ReportOptions};

#[derive(Parser, Debug)]
#[command(name = "h4-das")]
#[command(about = "Print the CF attribute structure of an HDF4 file snapshot")]
struct Args {
    /// Snapshot file (.json, .yaml or .yml)
    snapshot: String,

    /// YAML file with H4.* keys (default: read them from the environment)
    #[arg(short, long)]
    config: Option<String>,

    /// Also print the DDS
    #[arg(long)]
    dds: bool,

    /// Skip CoreMetadata, ArchiveMetadata and ProductMetadata
    #[arg(long)]
    no_ecs: bool,

    /// Read one field instead of building the DAS
    #[arg(long, requires = "object")]
    read: Option<String>,

    /// Grid holding the field to read
    #[arg(long, group = "object")]
    grid: Option<String>,

    /// Swath holding the field to read
    #[arg(long, group = "object")]
    swath: Option<String>,

    /// Pretty-print the JSON output and log as plain text
    #[arg(long)]
    pretty: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "H4_LOG_LEVEL")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
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
    if args.pretty {
        tracing::subscriber::set_global_default(builder.finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.with_thread_ids(true).json().finish())?;
    }

    info!(snapshot = %args.snapshot, "Starting h4-das");

    let config = match &args.config {
        Some(path) => H4Config::from_yaml_file(path).with_context(|| format!("loading config {path}"))?,
        None => H4Config::from_env(),
    };
    config.validate().map_err(|e| anyhow!("invalid configuration: {e}"))?;
    info!(config = ?config, "Loaded configuration");

    let lib = MemoryFile::from_path(&args.snapshot).with_context(|| format!("loading snapshot {}", args.snapshot))?;

    let json = if let Some(field) = &args.read {
        let object = match (&args.grid, &args.swath) {
            (Some(grid), None) => ObjectName::Grid(grid.clone()),
            (None, Some(swath)) => ObjectName::Swath(swath.clone()),
            _ => bail!("--read needs exactly one of --grid or --swath"),
        };
        let field_report = read_field(&lib, &config, &object, field)?;
        info!(values = field_report.values.len(), "Read field");
        to_json(&field_report, args.pretty)?
    } else {
        let options = ReportOptions {
            include_dds: args.dds,
            ecs_metadata: !args.no_ecs,
        };
        to_json(&build_report(&lib, &config, &options)?, args.pretty)?
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}")?;
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}
