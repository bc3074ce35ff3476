//! CAN Arbitration CLI Application
//!
//! This is the command-line interface for the arbitration engine.
//! It uses the can-arbitration library and adds:
//! - Node descriptions from flags or a TOML scenario file
//! - Parallel resolution of independent rounds
//! - Report generation (TXT/JSON)

use anyhow::Result;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

mod config;
mod report;
mod scenario;

use config::{AppConfig, BusConfig, OutputFormat};
use scenario::{NodeSpec, Round, RoundReport};

/// CAN Arbitration - Resolve bus contention and synthesize bus timelines
#[derive(Parser, Debug)]
#[command(name = "can-arbitration-cli")]
#[command(about = "Resolve CAN bus arbitration and synthesize the bus level timeline", long_about = None)]
#[command(version)]
struct Args {
    /// Contending node as LABEL=ID[:PAYLOAD_HEX] (can be repeated)
    #[arg(short, long = "node", value_name = "SPEC")]
    nodes: Vec<NodeSpec>,

    /// Identifier width in bits for numeric ids
    #[arg(long, value_name = "BITS")]
    width: Option<usize>,

    /// Bit time in microseconds
    #[arg(long, value_name = "US")]
    bit_time_us: Option<u64>,

    /// Idle time before start-of-frame in microseconds
    #[arg(long, value_name = "US")]
    leading_idle_us: Option<u64>,

    /// Idle time after the last bit in microseconds
    #[arg(long, value_name = "US")]
    trailing_idle_us: Option<u64>,

    /// Path to scenario file (scenario.toml) with multiple rounds
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Arbitration CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using arbitration library v{}", can_arbitration::VERSION);

    let mut config = if let Some(config_path) = &args.config {
        config::load_config(config_path)?
    } else if !args.nodes.is_empty() {
        AppConfig::default()
    } else {
        // No arguments - show help
        println!("CAN Arbitration - No contenders specified");
        println!("\nQuick Start:");
        println!("  can-arbitration-cli -n sun_sensor=0x001 -n camera=0x100");
        println!("  can-arbitration-cli -n a=0b0000001 -n b=0b0010000 --format json");
        println!("\nFor multiple rounds:");
        println!("  can-arbitration-cli --config scenario.toml");
        println!("\nUse --help for more options");
        return Ok(());
    };

    let rounds = collect_rounds(&mut config, &args)?;
    let bus = &config.bus;

    let timing = bus.timeline();
    log::info!(
        "Resolving {} round(s) with {:?} bit time",
        rounds.len(),
        Duration::from_micros(bus.bit_time_us)
    );
    let reports = scenario::run_rounds(&rounds, &timing);

    let format = args
        .format
        .or(config.output.format)
        .unwrap_or(OutputFormat::Txt);
    write_report(&reports, format, args.output.as_ref())?;

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} round(s) failed arbitration", failed, reports.len());
    }

    Ok(())
}

/// Apply command-line overrides, then build scenario-file and command-line rounds
fn collect_rounds(config: &mut AppConfig, args: &Args) -> Result<Vec<Round>> {
    config.bus = apply_overrides(config.bus.clone(), args);
    if config.bus.bit_time_us == 0 {
        anyhow::bail!("Bit time must be greater than zero");
    }

    let mut rounds = config.rounds()?;
    if !args.nodes.is_empty() {
        rounds.push(rounds_from_args(&args.nodes, config.bus.id_width)?);
    }
    Ok(rounds)
}

/// Command-line timing flags take precedence over the scenario file
fn apply_overrides(mut bus: BusConfig, args: &Args) -> BusConfig {
    if let Some(width) = args.width {
        bus.id_width = width;
    }
    if let Some(bit_time) = args.bit_time_us {
        bus.bit_time_us = bit_time;
    }
    if let Some(idle) = args.leading_idle_us {
        bus.leading_idle_us = idle;
    }
    if let Some(idle) = args.trailing_idle_us {
        bus.trailing_idle_us = idle;
    }
    bus
}

fn rounds_from_args(nodes: &[NodeSpec], width: usize) -> Result<Round> {
    let frames = nodes
        .iter()
        .map(|node| node.to_frame(width))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Round {
        name: "command line".to_string(),
        frames,
    })
}

fn write_report(reports: &[RoundReport], format: OutputFormat, output: Option<&PathBuf>) -> Result<()> {
    use anyhow::Context;

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        OutputFormat::Txt => report::write_txt(&mut out, reports)?,
        OutputFormat::Json => report::write_json(&mut out, reports)?,
    }
    out.flush()?;

    if let Some(path) = output {
        log::info!("Report written to {:?}", path);
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
