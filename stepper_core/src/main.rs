//! # Stepper Simulator
//!
//! Runs a TOML job against the stepper core on the simulation driver
//! and prints diagnostic snapshots.
//!
//! ```text
//! stepper_sim config/stepper.toml config/job.toml --dump pos --dump state
//! ```

use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use stepper_common::config::ConfigLoader;
use stepper_common::hal::units::LinearUnits;
use stepper_common::motion::event::{EventKind, StepperEvent};
use stepper_core::config::load_config;
use stepper_core::job::{Job, JobRunner};
use stepper_core::{DumpOptions, Stepper};
use stepper_hal::SimHal;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Parts of the controller state to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DumpPart {
    /// Calculated and live positions
    Pos,
    /// Flags, errors and counters
    State,
    /// Queued movements
    Movements,
    /// Ramp details of queued moves
    Details,
    /// Everything
    All,
}

impl DumpPart {
    fn options(self) -> DumpOptions {
        match self {
            Self::Pos => DumpOptions::POS,
            Self::State => DumpOptions::STATE,
            Self::Movements => DumpOptions::MOVEMENTS,
            Self::Details => DumpOptions::MOVEMENTS | DumpOptions::DETAILS,
            Self::All => DumpOptions::ALL,
        }
    }
}

/// Stepper simulator: run a job against the simulated machine
#[derive(Parser, Debug)]
#[command(name = "stepper_sim")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Run a motion job against the simulated stepper machine")]
struct Args {
    /// Path to the stepper configuration TOML.
    #[arg(default_value = "config/stepper.toml")]
    config: PathBuf,

    /// Path to the job TOML.
    #[arg(default_value = "config/job.toml")]
    job: PathBuf,

    /// Parts of the state to print (repeatable).
    #[arg(long, value_enum, default_values_t = [DumpPart::Pos, DumpPart::State])]
    dump: Vec<DumpPart>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs and snapshots in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Stepper Simulator v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Stepper Simulator done");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    let job = Job::load(&args.job)?;
    info!(
        "Loaded job from {}: {} steps",
        args.job.display(),
        job.steps.len()
    );

    let hal = SimHal::new(&config, &job.simulation)?;
    let mut stepper = Stepper::new(hal, &config)?;
    stepper.subscribe(EventKind::Io, Box::new(|event| info!("{event:?}")));
    stepper.subscribe(
        EventKind::Error,
        Box::new(|event| {
            if let StepperEvent::Error(code) = event {
                warn!("Stepper error: {code}");
            }
        }),
    );

    let options = args
        .dump
        .iter()
        .fold(DumpOptions::empty(), |acc, part| acc | part.options());
    let runner = JobRunner::new(LinearUnits::from_config(&config), options);
    let snapshots = runner.run(&mut stepper, &job.steps)?;

    for snapshot in &snapshots {
        if args.json {
            println!("{}", serde_json::to_string(snapshot)?);
        } else {
            print!("{snapshot}");
            println!("---");
        }
    }

    if let Some(intervals) = stepper.hal().timer().intervals() {
        let ticks: u64 = intervals.iter().map(|&t| u64::from(t)).sum();
        info!(
            "{} timer expiries, {} ticks ({:.3} s simulated)",
            intervals.len(),
            ticks,
            ticks as f64 / f64::from(config.timer_frequency)
        );
    }
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}
