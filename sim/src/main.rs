//! BEACON SIM: closed-loop simulation driver for the beacon particle filter.
//!
//! A simulated agent moves around a circular one-dimensional world, ranging to fixed beacons,
//! while a particle filter estimates its position from the commanded steps and the noisy ranges.
//!
//! You can run simulations either by:
//!   1. Loading all parameters from a configuration file (TOML/JSON/YAML)
//!   2. Specifying parameters via command-line flags
//!
//! Several independent trials can be run at once (`--trials`), optionally in parallel.

mod common;
#[cfg(feature = "plotting")]
mod plotting;

use clap::{Args, Parser, Subcommand};
use common::{TrialSummary, init_logger, trial_output_path, validate_output_path};
use log::{error, info};
use rayon::prelude::*;
use std::error::Error;
use std::path::{Path, PathBuf};

use beaconpf::particle::{EstimateStrategy, InitialDistribution, ResamplingStrategy};
use beaconpf::sensing::Beacon;
use beaconpf::sim::{SimulationConfig, SimulationResult, run_simulation};

const LONG_ABOUT: &str = "BEACON SIM: closed-loop simulation driver for the beacon particle filter.

A simulated agent moves around a circular one-dimensional world, ranging to fixed beacons, while
a particle filter estimates its position from the commanded steps and the noisy ranges. Each tick
the filter runs a motion update, an observation update and a resampling step.

You can run simulations either by:
  1. Loading all parameters from a configuration file (TOML/JSON/YAML)
  2. Specifying parameters via command-line flags

Per-tick results (truth, estimate, error, spread) are written as CSV when an output path is given.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Closed-loop simulation driver for the beacon particle filter.", long_about = LONG_ABOUT)]
struct Cli {
    /// Run simulation from a configuration file (TOML/JSON/YAML)
    /// This option overrides any subcommand arguments
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Command to execute (ignored if --config is provided)
    #[command(subcommand)]
    command: Option<Command>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Number of independent trials; trial `i` uses seed `seed + i`
    #[arg(long, default_value_t = 1, global = true)]
    trials: usize,

    /// Run trials in parallel
    #[arg(long, global = true)]
    parallel: bool,

    /// Generate a PNG plot of truth, estimate and particle cloud (requires --features plotting)
    #[arg(long, global = true)]
    plot: bool,
}

/// Top-level commands
#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        name = "run",
        about = "Run a simulation configured from command-line flags",
        long_about = "Run a closed-loop simulation. The agent advances by the commanded step plus forward noise each tick and senses every beacon within the maximum range. The particle filter predicts with the same commanded step, weights particles by the range likelihoods and resamples."
    )]
    Run(RunArgs),

    #[command(name = "config", about = "Write a template configuration file")]
    CreateConfig(CreateConfigArgs),
}

/// Simulation arguments
#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Output CSV file path for per-tick records
    #[arg(short, long, value_parser)]
    output: Option<PathBuf>,

    /// Number of particles
    #[arg(long, default_value_t = 100)]
    num_particles: usize,

    /// Circumference of the circular world
    #[arg(long, default_value_t = 100.0)]
    world_size: f64,

    /// Beacon x coordinates
    ///
    /// Examples:
    /// - `--beacons 80`
    /// - `--beacons 20,80`
    #[arg(long, value_delimiter = ',', default_value = "80")]
    beacons: Vec<f64>,

    /// Commanded step per tick (may be negative)
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    commanded_step: f64,

    /// True forward noise standard deviation of the agent
    #[arg(long, default_value_t = 0.5)]
    forward_noise: f64,

    /// Motion noise standard deviation assumed by the filter
    #[arg(long, default_value_t = 0.5)]
    motion_noise: f64,

    /// Range noise standard deviation
    #[arg(long, default_value_t = 2.0)]
    sense_noise: f64,

    /// Maximum sensing range
    #[arg(long, default_value_t = 20.0)]
    max_range: f64,

    /// Initial true position of the agent
    #[arg(long, default_value_t = 0.0)]
    initial_position: f64,

    /// Stop once the agent reaches this position (defaults to world_size - commanded_step)
    #[arg(long)]
    stop_position: Option<f64>,

    /// Hard limit on the number of ticks
    #[arg(long, default_value_t = 1000)]
    max_ticks: usize,

    /// Spread initial particles uniformly over the world instead of at the initial position
    #[arg(long)]
    uniform_prior: bool,

    /// Resampling scheme
    #[arg(long, value_enum, default_value_t = ResamplingStrategy::Multinomial)]
    resampling: ResamplingStrategy,

    /// Point estimate extracted from the particle cloud
    #[arg(long, value_enum, default_value_t = EstimateStrategy::CircularMean)]
    estimate: EstimateStrategy,

    /// RNG seed for stochastic processes
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl From<&RunArgs> for SimulationConfig {
    fn from(args: &RunArgs) -> Self {
        let initial_distribution = args.uniform_prior.then_some(InitialDistribution::Uniform);
        SimulationConfig {
            world_size: args.world_size,
            num_particles: args.num_particles,
            commanded_step: args.commanded_step,
            forward_noise: args.forward_noise,
            motion_noise: args.motion_noise,
            sense_noise: args.sense_noise,
            max_range: args.max_range,
            initial_position: args.initial_position,
            stop_position: args.stop_position,
            max_ticks: args.max_ticks,
            resampling_strategy: args.resampling,
            estimate_strategy: args.estimate,
            output: args
                .output
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            seed: args.seed,
            beacons: args.beacons.iter().map(|&x| Beacon::new(x, 0.0)).collect(),
            initial_distribution,
            ..SimulationConfig::default()
        }
    }
}

/// Arguments for create-config command
#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Output file path for the config file
    /// File extension determines format: .json, .yaml/.yml, or .toml (recommended)
    #[arg(short, long, value_parser)]
    output: PathBuf,
}

/// Write the default reference scenario as a configuration template.
fn create_config_file(args: &CreateConfigArgs) -> Result<(), Box<dyn Error>> {
    validate_output_path(&args.output)?;
    SimulationConfig::default().to_file(&args.output)?;
    info!("Wrote configuration template to {}", args.output.display());
    Ok(())
}

/// Print a short report of one run.
fn report(result: &SimulationResult) {
    let mae = result.mean_absolute_error(10).unwrap_or(f64::NAN);
    let observed = result
        .records
        .iter()
        .filter(|r| r.measurement_count > 0)
        .count();
    println!("Seed: {}", result.seed);
    println!("Ticks: {} ({} with beacon measurements)", result.ticks(), observed);
    if let Some(last) = result.records.last() {
        println!(
            "Final: truth {:.2}, estimate {:.2}, error {:.2}, spread {:.2}",
            last.true_position, last.estimate, last.error, last.spread
        );
    }
    println!("Mean error over last 10 ticks: {:.3}", mae);
}

#[cfg(feature = "plotting")]
fn plot_result(result: &SimulationResult, config: &SimulationConfig) {
    let plot_path = config
        .output
        .as_ref()
        .map(|o| Path::new(o).with_extension("png"))
        .unwrap_or_else(|| PathBuf::from("beacon_sim.png"));
    info!("Generating plot at {}", plot_path.display());
    match plotting::plot_run(result, &config.beacons, config.world_size, &plot_path) {
        Ok(()) => info!("Plot generated successfully"),
        Err(e) => error!("Failed to generate plot: {}", e),
    }
}

#[cfg(not(feature = "plotting"))]
fn plot_result(_result: &SimulationResult, _config: &SimulationConfig) {
    error!("Plotting requested but 'plotting' feature not enabled. Rebuild with --features plotting");
}

/// Run one or more trials of `config`.
fn execute(
    mut config: SimulationConfig,
    trials: usize,
    parallel: bool,
    plot: bool,
) -> Result<(), Box<dyn Error>> {
    if plot {
        config.record_particles = true;
    }
    if let Some(output) = &config.output {
        validate_output_path(Path::new(output))?;
    }
    config.validate()?;

    if trials <= 1 {
        let result = run_simulation(&config)?;
        report(&result);
        if plot {
            plot_result(&result, &config);
        }
        return Ok(());
    }

    let configs: Vec<SimulationConfig> = (0..trials)
        .map(|i| SimulationConfig {
            seed: config.seed.wrapping_add(i as u64),
            output: config.output.as_ref().map(|o| {
                trial_output_path(Path::new(o), i)
                    .to_string_lossy()
                    .into_owned()
            }),
            record_particles: false,
            ..config.clone()
        })
        .collect();
    if plot {
        info!("Plotting is skipped for multi-trial runs");
    }
    info!(
        "Running {} trials{}",
        trials,
        if parallel { " in parallel" } else { "" }
    );

    let outcomes: Vec<(u64, Result<f64, String>)> = if parallel {
        configs.par_iter().map(run_trial).collect()
    } else {
        configs.iter().map(run_trial).collect()
    };

    let mut errors = Vec::new();
    let mut failures = 0;
    for (seed, outcome) in outcomes {
        match outcome {
            Ok(mae) => {
                info!("Trial seed {}: mean error {:.3}", seed, mae);
                errors.push(mae);
            }
            Err(message) => {
                error!("Trial seed {} failed: {}", seed, message);
                failures += 1;
            }
        }
    }
    if let Some(summary) = TrialSummary::from_errors(&errors) {
        println!("{summary}");
    }
    if failures > 0 {
        return Err(format!("{failures} of {trials} trials failed").into());
    }
    Ok(())
}

/// Run one trial and reduce it to its final-window error.
fn run_trial(config: &SimulationConfig) -> (u64, Result<f64, String>) {
    let outcome = run_simulation(config)
        .map_err(|e| e.to_string())
        .and_then(|result| {
            result
                .mean_absolute_error(10)
                .ok_or_else(|| "no ticks were simulated".to_string())
        });
    (config.seed, outcome)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // If --config is provided, load config and potentially override logger with config values
    if let Some(ref config_path) = cli.config {
        let config = SimulationConfig::from_file(config_path)?;
        let config_log_file = config.logging.file.as_ref().map(PathBuf::from);
        let log_file = cli.log_file.as_ref().or(config_log_file.as_ref());
        init_logger(&config.logging.level, log_file)?;
        info!("Loaded configuration from {}", config_path.display());
        return execute(config, cli.trials, cli.parallel, cli.plot);
    }

    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    match cli.command {
        Some(Command::Run(args)) => {
            execute(SimulationConfig::from(&args), cli.trials, cli.parallel, cli.plot)
        }
        Some(Command::CreateConfig(args)) => create_config_file(&args),
        None => {
            eprintln!("Error: No command provided. Use -h or --help for usage information.");
            std::process::exit(1);
        }
    }
}
