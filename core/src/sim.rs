//! Closed-loop simulation harness for the beacon particle filter.
//!
//! This module provides:
//! - `SimulationConfig` and `LoggingConfig`, readable and writable as JSON, YAML or TOML
//! - `run_simulation`, which drives a ground-truth [`Agent`] and a [`ParticleFilter`] tick by tick
//! - `SimulationResult` with per-tick records, error statistics and CSV export

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::agent::Agent;
use crate::particle::{
    EstimateStrategy, FilterConfig, InitialDistribution, ParticleFilter, ParticleState,
    ResamplingStrategy,
};
use crate::sensing::{Beacon, RangeSensor};
use crate::world::{signed_offset, toroidal_distance};

/// Default seed value for reproducible simulations
fn default_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging preferences carried by a configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// off, error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path; stderr when absent
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Full description of one simulated run.
///
/// The defaults reproduce the reference scenario: a 100 unit world with one beacon at 80, an
/// agent starting at 0 and stepping 1 unit per tick, 100 particles starting at the agent's
/// known initial position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub world_size: f64,
    pub num_particles: usize,
    /// Commanded step applied to both the agent and the filter each tick
    pub commanded_step: f64,
    /// Standard deviation of the agent's true forward noise
    pub forward_noise: f64,
    /// Standard deviation the filter assumes for motion noise
    pub motion_noise: f64,
    /// Standard deviation of range noise, used by both sensor and filter
    pub sense_noise: f64,
    pub max_range: f64,
    pub initial_position: f64,
    /// Stop once the agent reaches this position, measured along its unwrapped path from
    /// `initial_position`. Defaults to `world_size - commanded_step` for forward motion and
    /// to running until `max_ticks` otherwise.
    pub stop_position: Option<f64>,
    pub max_ticks: usize,
    pub resampling_strategy: ResamplingStrategy,
    pub estimate_strategy: EstimateStrategy,
    /// Keep a particle snapshot for every tick (needed for plotting)
    pub record_particles: bool,
    /// Optional CSV output path for per-tick records
    pub output: Option<String>,
    pub seed: u64,
    // Table-valued fields stay last so the TOML form is well ordered
    pub beacons: Vec<Beacon>,
    /// Initial particle placement. When absent every particle starts at `initial_position`.
    pub initial_distribution: Option<InitialDistribution>,
    pub logging: LoggingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            world_size: 100.0,
            num_particles: 100,
            commanded_step: 1.0,
            forward_noise: 0.5,
            motion_noise: 0.5,
            sense_noise: 2.0,
            max_range: 20.0,
            initial_position: 0.0,
            stop_position: None,
            max_ticks: 1000,
            resampling_strategy: ResamplingStrategy::default(),
            estimate_strategy: EstimateStrategy::default(),
            record_particles: false,
            output: None,
            seed: default_seed(),
            beacons: vec![Beacon::new(80.0, 0.0)],
            initial_distribution: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Filter construction parameters derived from this run.
    ///
    /// The filter's seed is offset from the simulation seed so that true noise and particle
    /// noise come from independent streams.
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            num_particles: self.num_particles,
            world_size: self.world_size,
            beacons: self.beacons.clone(),
            initial_distribution: self.initial_distribution(),
            resampling_strategy: self.resampling_strategy,
            estimate_strategy: self.estimate_strategy,
            seed: self.seed.wrapping_add(1),
        }
    }

    /// Particle placement, defaulting to the agent's known start.
    pub fn initial_distribution(&self) -> InitialDistribution {
        self.initial_distribution.unwrap_or(InitialDistribution::Fixed {
            position: self.initial_position,
        })
    }

    pub fn stop_position(&self) -> Option<f64> {
        match self.stop_position {
            Some(stop) => Some(stop),
            None if self.commanded_step > 0.0 => Some(self.world_size - self.commanded_step),
            None => None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.filter_config().validate()?;
        for (name, sigma) in [
            ("forward_noise", self.forward_noise),
            ("motion_noise", self.motion_noise),
        ] {
            if !sigma.is_finite() || sigma < 0.0 {
                anyhow::bail!("{name} must be finite and non-negative, got {sigma}");
            }
        }
        if !self.sense_noise.is_finite() || self.sense_noise <= 0.0 {
            anyhow::bail!(
                "sense_noise must be finite and positive, got {}",
                self.sense_noise
            );
        }
        if !self.max_range.is_finite() || self.max_range < 0.0 {
            anyhow::bail!(
                "max_range must be finite and non-negative, got {}",
                self.max_range
            );
        }
        if !self.commanded_step.is_finite() || !self.initial_position.is_finite() {
            anyhow::bail!("commanded_step and initial_position must be finite");
        }
        if let Some(stop) = self.stop_position
            && !stop.is_finite()
        {
            anyhow::bail!("stop_position must be finite, got {stop}");
        }
        if self.max_ticks == 0 {
            anyhow::bail!("max_ticks must be greater than zero");
        }
        Ok(())
    }

    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }
    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(io::Error::other)
    }
    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }
    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }
    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }
    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        toml::from_str(&s).map_err(io::Error::other)
    }
    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let p = path.as_ref();
        let ext = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        let ext = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }
}

/// Filter performance at one tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TickRecord {
    pub tick: usize,
    pub true_position: f64,
    pub estimate: f64,
    /// Shortest distance on the circle between estimate and truth
    pub error: f64,
    /// Weighted standard deviation of the particle cloud about the estimate
    pub spread: f64,
    pub measurement_count: usize,
    /// Effective sample size after the observation update, before resampling
    pub effective_sample_size: f64,
}

#[derive(Debug)]
pub struct SimulationResult {
    pub records: Vec<TickRecord>,
    /// Per-tick particle snapshots, present only when `record_particles` is set
    pub snapshots: Vec<Vec<ParticleState>>,
    pub final_state: Vec<ParticleState>,
    pub seed: u64,
}

impl SimulationResult {
    /// Mean estimation error over the last `last_n` ticks (all ticks if fewer ran).
    pub fn mean_absolute_error(&self, last_n: usize) -> Option<f64> {
        let start = self.records.len().saturating_sub(last_n);
        let tail = &self.records[start..];
        if tail.is_empty() {
            None
        } else {
            Some(tail.iter().map(|r| r.error).sum::<f64>() / tail.len() as f64)
        }
    }

    pub fn ticks(&self) -> usize {
        self.records.len()
    }

    /// Write the per-tick records to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Run one closed-loop simulation.
///
/// Each tick the agent moves and senses, then the filter performs its motion update,
/// observation update and resampling. The run ends when the agent's unwrapped path reaches the
/// stop position or after `max_ticks`.
pub fn run_simulation(config: &SimulationConfig) -> anyhow::Result<SimulationResult> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let sensor = RangeSensor::new(config.beacons.clone(), config.max_range, config.sense_noise);
    let mut agent = Agent::new(
        config.initial_position,
        config.world_size,
        config.forward_noise,
        sensor,
    );
    let mut filter = ParticleFilter::new(&config.filter_config());
    let stop = config.stop_position();
    info!(
        "Starting simulation: {} particles, {} beacons, seed {}",
        filter.num_particles(),
        config.beacons.len(),
        config.seed
    );

    let mut records = Vec::new();
    let mut snapshots = Vec::new();
    let mut tick = 0;
    let mut progress = config.initial_position;
    while tick < config.max_ticks && stop.is_none_or(|s| progress < s) {
        tick += 1;
        let previous = agent.position();
        let true_position = agent.move_by(config.commanded_step, &mut rng);
        progress += signed_offset(previous, true_position, config.world_size);
        let measurements = agent.sense(&mut rng);

        filter.motion_update(config.commanded_step, config.motion_noise);
        filter.observation_update(&measurements, config.sense_noise);
        let effective_sample_size = filter.effective_sample_size();
        filter.resample();

        let estimate = filter.get_estimate();
        let record = TickRecord {
            tick,
            true_position,
            estimate,
            error: toroidal_distance(estimate, true_position, config.world_size),
            spread: filter.certainty(estimate).sqrt(),
            measurement_count: measurements.len(),
            effective_sample_size,
        };
        debug!(
            "tick {}: truth {:.3}, estimate {:.3}, error {:.3}, {} measurements",
            record.tick,
            record.true_position,
            record.estimate,
            record.error,
            record.measurement_count
        );
        records.push(record);
        if config.record_particles {
            snapshots.push(filter.get_state());
        }
    }
    if let Some(stop) = stop
        && progress < stop
    {
        warn!(
            "Stopped after {} ticks at {:.3}, short of the stop position {:.3}",
            tick, agent.position(), stop
        );
    }

    let result = SimulationResult {
        records,
        snapshots,
        final_state: filter.get_state(),
        seed: config.seed,
    };
    info!(
        "Simulation finished after {} ticks; mean error over last 10 ticks: {:.3}",
        result.ticks(),
        result.mean_absolute_error(10).unwrap_or(f64::NAN)
    );
    if let Some(output) = &config.output {
        result.to_csv(output)?;
        info!("Wrote {} records to {}", result.ticks(), output);
    }
    Ok(result)
}
