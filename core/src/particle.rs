//! Particle filter for one-dimensional localization from beacon ranges.
//!
//! The filter keeps a fixed-size population of position hypotheses on a toroidal world and
//! runs the usual three-phase Bayes filter cycle once per tick:
//!
//! 1. [`ParticleFilter::motion_update`] propagates every hypothesis with the commanded step
//!    plus independently sampled motion noise (prediction).
//! 2. [`ParticleFilter::observation_update`] resets each weight to `1.0` and multiplies in one
//!    Gaussian likelihood per beacon measurement (correction).
//! 3. [`ParticleFilter::resample`] draws a new population of the same size with replacement,
//!    proportionally to weight, and resets every weight to `1.0`.
//!
//! The phases must run in that order for correct estimation. [`ParticleFilter::step`] performs
//! all three at once. Calling `resample` without a preceding observation update is legal and
//! simply resamples uniformly, since every weight still holds its reset value.
//!
//! Randomness comes from a random source owned by the filter. [`ParticleFilter::new`] seeds a
//! `StdRng` from the configuration, and [`ParticleFilter::with_rng`] accepts any [`Rng`], which
//! is how tests inject deterministic sources.

use log::debug;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::{self, Debug, Display};

use crate::noise::{gaussian_likelihood, sample_gaussian};
use crate::sensing::{Beacon, Measurement};
use crate::world::{signed_offset, wrap_position};

/// Default seed value for reproducible filters
fn default_seed() -> u64 {
    42
}

/// Heading indicator carried by particles before any step has been commanded
pub const INITIAL_HEADING_INDICATOR: f64 = 1.0;

/// A single weighted position hypothesis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    /// Hypothesized position, always in `[0, world_size)`
    pub position: f64,
    /// Last commanded step; carried for rendering only and never used in estimation
    pub heading_indicator: f64,
    /// Unnormalized likelihood of the most recent measurement set
    pub weight: f64,
}
impl Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("position", &self.position)
            .field("heading_indicator", &self.heading_indicator)
            .field("weight", &self.weight)
            .finish()
    }
}
impl Particle {
    pub fn new(position: f64, heading_indicator: f64, weight: f64) -> Particle {
        Particle {
            position,
            heading_indicator,
            weight,
        }
    }
}

/// Read-only view of a particle handed to renderers and loggers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ParticleState {
    pub position: f64,
    pub heading_indicator: f64,
}
impl From<&Particle> for ParticleState {
    fn from(particle: &Particle) -> Self {
        ParticleState {
            position: particle.position,
            heading_indicator: particle.heading_indicator,
        }
    }
}

/// How the initial population is placed on the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitialDistribution {
    /// Every particle starts at the same known position.
    Fixed { position: f64 },
    /// Particles are spread uniformly over `[0, world_size)`.
    #[default]
    Uniform,
}

/// Point estimate extracted from the population.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum EstimateStrategy {
    /// Weighted arithmetic mean. Biased when the cloud straddles the world edge.
    Mean,
    /// Weighted mean direction on the circle; safe across the world edge.
    #[default]
    CircularMean,
    /// Position of the highest-weight particle.
    HighestWeight,
}

/// Importance resampling scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ResamplingStrategy {
    /// Independent draws from the weight distribution.
    #[default]
    Multinomial,
    /// One uniform offset and evenly spaced pointers.
    Systematic,
    /// One uniform draw inside each of `n` equal strata.
    Stratified,
    /// Deterministic integer copies followed by systematic draws on the remainders.
    Residual,
}

impl ResamplingStrategy {
    /// Draw `n` ancestor indices from `weights`.
    ///
    /// A weight vector with no positive finite mass degrades to uniform selection.
    pub fn resample<R: Rng + ?Sized>(&self, weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
        match self {
            ResamplingStrategy::Multinomial => multinomial_resample(weights, n, rng),
            ResamplingStrategy::Systematic => systematic_resample(weights, n, rng),
            ResamplingStrategy::Stratified => stratified_resample(weights, n, rng),
            ResamplingStrategy::Residual => residual_resample(weights, n, rng),
        }
    }
}

/// Normalize `weights` to sum to one, or return a uniform vector when there is no usable mass.
///
/// Negative and NaN entries count as zero. Infinite entries share the mass between them.
pub fn normalize_or_uniform(weights: &[f64]) -> Vec<f64> {
    if weights.is_empty() {
        return Vec::new();
    }
    let clean: Vec<f64> = if weights.iter().any(|w| *w == f64::INFINITY) {
        weights
            .iter()
            .map(|&w| if w == f64::INFINITY { 1.0 } else { 0.0 })
            .collect()
    } else {
        weights
            .iter()
            .map(|&w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
            .collect()
    };
    // Scale by the largest weight first so the sum cannot overflow
    let max_weight = clean.iter().copied().fold(0.0, f64::max);
    if max_weight > 0.0 {
        let total: f64 = clean.iter().map(|w| w / max_weight).sum();
        clean.iter().map(|w| w / max_weight / total).collect()
    } else {
        debug!(
            "All {} weights are zero or invalid; falling back to uniform selection",
            weights.len()
        );
        vec![1.0 / weights.len() as f64; weights.len()]
    }
}

fn cumulative_sum(weights: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    weights
        .iter()
        .map(|w| {
            total += w;
            total
        })
        .collect()
}

/// Walk the cumulative distribution with a non-decreasing sequence of pointers.
fn select_with_pointers(cdf: &[f64], pointers: impl Iterator<Item = f64>) -> Vec<usize> {
    let last = cdf.len() - 1;
    let mut j = 0;
    pointers
        .map(|u| {
            while j < last && cdf[j] <= u {
                j += 1;
            }
            j
        })
        .collect()
}

pub fn multinomial_resample<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }
    let cdf = cumulative_sum(&normalize_or_uniform(weights));
    let last = cdf.len() - 1;
    let total = cdf[last];
    (0..n)
        .map(|_| {
            let r = rng.random::<f64>() * total;
            cdf.partition_point(|&c| c <= r).min(last)
        })
        .collect()
}

pub fn systematic_resample<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
    if weights.is_empty() || n == 0 {
        return Vec::new();
    }
    let cdf = cumulative_sum(&normalize_or_uniform(weights));
    let step = cdf[cdf.len() - 1] / n as f64;
    let offset = rng.random::<f64>() * step;
    select_with_pointers(&cdf, (0..n).map(|i| offset + i as f64 * step))
}

pub fn stratified_resample<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
    if weights.is_empty() || n == 0 {
        return Vec::new();
    }
    let cdf = cumulative_sum(&normalize_or_uniform(weights));
    let step = cdf[cdf.len() - 1] / n as f64;
    let pointers: Vec<f64> = (0..n)
        .map(|i| (i as f64 + rng.random::<f64>()) * step)
        .collect();
    select_with_pointers(&cdf, pointers.into_iter())
}

pub fn residual_resample<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
    if weights.is_empty() || n == 0 {
        return Vec::new();
    }
    let normalized = normalize_or_uniform(weights);
    let mut indices = Vec::with_capacity(n);
    let mut residual = vec![0.0; normalized.len()];
    for (i, &w) in normalized.iter().enumerate() {
        let scaled = w * n as f64;
        let copies = scaled.floor() as usize;
        indices.extend(std::iter::repeat_n(i, copies));
        residual[i] = scaled - copies as f64;
    }
    indices.truncate(n);
    let remaining = n - indices.len();
    if remaining > 0 {
        indices.extend(systematic_resample(&residual, remaining, rng));
    }
    indices
}

/// Construction parameters for a [`ParticleFilter`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Fixed population size
    pub num_particles: usize,
    /// Circumference of the toroidal world
    pub world_size: f64,
    /// Known beacon positions
    #[serde(default)]
    pub beacons: Vec<Beacon>,
    #[serde(default)]
    pub initial_distribution: InitialDistribution,
    #[serde(default)]
    pub resampling_strategy: ResamplingStrategy,
    #[serde(default)]
    pub estimate_strategy: EstimateStrategy,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            num_particles: 100,
            world_size: 100.0,
            beacons: vec![Beacon::new(80.0, 0.0)],
            initial_distribution: InitialDistribution::default(),
            resampling_strategy: ResamplingStrategy::default(),
            estimate_strategy: EstimateStrategy::default(),
            seed: default_seed(),
        }
    }
}

impl FilterConfig {
    /// Check the construction preconditions without panicking.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num_particles == 0 {
            anyhow::bail!("num_particles must be greater than zero");
        }
        if !self.world_size.is_finite() || self.world_size <= 0.0 {
            anyhow::bail!(
                "world_size must be finite and positive, got {}",
                self.world_size
            );
        }
        if let InitialDistribution::Fixed { position } = self.initial_distribution
            && !position.is_finite()
        {
            anyhow::bail!("initial particle position must be finite, got {position}");
        }
        if let Some(beacon) = self
            .beacons
            .iter()
            .find(|b| !b.x.is_finite() || !b.y.is_finite())
        {
            anyhow::bail!("beacon coordinates must be finite, got {beacon}");
        }
        Ok(())
    }
}

/// One-dimensional particle filter over a toroidal world.
#[derive(Clone)]
pub struct ParticleFilter<R: Rng = StdRng> {
    particles: Vec<Particle>,
    world_size: f64,
    beacons: Vec<Beacon>,
    resampling_strategy: ResamplingStrategy,
    estimate_strategy: EstimateStrategy,
    rng: R,
}

impl<R: Rng> Debug for ParticleFilter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_weight = self
            .particles
            .iter()
            .map(|p| p.weight)
            .fold(f64::INFINITY, f64::min);
        let max_weight = self.particles.iter().map(|p| p.weight).fold(0.0, f64::max);
        f.debug_struct("ParticleFilter")
            .field("num_particles", &self.particles.len())
            .field("world_size", &self.world_size)
            .field("beacons", &self.beacons.len())
            .field("effective_particles", &self.effective_sample_size())
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            )
            .field("estimate", &format_args!("{:.3}", self.get_estimate()))
            .field("spread", &format_args!("{:.3}", self.get_certainty().sqrt()))
            .finish()
    }
}

impl ParticleFilter<StdRng> {
    /// Build a filter whose random source is a `StdRng` seeded from `config.seed`.
    pub fn new(config: &FilterConfig) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(config.seed))
    }
}

impl<R: Rng> ParticleFilter<R> {
    /// Build a filter drawing all randomness from `rng`.
    ///
    /// # Panics
    /// If `num_particles` is zero or `world_size` is not finite and positive. Use
    /// [`FilterConfig::validate`] to check these ahead of time.
    pub fn with_rng(config: &FilterConfig, mut rng: R) -> Self {
        assert!(
            config.num_particles > 0,
            "Particle filter requires at least one particle"
        );
        assert!(
            config.world_size.is_finite() && config.world_size > 0.0,
            "World size must be finite and positive"
        );
        let world_size = config.world_size;
        let particles = (0..config.num_particles)
            .map(|_| {
                let position = match config.initial_distribution {
                    InitialDistribution::Fixed { position } => position,
                    InitialDistribution::Uniform => rng.random_range(0.0..world_size),
                };
                Particle::new(
                    wrap_position(position, world_size),
                    INITIAL_HEADING_INDICATOR,
                    1.0,
                )
            })
            .collect();
        ParticleFilter {
            particles,
            world_size,
            beacons: config.beacons.clone(),
            resampling_strategy: config.resampling_strategy,
            estimate_strategy: config.estimate_strategy,
            rng,
        }
    }

    /// Build a filter from an explicit population.
    ///
    /// Positions are wrapped into the world.
    pub fn from_particles(
        particles: Vec<Particle>,
        world_size: f64,
        beacons: Vec<Beacon>,
        rng: R,
    ) -> Self {
        assert!(
            !particles.is_empty(),
            "Particle filter requires at least one particle"
        );
        assert!(
            particles.iter().all(|p| p.weight >= 0.0),
            "Particle weights must be non-negative"
        );
        let particles = particles
            .into_iter()
            .map(|p| Particle {
                position: wrap_position(p.position, world_size),
                ..p
            })
            .collect();
        ParticleFilter {
            particles,
            world_size,
            beacons,
            resampling_strategy: ResamplingStrategy::default(),
            estimate_strategy: EstimateStrategy::default(),
            rng,
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }
    pub fn world_size(&self) -> f64 {
        self.world_size
    }
    pub fn beacons(&self) -> &[Beacon] {
        &self.beacons
    }
    pub fn resampling_strategy(&self) -> ResamplingStrategy {
        self.resampling_strategy
    }
    pub fn set_resampling_strategy(&mut self, strategy: ResamplingStrategy) {
        self.resampling_strategy = strategy;
    }
    pub fn estimate_strategy(&self) -> EstimateStrategy {
        self.estimate_strategy
    }
    pub fn set_estimate_strategy(&mut self, strategy: EstimateStrategy) {
        self.estimate_strategy = strategy;
    }

    /// Prediction step: move every particle by `commanded_step` plus its own noise draw.
    pub fn motion_update(&mut self, commanded_step: f64, motion_noise: f64) {
        for particle in &mut self.particles {
            let delta = commanded_step + sample_gaussian(0.0, motion_noise, &mut self.rng);
            particle.position = wrap_position(particle.position + delta, self.world_size);
            particle.heading_indicator = commanded_step;
        }
    }

    /// Correction step: weight every particle by the product of per-beacon range likelihoods.
    ///
    /// Every weight is reset to `1.0` first, so an empty measurement set leaves the population
    /// uniformly weighted. Weights may underflow to zero when `sense_noise` is small relative
    /// to the actual range error; [`ParticleFilter::resample`] tolerates that.
    pub fn observation_update(&mut self, measurements: &[Measurement], sense_noise: f64) {
        for measurement in measurements {
            if !self.beacons.contains(&measurement.beacon) {
                debug!(
                    "Measurement references beacon {} outside the known beacon set",
                    measurement.beacon
                );
            }
        }
        for particle in &mut self.particles {
            particle.weight = 1.0;
            for measurement in measurements {
                let particle_distance = measurement.beacon.range_from(particle.position);
                particle.weight *= gaussian_likelihood(
                    particle_distance,
                    sense_noise,
                    measurement.observed_distance,
                );
            }
        }
    }

    /// Draw a new population of the same size with replacement, proportional to weight.
    ///
    /// Drawn particles keep their position and heading indicator and have their weight reset
    /// to `1.0`. An all-zero weight vector resamples uniformly.
    pub fn resample(&mut self) {
        let weights: Vec<f64> = self.particles.iter().map(|p| p.weight).collect();
        let indices =
            self.resampling_strategy
                .resample(&weights, self.particles.len(), &mut self.rng);
        self.particles = indices
            .into_iter()
            .map(|i| Particle {
                weight: 1.0,
                ..self.particles[i]
            })
            .collect();
    }

    /// Run motion update, observation update and resampling in their required order.
    pub fn step(
        &mut self,
        commanded_step: f64,
        motion_noise: f64,
        measurements: &[Measurement],
        sense_noise: f64,
    ) {
        self.motion_update(commanded_step, motion_noise);
        self.observation_update(measurements, sense_noise);
        self.resample();
    }

    /// Snapshot of positions and heading indicators for rendering.
    pub fn get_state(&self) -> Vec<ParticleState> {
        self.particles.iter().map(ParticleState::from).collect()
    }

    pub fn positions(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.particles.len(),
            self.particles.iter().map(|p| p.position),
        )
    }

    pub fn normalized_weights(&self) -> Vec<f64> {
        let weights: Vec<f64> = self.particles.iter().map(|p| p.weight).collect();
        normalize_or_uniform(&weights)
    }

    pub fn effective_sample_size(&self) -> f64 {
        let sum_of_squares: f64 = self.normalized_weights().iter().map(|w| w * w).sum();
        if sum_of_squares > 0.0 {
            1.0 / sum_of_squares
        } else {
            0.0
        }
    }

    /// Point estimate of the agent position using `strategy`.
    pub fn estimate(&self, strategy: EstimateStrategy) -> f64 {
        let positions = self.positions();
        let weights = DVector::from_vec(self.normalized_weights());
        match strategy {
            EstimateStrategy::Mean => wrap_position(weights.dot(&positions), self.world_size),
            EstimateStrategy::CircularMean => {
                let scale = 2.0 * PI / self.world_size;
                let sin_sum = weights.dot(&positions.map(|p| (p * scale).sin()));
                let cos_sum = weights.dot(&positions.map(|p| (p * scale).cos()));
                if sin_sum.hypot(cos_sum) < 1e-12 {
                    // No preferred direction; the cloud is spread evenly around the circle
                    wrap_position(weights.dot(&positions), self.world_size)
                } else {
                    wrap_position(sin_sum.atan2(cos_sum) / scale, self.world_size)
                }
            }
            EstimateStrategy::HighestWeight => {
                self.particles
                    .iter()
                    .fold(&self.particles[0], |best, p| {
                        if p.weight > best.weight { p } else { best }
                    })
                    .position
            }
        }
    }

    /// Weighted position variance about `estimate`, using shortest offsets on the circle.
    pub fn certainty(&self, estimate: f64) -> f64 {
        self.particles
            .iter()
            .zip(self.normalized_weights())
            .map(|(p, w)| w * signed_offset(estimate, p.position, self.world_size).powi(2))
            .sum()
    }

    pub fn get_estimate(&self) -> f64 {
        self.estimate(self.estimate_strategy)
    }

    pub fn get_certainty(&self) -> f64 {
        self.certainty(self.get_estimate())
    }
}
