//! One-dimensional Monte Carlo localization from noisy beacon ranges
//!
//! This crate estimates the position of an agent moving around a circular, one-dimensional world
//! using a particle filter. The agent receives a commanded step each tick and observes noisy
//! ranges to every known beacon within its sensing radius. The filter maintains a fixed-size
//! population of weighted position hypotheses whose distribution approximates the posterior over
//! the agent's true position.
//!
//! The estimation core lives in [`particle`]. Everything else supports it:
//! - [`noise`] provides Gaussian sampling and the Gaussian likelihood used to score ranges.
//! - [`world`] provides toroidal wraparound and distances on the circle.
//! - [`sensing`] defines beacons, measurements and the range sensor used to synthesize input.
//! - [`agent`] provides the ground-truth motion model.
//! - [`sim`] ties the pieces into a configurable closed-loop simulation with CSV output.
//!
//! ## Filter cycle
//!
//! Each tick runs three phases in order:
//!
//! $$
//! x_i \leftarrow (x_i + u + \epsilon_i) \bmod W, \quad \epsilon_i \sim N(0, \sigma_m^2)
//! $$
//!
//! $$
//! w_i = \prod_{k} p\left( z_k \mid |x_i - b_k|, \sigma_s \right)
//! $$
//!
//! followed by drawing $N$ particles with replacement with probability proportional to $w_i$.
//! Here $u$ is the commanded step, $W$ the world size, $z_k$ the observed range to beacon $k$ at
//! $b_k$, and $p$ the Gaussian density from [`noise::gaussian_likelihood`].
//!
//! Ranges only use the beacon's `x` coordinate. Beacons carry a `y` coordinate for rendering,
//! but it never enters the distance calculation.
//!
//! ```rust
//! use beaconpf::particle::{FilterConfig, InitialDistribution, ParticleFilter};
//! use beaconpf::sensing::{Beacon, Measurement};
//!
//! let config = FilterConfig {
//!     num_particles: 100,
//!     world_size: 100.0,
//!     beacons: vec![Beacon::new(80.0, 0.0)],
//!     initial_distribution: InitialDistribution::Fixed { position: 60.0 },
//!     ..FilterConfig::default()
//! };
//! let mut pf = ParticleFilter::new(&config);
//! let z = [Measurement::new(19.0, Beacon::new(80.0, 0.0))];
//! pf.step(1.0, 0.5, &z, 2.0);
//! assert_eq!(pf.get_state().len(), 100);
//! ```

pub mod agent;
pub mod noise;
pub mod particle;
pub mod sensing;
pub mod sim;
pub mod world;

pub use agent::Agent;
pub use particle::{Particle, ParticleFilter, ParticleState};
pub use sensing::{Beacon, Measurement, RangeSensor};
