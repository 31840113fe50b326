//! Ground-truth agent for driving the filter in simulation.
//!
//! The agent moves along the circular world by a commanded step plus Gaussian forward noise
//! and carries a [`RangeSensor`] for producing beacon observations from its true position.

use rand::Rng;

use crate::noise::sample_gaussian;
use crate::sensing::{Measurement, RangeSensor};
use crate::world::wrap_position;

/// Advance `position` by `commanded_step` with forward noise, wrapping at the world edge.
pub fn advance<R: Rng + ?Sized>(
    position: f64,
    commanded_step: f64,
    forward_noise: f64,
    world_size: f64,
    rng: &mut R,
) -> f64 {
    let moved = position + commanded_step + sample_gaussian(0.0, forward_noise, rng);
    wrap_position(moved, world_size)
}

#[derive(Clone, Debug)]
pub struct Agent {
    position: f64,
    world_size: f64,
    forward_noise: f64,
    sensor: RangeSensor,
}

impl Agent {
    pub fn new(position: f64, world_size: f64, forward_noise: f64, sensor: RangeSensor) -> Self {
        assert!(
            forward_noise >= 0.0,
            "Forward noise standard deviation must be non-negative"
        );
        Agent {
            position: wrap_position(position, world_size),
            world_size,
            forward_noise,
            sensor,
        }
    }
    pub fn position(&self) -> f64 {
        self.position
    }
    pub fn world_size(&self) -> f64 {
        self.world_size
    }
    pub fn sensor(&self) -> &RangeSensor {
        &self.sensor
    }
    pub fn set_forward_noise(&mut self, forward_noise: f64) {
        assert!(
            forward_noise >= 0.0,
            "Forward noise standard deviation must be non-negative"
        );
        self.forward_noise = forward_noise;
    }
    /// Move by `commanded_step` and return the new true position.
    pub fn move_by<R: Rng + ?Sized>(&mut self, commanded_step: f64, rng: &mut R) -> f64 {
        self.position = advance(
            self.position,
            commanded_step,
            self.forward_noise,
            self.world_size,
            rng,
        );
        self.position
    }
    /// Observe the beacons from the current true position.
    pub fn sense<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Measurement> {
        self.sensor.sense(self.position, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::Beacon;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sensor() -> RangeSensor {
        RangeSensor::new(vec![Beacon::new(80.0, 0.0)], 20.0, 0.0)
    }

    #[test]
    fn test_noise_free_advance() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_approx_eq!(advance(10.0, 2.5, 0.0, 100.0, &mut rng), 12.5, 1e-12);
    }

    #[test]
    fn test_advance_wraps_both_directions() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_approx_eq!(advance(99.5, 1.0, 0.0, 100.0, &mut rng), 0.5, 1e-12);
        assert_approx_eq!(advance(0.5, -1.0, 0.0, 100.0, &mut rng), 99.5, 1e-12);
    }

    #[test]
    fn test_agent_stays_in_world() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut agent = Agent::new(0.0, 100.0, 0.5, sensor());
        for _ in 0..500 {
            let p = agent.move_by(1.7, &mut rng);
            assert!((0.0..100.0).contains(&p));
        }
    }

    #[test]
    fn test_agent_senses_from_true_position() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut agent = Agent::new(55.0, 100.0, 0.0, sensor());
        assert!(agent.sense(&mut rng).is_empty());
        agent.move_by(10.0, &mut rng);
        let z = agent.sense(&mut rng);
        assert_eq!(z.len(), 1);
        assert_approx_eq!(z[0].observed_distance, 15.0, 1e-12);
    }
}
