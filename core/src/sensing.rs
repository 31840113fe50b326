//! Range sensing against a fixed set of beacons.
//!
//! The sensor reports a noisy distance to every beacon within `max_range` of the agent.
//! Beacons carry a planar `(x, y)` coordinate but ranges are measured along the world axis
//! only, so the `y` component never enters a distance.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::noise::sample_gaussian;

/// A known landmark. Only `x` participates in one-dimensional ranging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}
impl Beacon {
    pub fn new(x: f64, y: f64) -> Self {
        Beacon { x, y }
    }
    /// Absolute distance from `position` to this beacon along the world axis.
    pub fn range_from(&self, position: f64) -> f64 {
        (position - self.x).abs()
    }
}
impl Display for Beacon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// One noisy range observation to a specific beacon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub observed_distance: f64,
    pub beacon: Beacon,
}
impl Measurement {
    pub fn new(observed_distance: f64, beacon: Beacon) -> Self {
        Measurement {
            observed_distance,
            beacon,
        }
    }
}

/// Range sensor with a limited sensing radius and additive Gaussian noise.
#[derive(Clone, Debug)]
pub struct RangeSensor {
    pub beacons: Vec<Beacon>,
    pub max_range: f64,
    pub sense_noise: f64,
}
impl RangeSensor {
    pub fn new(beacons: Vec<Beacon>, max_range: f64, sense_noise: f64) -> Self {
        assert!(
            max_range >= 0.0,
            "Maximum sensing range must be non-negative"
        );
        assert!(
            sense_noise >= 0.0,
            "Sensing noise standard deviation must be non-negative"
        );
        RangeSensor {
            beacons,
            max_range,
            sense_noise,
        }
    }
    /// Observe every beacon within range of `true_position`.
    pub fn sense<R: Rng + ?Sized>(&self, true_position: f64, rng: &mut R) -> Vec<Measurement> {
        sense(
            true_position,
            &self.beacons,
            self.max_range,
            self.sense_noise,
            rng,
        )
    }
}

/// Produce a noisy range to each beacon whose true distance is at most `max_range`.
///
/// The result may be empty; beacons out of range are silently skipped.
pub fn sense<R: Rng + ?Sized>(
    true_position: f64,
    beacons: &[Beacon],
    max_range: f64,
    sense_noise: f64,
    rng: &mut R,
) -> Vec<Measurement> {
    beacons
        .iter()
        .filter_map(|beacon| {
            let distance = beacon.range_from(true_position);
            if distance <= max_range {
                let noisy = distance + sample_gaussian(0.0, sense_noise, rng);
                Some(Measurement::new(noisy, *beacon))
            } else {
                None
            }
        })
        .collect()
}
