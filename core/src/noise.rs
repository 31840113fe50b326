//! Gaussian noise model shared by the agent, the sensor and the particle filter.
//!
//! Two primitives live here:
//! - [`sample_gaussian`] draws motion and range noise from an injected random source.
//! - [`gaussian_likelihood`] scores how well a hypothesized range explains an observed range.
//!
//! The likelihood is the usual normal probability density
//!
//! $$
//! p(x \mid \mu, \sigma) = \frac{1}{\sqrt{2 \pi \sigma^2}} \exp\left( -\frac{(\mu - x)^2}{2 \sigma^2} \right)
//! $$
//!
//! which is symmetric in $\mu$ and $x$.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::PI;

/// Draw one sample from $N(\text{mean}, \sigma^2)$.
///
/// A `sigma` of exactly zero returns `mean` unchanged, which lets noise-free scenarios
/// run through the same code path.
///
/// # Panics
/// If `sigma` is negative or not finite.
pub fn sample_gaussian<R: Rng + ?Sized>(mean: f64, sigma: f64, rng: &mut R) -> f64 {
    assert!(
        sigma.is_finite() && sigma >= 0.0,
        "Noise standard deviation must be finite and non-negative, got {sigma}"
    );
    if sigma == 0.0 {
        return mean;
    }
    let z: f64 = StandardNormal.sample(rng);
    mean + sigma * z
}

/// Gaussian probability density of `x` under $N(\mu, \sigma^2)$.
///
/// # Panics
/// If `sigma` is not strictly positive. A zero standard deviation has no density and is a
/// caller error, not something to recover from.
pub fn gaussian_likelihood(mu: f64, sigma: f64, x: f64) -> f64 {
    assert!(
        sigma > 0.0,
        "Likelihood standard deviation must be strictly positive, got {sigma}"
    );
    let variance = sigma * sigma;
    (-(mu - x).powi(2) / (2.0 * variance)).exp() / (2.0 * PI * variance).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_likelihood_peak_of_standard_normal() {
        let expected = 1.0 / (2.0 * PI).sqrt();
        assert_approx_eq!(gaussian_likelihood(0.0, 1.0, 0.0), expected, 1e-12);
        assert_approx_eq!(gaussian_likelihood(0.0, 1.0, 0.0), 0.398_942_280_4, 1e-9);
    }

    #[test]
    fn test_likelihood_is_symmetric() {
        for &(mu, sigma, x) in &[(0.0, 1.0, 2.5), (12.0, 2.0, 9.3), (-4.0, 0.3, 7.1)] {
            assert_approx_eq!(
                gaussian_likelihood(mu, sigma, x),
                gaussian_likelihood(x, sigma, mu),
                1e-15
            );
        }
    }

    #[test]
    fn test_likelihood_one_sigma() {
        // exp(-1/2) / sqrt(2 pi sigma^2)
        let sigma = 2.0;
        let expected = (-0.5f64).exp() / (2.0 * PI * sigma * sigma).sqrt();
        assert_approx_eq!(gaussian_likelihood(10.0, sigma, 12.0), expected, 1e-12);
    }

    #[test]
    fn test_likelihood_underflows_to_zero() {
        assert_eq!(gaussian_likelihood(0.0, 1e-3, 1000.0), 0.0);
    }

    #[test]
    #[should_panic(expected = "strictly positive")]
    fn test_likelihood_rejects_zero_sigma() {
        gaussian_likelihood(0.0, 0.0, 0.0);
    }

    #[test]
    fn test_zero_sigma_sample_is_exact() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(sample_gaussian(3.25, 0.0, &mut rng), 3.25);
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn test_negative_sigma_sample_panics() {
        let mut rng = StdRng::seed_from_u64(7);
        sample_gaussian(0.0, -1.0, &mut rng);
    }

    #[test]
    fn test_sample_moments() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| sample_gaussian(5.0, 2.0, &mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        assert_approx_eq!(mean, 5.0, 0.1);
        assert_approx_eq!(variance, 4.0, 0.3);
    }
}
