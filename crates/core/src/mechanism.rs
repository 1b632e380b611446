//! Noise mechanisms for differential privacy.
//!
//! A mechanism adds calibrated noise to a scalar and can describe the noise
//! distribution through a confidence interval. Algorithms hold a cloneable
//! [`MechanismBuilder`] rather than a mechanism, because the sensitivity may
//! only become known at result-generation time and the mechanism must then be
//! rebuilt from scratch.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};
use statrs::distribution::{ContinuousCDF, Laplace};

use crate::error::{DpError, Result};
use crate::report::ConfidenceInterval;

/// Confidence level used for the error report attached to generated results.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// A noise mechanism calibrated to an epsilon and a sensitivity.
pub trait NoiseMechanism {
    /// Add noise to `value`, spending the given fraction of the mechanism's
    /// epsilon. A larger budget fraction buys less noise.
    fn add_noise(&mut self, value: f64, privacy_budget: f64) -> f64;

    /// The central interval containing the noise with probability
    /// `confidence_level`, for the given budget fraction.
    fn noise_confidence_interval(
        &self,
        confidence_level: f64,
        privacy_budget: f64,
    ) -> Result<ConfidenceInterval>;

    /// Approximate heap + inline footprint in bytes.
    fn memory_used(&self) -> usize;
}

/// A cloneable factory for noise mechanisms.
pub trait MechanismBuilder: Clone {
    /// The mechanism this builder produces.
    type Mechanism: NoiseMechanism;

    /// Set the epsilon the mechanism's noise is calibrated against.
    fn with_epsilon(self, epsilon: f64) -> Self;

    /// Set the sensitivity the mechanism's noise is calibrated against.
    fn with_sensitivity(self, sensitivity: f64) -> Self;

    /// Validate the configuration and produce a mechanism.
    fn build(self) -> Result<Self::Mechanism>;
}

/// Builder for [`LaplaceMechanism`].
#[derive(Clone, Debug, Default)]
pub struct LaplaceMechanismBuilder {
    epsilon: Option<f64>,
    sensitivity: Option<f64>,
    seed: Option<u64>,
}

impl LaplaceMechanismBuilder {
    /// Create a builder with no parameters set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the mechanism's noise stream for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl MechanismBuilder for LaplaceMechanismBuilder {
    type Mechanism = LaplaceMechanism;

    fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = Some(sensitivity);
        self
    }

    fn build(self) -> Result<LaplaceMechanism> {
        let epsilon = self
            .epsilon
            .ok_or_else(|| DpError::config("laplace mechanism requires an epsilon"))?;
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(DpError::invalid(format!(
                "epsilon must be positive and finite, got {epsilon}"
            )));
        }
        let sensitivity = self
            .sensitivity
            .ok_or_else(|| DpError::config("laplace mechanism requires a sensitivity"))?;
        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            return Err(DpError::invalid(format!(
                "sensitivity must be positive and finite, got {sensitivity}"
            )));
        }
        let rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(LaplaceMechanism {
            epsilon,
            sensitivity,
            rng,
        })
    }
}

/// Laplace mechanism: noise of scale `sensitivity / (epsilon * budget)`.
#[derive(Clone, Debug)]
pub struct LaplaceMechanism {
    epsilon: f64,
    sensitivity: f64,
    rng: ChaCha8Rng,
}

impl LaplaceMechanism {
    /// The epsilon this mechanism is calibrated against.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The sensitivity this mechanism is calibrated against.
    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    fn scale(&self, privacy_budget: f64) -> f64 {
        self.sensitivity / (self.epsilon * privacy_budget)
    }
}

impl NoiseMechanism for LaplaceMechanism {
    fn add_noise(&mut self, value: f64, privacy_budget: f64) -> f64 {
        let scale = self.scale(privacy_budget);
        if !scale.is_finite() || scale <= 0.0 {
            return value;
        }

        // Laplace noise sampled as the difference of two exponentials.
        let lambda = 1.0 / scale;
        let dist = match Exp::new(lambda) {
            Ok(d) => d,
            Err(_) => return value,
        };
        let noise = dist.sample(&mut self.rng) - dist.sample(&mut self.rng);
        value + noise
    }

    fn noise_confidence_interval(
        &self,
        confidence_level: f64,
        privacy_budget: f64,
    ) -> Result<ConfidenceInterval> {
        if !(0.0..1.0).contains(&confidence_level) || confidence_level == 0.0 {
            return Err(DpError::invalid(format!(
                "confidence level must be in (0, 1), got {confidence_level}"
            )));
        }
        if !privacy_budget.is_finite() || privacy_budget <= 0.0 {
            return Err(DpError::invalid(format!(
                "privacy budget must be positive and finite, got {privacy_budget}"
            )));
        }
        let scale = self.scale(privacy_budget);
        let dist = Laplace::new(0.0, scale)
            .map_err(|e| DpError::numerical(format!("laplace distribution: {e}")))?;
        let tail = (1.0 - confidence_level) / 2.0;
        Ok(ConfidenceInterval {
            lower: dist.inverse_cdf(tail),
            upper: dist.inverse_cdf(1.0 - tail),
            confidence_level,
        })
    }

    fn memory_used(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mechanism(seed: u64) -> LaplaceMechanism {
        LaplaceMechanismBuilder::new()
            .with_seed(seed)
            .with_epsilon(1.0)
            .with_sensitivity(1.0)
            .build()
            .expect("valid mechanism")
    }

    #[test]
    fn build_rejects_missing_parameters() {
        assert!(LaplaceMechanismBuilder::new().build().is_err());
        assert!(LaplaceMechanismBuilder::new()
            .with_epsilon(1.0)
            .build()
            .is_err());
    }

    #[test]
    fn build_rejects_invalid_parameters() {
        assert!(LaplaceMechanismBuilder::new()
            .with_epsilon(0.0)
            .with_sensitivity(1.0)
            .build()
            .is_err());
        assert!(LaplaceMechanismBuilder::new()
            .with_epsilon(1.0)
            .with_sensitivity(f64::INFINITY)
            .build()
            .is_err());
        assert!(LaplaceMechanismBuilder::new()
            .with_epsilon(f64::NAN)
            .with_sensitivity(1.0)
            .build()
            .is_err());
    }

    #[test]
    fn build_exposes_its_calibration() {
        let m = LaplaceMechanismBuilder::new()
            .with_epsilon(2.0)
            .with_sensitivity(5.0)
            .build()
            .expect("valid mechanism");
        assert_eq!(m.epsilon(), 2.0);
        assert_eq!(m.sensitivity(), 5.0);
    }

    #[test]
    fn noise_is_deterministic_under_a_seed() {
        let mut m1 = mechanism(42);
        let mut m2 = mechanism(42);
        for _ in 0..16 {
            assert_eq!(m1.add_noise(0.0, 1.0), m2.add_noise(0.0, 1.0));
        }
    }

    #[test]
    fn noise_statistics_match_the_scale() {
        let mut m = mechanism(123);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| m.add_noise(0.0, 1.0)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        // Laplace(b=1): mean 0, variance 2b^2 = 2.
        assert!(mean.abs() < 0.05);
        assert!((var - 2.0).abs() < 0.2);
    }

    #[test]
    fn smaller_budget_means_more_noise() {
        let m = mechanism(7);
        let tight = m.noise_confidence_interval(0.95, 1.0).expect("interval");
        let loose = m.noise_confidence_interval(0.95, 0.5).expect("interval");
        assert!(loose.upper > tight.upper);
        assert!((tight.lower + tight.upper).abs() < 1e-9);
    }

    #[test]
    fn confidence_interval_rejects_bad_arguments() {
        let m = mechanism(7);
        assert!(m.noise_confidence_interval(0.0, 1.0).is_err());
        assert!(m.noise_confidence_interval(1.0, 1.0).is_err());
        assert!(m.noise_confidence_interval(0.95, 0.0).is_err());
        assert!(m.noise_confidence_interval(0.95, f64::NAN).is_err());
    }
}
