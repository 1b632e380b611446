//! Test helpers for exercising algorithms without randomness.

use crate::error::Result;
use crate::mechanism::{MechanismBuilder, NoiseMechanism};
use crate::report::ConfidenceInterval;

/// A mechanism that adds no noise. Lets tests assert exact results while
/// still driving the mechanism build/rebuild paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroNoiseMechanism;

impl NoiseMechanism for ZeroNoiseMechanism {
    fn add_noise(&mut self, value: f64, _privacy_budget: f64) -> f64 {
        value
    }

    fn noise_confidence_interval(
        &self,
        confidence_level: f64,
        _privacy_budget: f64,
    ) -> Result<ConfidenceInterval> {
        Ok(ConfidenceInterval {
            lower: 0.0,
            upper: 0.0,
            confidence_level,
        })
    }

    fn memory_used(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

/// Builder for [`ZeroNoiseMechanism`], counting how often it built.
#[derive(Clone, Debug, Default)]
pub struct ZeroNoiseBuilder {
    builds: std::rc::Rc<std::cell::Cell<u64>>,
}

impl ZeroNoiseBuilder {
    /// Create a fresh builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many mechanisms this builder (and its clones) have produced.
    pub fn build_count(&self) -> u64 {
        self.builds.get()
    }
}

impl MechanismBuilder for ZeroNoiseBuilder {
    type Mechanism = ZeroNoiseMechanism;

    fn with_epsilon(self, _epsilon: f64) -> Self {
        self
    }

    fn with_sensitivity(self, _sensitivity: f64) -> Self {
        self
    }

    fn build(self) -> Result<ZeroNoiseMechanism> {
        self.builds.set(self.builds.get() + 1);
        Ok(ZeroNoiseMechanism)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_noise_passes_values_through() {
        let builder = ZeroNoiseBuilder::new();
        let mut mechanism = builder.clone().build().expect("build");
        assert_eq!(mechanism.add_noise(42.0, 0.5), 42.0);
        let interval = mechanism
            .noise_confidence_interval(0.9, 0.5)
            .expect("interval");
        assert_eq!((interval.lower, interval.upper), (0.0, 0.0));
    }

    #[test]
    fn builder_counts_builds_across_clones() {
        let builder = ZeroNoiseBuilder::new();
        assert_eq!(builder.build_count(), 0);
        builder.clone().build().expect("build");
        builder.clone().with_epsilon(1.0).build().expect("build");
        assert_eq!(builder.build_count(), 2);
    }
}
