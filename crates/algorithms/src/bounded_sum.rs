//! Differentially private bounded sum.
//!
//! [`BoundedSum`] incrementally sums a stream of values clamped to a range
//! that bounds each record's contribution (the sensitivity). Bounds are
//! either fixed manually at build time or inferred from the data by an
//! attached [`ApproxBounds`] estimator at result-generation time, spending
//! half of the passed privacy budget on the inference. Partial state
//! serializes into a [`Summary`] so that shards ingesting disjoint data can
//! be merged into one aggregator before a single noise-addition pass.

use dp_stats_core::{
    clamp, BoundedSumSummary, ConfidenceInterval, DpError, LaplaceMechanismBuilder,
    MechanismBuilder, NoiseMechanism, Numeric, Output, Result, Summary, SummaryPayload,
    DEFAULT_CONFIDENCE_LEVEL,
};

use crate::approx_bounds::ApproxBounds;

/// How clamping bounds are determined, fixed for the aggregator's lifetime.
pub enum BoundsPolicy<T: Numeric> {
    /// Caller-supplied bounds, fixed at construction.
    Manual {
        /// Lower clamping bound.
        lower: T,
        /// Upper clamping bound.
        upper: T,
    },
    /// Bounds inferred from the data at result-generation time.
    Auto {
        /// The owned estimator fed a copy of every ingested value.
        estimator: ApproxBounds<T>,
        /// Bounds resolved by the most recent result generation.
        resolved: Option<(T, T)>,
    },
}

/// Builder for [`BoundedSum`].
pub struct BoundedSumBuilder<T: Numeric, B: MechanismBuilder = LaplaceMechanismBuilder> {
    epsilon: Option<f64>,
    bounds: Option<(T, T)>,
    estimator: Option<ApproxBounds<T>>,
    mechanism_builder: B,
}

impl<T: Numeric> BoundedSumBuilder<T, LaplaceMechanismBuilder> {
    /// Create a builder using the Laplace mechanism.
    pub fn new() -> Self {
        Self {
            epsilon: None,
            bounds: None,
            estimator: None,
            mechanism_builder: LaplaceMechanismBuilder::new(),
        }
    }
}

impl<T: Numeric> Default for BoundedSumBuilder<T, LaplaceMechanismBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Numeric, B: MechanismBuilder> BoundedSumBuilder<T, B> {
    /// Set the total epsilon of the aggregation.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    /// Fix clamping bounds manually. Mutually exclusive with
    /// [`Self::with_approx_bounds`].
    pub fn with_bounds(mut self, lower: T, upper: T) -> Self {
        self.bounds = Some((lower, upper));
        self
    }

    /// Attach an estimator that infers bounds from the data. Mutually
    /// exclusive with [`Self::with_bounds`].
    pub fn with_approx_bounds(mut self, estimator: ApproxBounds<T>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Replace the noise mechanism factory.
    pub fn with_mechanism_builder<B2: MechanismBuilder>(
        self,
        mechanism_builder: B2,
    ) -> BoundedSumBuilder<T, B2> {
        BoundedSumBuilder {
            epsilon: self.epsilon,
            bounds: self.bounds,
            estimator: self.estimator,
            mechanism_builder,
        }
    }

    /// Validate the configuration and construct the aggregator.
    pub fn build(self) -> Result<BoundedSum<T, B>> {
        let epsilon = validate_epsilon(self.epsilon)?;
        match (self.bounds, self.estimator) {
            (Some(_), Some(_)) => Err(DpError::config(
                "set manual bounds or attach a bounds estimator, not both",
            )),
            (None, None) => Err(DpError::config(
                "either set manual bounds or attach a bounds estimator",
            )),
            (Some((lower, upper)), None) => {
                if lower.is_nan() || upper.is_nan() || lower > upper {
                    return Err(DpError::invalid(
                        "manual bounds must satisfy lower <= upper",
                    ));
                }
                check_lower_bound(lower)?;
                // Built eagerly so an unusable sensitivity fails the build.
                let mechanism = self
                    .mechanism_builder
                    .clone()
                    .with_epsilon(epsilon)
                    .with_sensitivity(sensitivity(lower, upper))
                    .build()?;
                Ok(BoundedSum {
                    epsilon,
                    pos_sum: vec![T::zero()],
                    neg_sum: Vec::new(),
                    policy: BoundsPolicy::Manual { lower, upper },
                    mechanism_builder: self.mechanism_builder,
                    mechanism: Some(mechanism),
                })
            }
            (None, Some(estimator)) => {
                let bins = estimator.num_positive_bins();
                Ok(BoundedSum {
                    epsilon,
                    pos_sum: vec![T::zero(); bins],
                    neg_sum: vec![T::zero(); bins],
                    policy: BoundsPolicy::Auto {
                        estimator,
                        resolved: None,
                    },
                    mechanism_builder: self.mechanism_builder,
                    mechanism: None,
                })
            }
        }
    }
}

/// Incrementally computed, differentially private, clamped sum.
pub struct BoundedSum<T: Numeric, B: MechanismBuilder = LaplaceMechanismBuilder> {
    epsilon: f64,
    // One slot under manual bounds; one per estimator bin otherwise.
    // Lengths are fixed at construction.
    pos_sum: Vec<T>,
    neg_sum: Vec<T>,
    policy: BoundsPolicy<T>,
    mechanism_builder: B,
    // Present from construction under manual bounds; rebuilt whenever the
    // resolved bounds, and so the sensitivity, change.
    mechanism: Option<B::Mechanism>,
}

impl<T: Numeric> BoundedSum<T, LaplaceMechanismBuilder> {
    /// Start building an aggregator using the Laplace mechanism.
    pub fn builder() -> BoundedSumBuilder<T, LaplaceMechanismBuilder> {
        BoundedSumBuilder::new()
    }
}

impl<T: Numeric, B: MechanismBuilder> BoundedSum<T, B> {
    /// The total epsilon of the aggregation.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The lower clamping bound, if fixed or already resolved.
    pub fn lower(&self) -> Option<T> {
        match &self.policy {
            BoundsPolicy::Manual { lower, .. } => Some(*lower),
            BoundsPolicy::Auto { resolved, .. } => resolved.map(|(lower, _)| lower),
        }
    }

    /// The upper clamping bound, if fixed or already resolved.
    pub fn upper(&self) -> Option<T> {
        match &self.policy {
            BoundsPolicy::Manual { upper, .. } => Some(*upper),
            BoundsPolicy::Auto { resolved, .. } => resolved.map(|(_, upper)| upper),
        }
    }

    /// Ingest one value. NaN values are silently dropped.
    pub fn add_entry(&mut self, value: T) {
        if value.is_nan() {
            return;
        }
        match &mut self.policy {
            BoundsPolicy::Manual { lower, upper } => {
                let clamped = clamp(*lower, *upper, value);
                self.pos_sum[0] = self.pos_sum[0].saturating_add(clamped);
            }
            BoundsPolicy::Auto { estimator, .. } => {
                estimator.add_entry(value);
                if value >= T::zero() {
                    estimator.add_to_partial_sums(&mut self.pos_sum, value);
                } else {
                    estimator.add_to_partial_sums(&mut self.neg_sum, value);
                }
            }
        }
    }

    /// Generate the noised sum, spending `privacy_budget`.
    ///
    /// A zero budget returns a default output without touching any state.
    /// Under automatic bounds, half the budget is reserved for bound
    /// inference and the noised sum uses the remainder.
    pub fn generate_result(&mut self, privacy_budget: f64) -> Result<Output<T>> {
        if privacy_budget.is_nan() || privacy_budget < 0.0 {
            return Err(DpError::invalid(format!(
                "privacy budget must be non-negative, got {privacy_budget}"
            )));
        }
        if privacy_budget == 0.0 {
            return Ok(Output::default());
        }

        let mut output = Output::default();
        let mut remaining_budget = privacy_budget;
        let sum = match &mut self.policy {
            BoundsPolicy::Auto {
                estimator,
                resolved,
            } => {
                let bounds_budget = privacy_budget / 2.0;
                remaining_budget -= bounds_budget;
                let (found_lower, found_upper) = estimator.generate_result(bounds_budget)?;
                check_lower_bound(found_lower)?;

                // Sensitivity is determined by the larger-magnitude bound
                // alone, so widen the smaller side to that bound's negation.
                // This costs no sensitivity and minimizes clamping error.
                let neg_upper = found_upper.saturating_neg();
                let neg_lower = found_lower.saturating_neg();
                let lower = if found_lower < neg_upper {
                    found_lower
                } else {
                    neg_upper
                };
                let upper = if found_upper > neg_lower {
                    found_upper
                } else {
                    neg_lower
                };
                *resolved = Some((lower, upper));

                let sum = estimator.compute_from_partials(
                    &self.pos_sum,
                    &self.neg_sum,
                    |x| x,
                    lower,
                    upper,
                    0,
                );
                output.error_report_mut().bounding_report =
                    Some(estimator.bounding_report(lower, upper));

                // The sensitivity may have changed with the bounds.
                self.mechanism = None;
                sum.to_f64()
            }
            // Entries were clamped as they arrived.
            BoundsPolicy::Manual { .. } => self.pos_sum[0].to_f64(),
        };

        let mechanism = self.mechanism_mut()?;
        if let Ok(interval) =
            mechanism.noise_confidence_interval(DEFAULT_CONFIDENCE_LEVEL, remaining_budget)
        {
            output.error_report_mut().noise_confidence_interval = Some(interval);
        }

        let noisy_sum = mechanism.add_noise(sum, remaining_budget);
        output.value = Some(T::from_f64(noisy_sum));
        Ok(output)
    }

    /// The noise confidence interval for a result at the given budget.
    ///
    /// Only available under manual bounds: with automatic bounds the
    /// sensitivity changes per result generation, so the interval must be
    /// read from the generated result's error report instead.
    pub fn noise_confidence_interval(
        &mut self,
        confidence_level: f64,
        privacy_budget: f64,
    ) -> Result<ConfidenceInterval> {
        if matches!(self.policy, BoundsPolicy::Auto { .. }) {
            return Err(DpError::config(
                "noise confidence interval changes per result generation when \
                 sensitivity is determined automatically; read it from the \
                 generated result's error report",
            ));
        }
        self.mechanism_mut()?
            .noise_confidence_interval(confidence_level, privacy_budget)
    }

    /// Snapshot the mergeable partial state.
    pub fn serialize(&self) -> Summary<T> {
        let bounds_summary = match &self.policy {
            BoundsPolicy::Auto { estimator, .. } => Some(estimator.summary()),
            BoundsPolicy::Manual { .. } => None,
        };
        Summary::new(SummaryPayload::BoundedSum(BoundedSumSummary {
            pos_sum: self.pos_sum.clone(),
            neg_sum: self.neg_sum.clone(),
            bounds_summary,
        }))
    }

    /// Fold a peer's partial state into this aggregator.
    ///
    /// Epsilon, bounds, and the mechanism stay as configured on `self`.
    /// Fails without mutating when the summary carries no bounded-sum
    /// payload or its shape does not match this aggregator's configuration.
    pub fn merge(&mut self, summary: &Summary<T>) -> Result<()> {
        let parts = match &summary.data {
            Some(SummaryPayload::BoundedSum(parts)) => parts,
            Some(_) => {
                return Err(DpError::config(
                    "cannot merge: summary does not hold bounded sum data",
                ))
            }
            None => return Err(DpError::config("cannot merge: summary has no payload")),
        };
        if parts.pos_sum.len() != self.pos_sum.len()
            || parts.neg_sum.len() != self.neg_sum.len()
        {
            return Err(DpError::config(format!(
                "merged bounded sum must have {} positive and {} negative partial \
                 sums, got {} and {}",
                self.pos_sum.len(),
                self.neg_sum.len(),
                parts.pos_sum.len(),
                parts.neg_sum.len()
            )));
        }
        if let BoundsPolicy::Auto { estimator, .. } = &self.policy {
            let nested = parts.bounds_summary.as_ref().ok_or_else(|| {
                DpError::config("cannot merge: summary is missing the nested estimator state")
            })?;
            estimator.check_merge_compatible(nested)?;
        }

        // All checks passed; mutation cannot fail from here on.
        for (own, peer) in self.pos_sum.iter_mut().zip(&parts.pos_sum) {
            *own = own.saturating_add(*peer);
        }
        for (own, peer) in self.neg_sum.iter_mut().zip(&parts.neg_sum) {
            *own = own.saturating_add(*peer);
        }
        if let BoundsPolicy::Auto { estimator, .. } = &mut self.policy {
            if let Some(nested) = parts.bounds_summary.as_ref() {
                estimator.merge_summary(nested)?;
            }
        }
        Ok(())
    }

    /// Zero the accumulators for a fresh pass under the same configuration.
    ///
    /// Under automatic bounds this also resets the estimator and drops the
    /// mechanism, since the sensitivity must be recomputed.
    pub fn reset(&mut self) {
        self.pos_sum.fill(T::zero());
        self.neg_sum.fill(T::zero());
        if let BoundsPolicy::Auto {
            estimator,
            resolved,
        } = &mut self.policy
        {
            estimator.reset_state();
            *resolved = None;
            self.mechanism = None;
        }
    }

    /// Approximate heap + inline footprint in bytes.
    pub fn memory_used(&self) -> usize {
        let mut memory = std::mem::size_of::<Self>()
            + (self.pos_sum.capacity() + self.neg_sum.capacity()) * std::mem::size_of::<T>();
        if let BoundsPolicy::Auto { estimator, .. } = &self.policy {
            memory += estimator.memory_used();
        }
        if let Some(mechanism) = &self.mechanism {
            memory += mechanism.memory_used();
        }
        memory
    }

    /// Lazily (re)build the mechanism from the current bounds.
    fn mechanism_mut(&mut self) -> Result<&mut B::Mechanism> {
        if self.mechanism.is_none() {
            let (lower, upper) = match &self.policy {
                BoundsPolicy::Manual { lower, upper } => (*lower, *upper),
                BoundsPolicy::Auto {
                    resolved: Some(bounds),
                    ..
                } => *bounds,
                BoundsPolicy::Auto { resolved: None, .. } => {
                    return Err(DpError::config(
                        "mechanism not yet constructed; generate a result first",
                    ))
                }
            };
            let mechanism = self
                .mechanism_builder
                .clone()
                .with_epsilon(self.epsilon)
                .with_sensitivity(sensitivity(lower, upper))
                .build()?;
            self.mechanism = Some(mechanism);
        }
        match &mut self.mechanism {
            Some(mechanism) => Ok(mechanism),
            None => Err(DpError::config("mechanism unavailable")),
        }
    }
}

fn validate_epsilon(epsilon: Option<f64>) -> Result<f64> {
    let epsilon = epsilon.ok_or_else(|| DpError::config("bounded sum requires an epsilon"))?;
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(DpError::invalid(format!(
            "epsilon must be positive and finite, got {epsilon}"
        )));
    }
    Ok(epsilon)
}

/// A lower bound is usable only if its negation stays representable.
fn check_lower_bound<T: Numeric>(lower: T) -> Result<()> {
    if lower.negation_overflows() {
        return Err(DpError::invalid(
            "lower bound cannot be larger in magnitude than the maximum \
             representable value; raise it by at least one",
        ));
    }
    Ok(())
}

fn sensitivity<T: Numeric>(lower: T, upper: T) -> f64 {
    lower.to_f64().abs().max(upper.to_f64().abs())
}
