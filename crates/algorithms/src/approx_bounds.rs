//! Approximate clamping-bound inference from the data distribution.
//!
//! [`ApproxBounds`] maintains two logarithmic magnitude histograms (one per
//! sign) and spends a fraction of the privacy budget to pick the smallest
//! bin boundaries that cover most of the data: each bin count gets Laplace
//! noise, and the outermost bins whose noisy counts clear a threshold derived
//! from the configured success probability become the bounds.
//!
//! The estimator also routes values into caller-owned partial-sum vectors,
//! one slot per bin, so an aggregation can later be folded over any choice of
//! final bounds without having stored the raw values.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};

use dp_stats_core::{
    ApproxBoundsSummary, BoundingReport, DpError, Numeric, Result, Summary, SummaryPayload,
};

/// Default number of histogram bins per sign.
const DEFAULT_NUM_BINS: usize = 64;
/// Default geometric growth factor between bin boundaries.
const DEFAULT_BASE: f64 = 2.0;
/// Default right boundary of the first bin.
const DEFAULT_SCALE: f64 = 1.0;
/// Default probability that no empty bin's noisy count clears the threshold.
const DEFAULT_SUCCESS_PROBABILITY: f64 = 1.0 - 1e-9;

/// Builder for [`ApproxBounds`].
#[derive(Clone, Debug)]
pub struct ApproxBoundsBuilder<T: Numeric> {
    epsilon: Option<f64>,
    num_bins: usize,
    base: f64,
    scale: f64,
    success_probability: f64,
    seed: Option<u64>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Numeric> Default for ApproxBoundsBuilder<T> {
    fn default() -> Self {
        Self {
            epsilon: None,
            num_bins: DEFAULT_NUM_BINS,
            base: DEFAULT_BASE,
            scale: DEFAULT_SCALE,
            success_probability: DEFAULT_SUCCESS_PROBABILITY,
            seed: None,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Numeric> ApproxBoundsBuilder<T> {
    /// Create a builder with default histogram geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the epsilon the bound inference is calibrated against.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    /// Set the number of bins per sign histogram.
    pub fn with_num_bins(mut self, num_bins: usize) -> Self {
        self.num_bins = num_bins;
        self
    }

    /// Set the geometric growth factor between bin boundaries.
    pub fn with_base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }

    /// Set the right boundary of the first bin.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the probability that bound inference does not report a spurious
    /// bound caused by noise on an empty bin. Higher values raise the
    /// detection threshold and need more data.
    pub fn with_success_probability(mut self, success_probability: f64) -> Self {
        self.success_probability = success_probability;
        self
    }

    /// Seed the estimator's noise stream for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration and produce an estimator.
    pub fn build(self) -> Result<ApproxBounds<T>> {
        let epsilon = self
            .epsilon
            .ok_or_else(|| DpError::config("approx bounds requires an epsilon"))?;
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(DpError::invalid(format!(
                "epsilon must be positive and finite, got {epsilon}"
            )));
        }
        if self.num_bins == 0 {
            return Err(DpError::invalid("num_bins must be at least 1"));
        }
        if !self.base.is_finite() || self.base <= 1.0 {
            return Err(DpError::invalid(format!(
                "base must be finite and greater than 1, got {}",
                self.base
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(DpError::invalid(format!(
                "scale must be positive and finite, got {}",
                self.scale
            )));
        }
        if !(self.success_probability > 0.0 && self.success_probability < 1.0) {
            return Err(DpError::invalid(format!(
                "success probability must be in (0, 1), got {}",
                self.success_probability
            )));
        }
        let rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(ApproxBounds {
            epsilon,
            num_bins: self.num_bins,
            base: self.base,
            scale: self.scale,
            success_probability: self.success_probability,
            pos_counts: vec![0; self.num_bins],
            neg_counts: vec![0; self.num_bins],
            rng,
            _marker: std::marker::PhantomData,
        })
    }
}

/// Logarithmic-histogram estimator of clamping bounds.
#[derive(Clone, Debug)]
pub struct ApproxBounds<T: Numeric> {
    epsilon: f64,
    num_bins: usize,
    base: f64,
    scale: f64,
    success_probability: f64,
    pos_counts: Vec<i64>,
    neg_counts: Vec<i64>,
    rng: ChaCha8Rng,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Numeric> ApproxBounds<T> {
    /// Start building an estimator.
    pub fn builder() -> ApproxBoundsBuilder<T> {
        ApproxBoundsBuilder::new()
    }

    /// The epsilon the bound inference is calibrated against.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of bins per sign histogram; fixes partial-sum vector sizing.
    pub fn num_positive_bins(&self) -> usize {
        self.num_bins
    }

    /// Right boundary of bin `index`, capped at `T`'s finite range.
    fn bin_boundary(&self, index: usize) -> f64 {
        let boundary = self.scale * self.base.powi(index as i32);
        boundary.min(T::max_finite().to_f64())
    }

    /// Index of the bin containing `magnitude`; the top bin absorbs overflow.
    fn bin_index(&self, magnitude: f64) -> usize {
        let mut index = 0;
        while index + 1 < self.num_bins && magnitude > self.bin_boundary(index) {
            index += 1;
        }
        index
    }

    /// Count `value` into the sign-matching histogram. NaN is dropped.
    pub fn add_entry(&mut self, value: T) {
        if value.is_nan() {
            return;
        }
        let v = value.to_f64();
        let index = self.bin_index(v.abs());
        if v >= 0.0 {
            self.pos_counts[index] += 1;
        } else {
            self.neg_counts[index] += 1;
        }
    }

    /// Distribute `value` across the caller's partial-sum slots.
    ///
    /// Slot `i` receives the signed portion of the value's magnitude that
    /// falls inside bin `i`'s range, so that the prefix sum of slots
    /// `0..=bin(bound)` over all routed values equals the sum of the values
    /// clamped to `[-bound, bound]`.
    pub fn add_to_partial_sums(&self, sums: &mut [T], value: T) {
        if value.is_nan() || sums.is_empty() {
            return;
        }
        let v = value.to_f64();
        let sign = if v < 0.0 { -1.0 } else { 1.0 };
        let magnitude = v.abs();
        let index = self.bin_index(magnitude).min(sums.len() - 1);
        for (i, slot) in sums.iter_mut().enumerate().take(index + 1) {
            let left = if i == 0 { 0.0 } else { self.bin_boundary(i - 1) };
            let segment = (magnitude.min(self.bin_boundary(i)) - left).max(0.0);
            *slot = slot.saturating_add(T::from_f64(sign * segment));
        }
    }

    /// Infer `[lower, upper]` bounds, spending the given privacy budget.
    ///
    /// Fails when no noisy bin count clears the detection threshold, which
    /// signals too few entries for the configured success probability.
    pub fn generate_result(&mut self, privacy_budget: f64) -> Result<(T, T)> {
        if !privacy_budget.is_finite() || privacy_budget <= 0.0 {
            return Err(DpError::invalid(format!(
                "privacy budget must be positive and finite, got {privacy_budget}"
            )));
        }
        let noise_scale = 1.0 / (privacy_budget * self.epsilon);
        let threshold = self.bin_count_threshold(noise_scale);

        let noisy = |counts: &[i64], rng: &mut ChaCha8Rng| -> Vec<f64> {
            counts
                .iter()
                .map(|&c| c as f64 + sample_laplace(rng, noise_scale))
                .collect()
        };
        let noisy_pos = noisy(&self.pos_counts, &mut self.rng);
        let noisy_neg = noisy(&self.neg_counts, &mut self.rng);

        // Upper bound: outermost passing positive bin, falling back to the
        // innermost passing negative bin when all data is negative.
        let upper = self
            .highest_passing(&noisy_pos, threshold)
            .map(|i| self.bin_boundary(i))
            .or_else(|| {
                self.lowest_passing(&noisy_neg, threshold)
                    .map(|i| -self.left_boundary(i))
            });
        let lower = self
            .highest_passing(&noisy_neg, threshold)
            .map(|i| -self.bin_boundary(i))
            .or_else(|| {
                self.lowest_passing(&noisy_pos, threshold)
                    .map(|i| self.left_boundary(i))
            });

        match (lower, upper) {
            (Some(lower), Some(upper)) => Ok((T::from_f64(lower), T::from_f64(upper))),
            _ => Err(DpError::numerical(
                "bin count threshold was too large to find approximate bounds; \
                 add more entries or lower the success probability",
            )),
        }
    }

    fn left_boundary(&self, index: usize) -> f64 {
        if index == 0 {
            0.0
        } else {
            self.bin_boundary(index - 1)
        }
    }

    fn highest_passing(&self, noisy_counts: &[f64], threshold: f64) -> Option<usize> {
        noisy_counts.iter().rposition(|&c| c >= threshold)
    }

    fn lowest_passing(&self, noisy_counts: &[f64], threshold: f64) -> Option<usize> {
        noisy_counts.iter().position(|&c| c >= threshold)
    }

    /// Smallest count a noisy bin must reach to be considered occupied.
    ///
    /// Chosen so that the probability of any of the `2 * num_bins` empty
    /// bins exceeding it stays below `1 - success_probability`:
    /// `P(Laplace(b) >= t) = exp(-t/b) / 2 <= alpha` per bin.
    fn bin_count_threshold(&self, noise_scale: f64) -> f64 {
        let alpha = (1.0 - self.success_probability) / (2.0 * self.num_bins as f64);
        noise_scale * (1.0 / (2.0 * alpha)).ln()
    }

    /// Fold stored partial sums into one aggregate under final bounds.
    ///
    /// `transform` is applied per included slot; pass the identity to obtain
    /// the clamped sum. Exact when the bounds are bin boundaries, which is
    /// what [`Self::generate_result`] returns. When the bound interval
    /// excludes zero the partials cannot reconstruct the clamped values and
    /// the result is approximated as `count` entries at the nearer bound.
    pub fn compute_from_partials(
        &self,
        pos_sums: &[T],
        neg_sums: &[T],
        transform: impl Fn(T) -> T,
        lower: T,
        upper: T,
        count: u64,
    ) -> T {
        let lo = lower.to_f64();
        let up = upper.to_f64();
        if lo >= 0.0 {
            return T::from_f64(count as f64 * transform(lower).to_f64());
        }
        if up <= 0.0 {
            return T::from_f64(count as f64 * transform(upper).to_f64());
        }

        let mut result = T::zero();
        let pos_limit = self.bin_index(up);
        for &partial in pos_sums.iter().take(pos_limit + 1) {
            result = result.saturating_add(transform(partial));
        }
        let neg_limit = self.bin_index(-lo);
        for &partial in neg_sums.iter().take(neg_limit + 1) {
            result = result.saturating_add(transform(partial));
        }
        result
    }

    /// Report how many ingested entries fell outside `[lower, upper]`.
    ///
    /// Counts whole bins beyond the bound's bin, so entries sharing the edge
    /// bin with the bound are treated as inside.
    pub fn bounding_report(&self, lower: T, upper: T) -> BoundingReport<T> {
        let lo = lower.to_f64();
        let up = upper.to_f64();
        let num_inputs: u64 = self
            .pos_counts
            .iter()
            .chain(self.neg_counts.iter())
            .map(|&c| c.max(0) as u64)
            .sum();

        let tail = |counts: &[i64], from: usize| -> u64 {
            counts.iter().skip(from).map(|&c| c.max(0) as u64).sum()
        };
        let pos_outside = if up >= 0.0 {
            tail(&self.pos_counts, self.bin_index(up) + 1)
        } else {
            tail(&self.pos_counts, 0)
        };
        let neg_outside = if lo <= 0.0 {
            tail(&self.neg_counts, self.bin_index(-lo) + 1)
        } else {
            tail(&self.neg_counts, 0)
        };

        BoundingReport {
            lower,
            upper,
            num_inputs,
            num_outside: pos_outside + neg_outside,
        }
    }

    /// Snapshot the histogram counts for nesting inside another summary.
    pub fn summary(&self) -> ApproxBoundsSummary {
        ApproxBoundsSummary {
            pos_counts: self.pos_counts.clone(),
            neg_counts: self.neg_counts.clone(),
        }
    }

    /// Snapshot the histogram counts into a standalone summary envelope.
    pub fn serialize(&self) -> Summary<T> {
        Summary::new(SummaryPayload::ApproxBounds(self.summary()))
    }

    /// Merge a peer estimator's summary envelope into this one.
    pub fn merge(&mut self, summary: &Summary<T>) -> Result<()> {
        match &summary.data {
            Some(SummaryPayload::ApproxBounds(parts)) => self.merge_summary(parts),
            Some(_) => Err(DpError::config(
                "cannot merge: summary does not hold approx bounds data",
            )),
            None => Err(DpError::config("cannot merge: summary has no payload")),
        }
    }

    /// Merge peer histogram counts. Fails without mutating on a bin-count
    /// mismatch, which signals incompatible histogram geometry.
    pub fn merge_summary(&mut self, parts: &ApproxBoundsSummary) -> Result<()> {
        self.check_merge_compatible(parts)?;
        for (own, peer) in self.pos_counts.iter_mut().zip(&parts.pos_counts) {
            *own = own.saturating_add(*peer);
        }
        for (own, peer) in self.neg_counts.iter_mut().zip(&parts.neg_counts) {
            *own = own.saturating_add(*peer);
        }
        Ok(())
    }

    /// Check that a peer summary has matching histogram shape.
    pub fn check_merge_compatible(&self, parts: &ApproxBoundsSummary) -> Result<()> {
        if parts.pos_counts.len() != self.num_bins || parts.neg_counts.len() != self.num_bins {
            return Err(DpError::config(format!(
                "merged approx bounds must have {} bins per sign, got {} and {}",
                self.num_bins,
                parts.pos_counts.len(),
                parts.neg_counts.len()
            )));
        }
        Ok(())
    }

    /// Approximate heap + inline footprint in bytes.
    pub fn memory_used(&self) -> usize {
        std::mem::size_of::<Self>()
            + (self.pos_counts.capacity() + self.neg_counts.capacity())
                * std::mem::size_of::<i64>()
    }

    /// Zero the histograms for a fresh accumulation pass.
    pub fn reset_state(&mut self) {
        self.pos_counts.fill(0);
        self.neg_counts.fill(0);
    }
}

fn sample_laplace(rng: &mut ChaCha8Rng, scale: f64) -> f64 {
    if !scale.is_finite() || scale <= 0.0 {
        return 0.0;
    }
    let dist = match Exp::new(1.0 / scale) {
        Ok(d) => d,
        Err(_) => return 0.0,
    };
    dist.sample(rng) - dist.sample(rng)
}
