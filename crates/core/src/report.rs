//! Structured result records emitted by aggregation algorithms.

/// Bounds of the noise distribution at a requested confidence level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceInterval {
    /// Lower bound of the interval.
    pub lower: f64,
    /// Upper bound of the interval.
    pub upper: f64,
    /// Confidence level in `(0, 1)` the interval was computed for.
    pub confidence_level: f64,
}

/// Accuracy report describing how much clamping distorted the true result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingReport<T> {
    /// Lower clamping bound that was applied.
    pub lower: T,
    /// Upper clamping bound that was applied.
    pub upper: T,
    /// Total number of ingested entries.
    pub num_inputs: u64,
    /// Number of entries that fell outside the bounds and were clamped.
    pub num_outside: u64,
}

/// Error report attached to an [`Output`].
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorReport<T> {
    /// Present iff bounds were inferred automatically.
    pub bounding_report: Option<BoundingReport<T>>,
    /// Present iff a noise confidence interval was computable.
    pub noise_confidence_interval: Option<ConfidenceInterval>,
}

// Manual impls to avoid a spurious `T: Default` bound from the derive.
impl<T> Default for ErrorReport<T> {
    fn default() -> Self {
        Self {
            bounding_report: None,
            noise_confidence_interval: None,
        }
    }
}

/// Result of a differentially private computation.
///
/// A default (empty) output is returned for a zero privacy budget.
#[derive(Clone, Debug, PartialEq)]
pub struct Output<T> {
    /// The noised result, absent when no budget was spent.
    pub value: Option<T>,
    /// Accuracy information about the result.
    pub error_report: Option<ErrorReport<T>>,
}

impl<T> Default for Output<T> {
    fn default() -> Self {
        Self {
            value: None,
            error_report: None,
        }
    }
}

impl<T> Output<T> {
    /// Mutable access to the error report, created on first use.
    pub fn error_report_mut(&mut self) -> &mut ErrorReport<T> {
        self.error_report.get_or_insert_with(ErrorReport::default)
    }
}
