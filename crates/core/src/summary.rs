//! Serializable snapshots of partial aggregator state.
//!
//! A [`Summary`] captures the mergeable portion of an algorithm's state so
//! that shards accumulating disjoint data in parallel can be combined into
//! one logical aggregator before a single result-generation pass. Summaries
//! never carry epsilon, bounds, or mechanism state.

use serde::{Deserialize, Serialize};

/// Snapshot of an approximate-bounds estimator's histograms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproxBoundsSummary {
    /// Per-bin entry counts for the positive histogram.
    pub pos_counts: Vec<i64>,
    /// Per-bin entry counts for the negative histogram.
    pub neg_counts: Vec<i64>,
}

/// Snapshot of a bounded-sum aggregator's partial sums.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundedSumSummary<T> {
    /// Positive-sign partial sums, one slot per estimator bin (one total
    /// under manual bounds).
    pub pos_sum: Vec<T>,
    /// Negative-sign partial sums (empty under manual bounds).
    pub neg_sum: Vec<T>,
    /// Nested estimator snapshot, present iff bounds are inferred
    /// automatically.
    pub bounds_summary: Option<ApproxBoundsSummary>,
}

/// The kind-tagged payload of a [`Summary`].
///
/// Merging checks the payload kind, so a summary produced by one algorithm
/// cannot be silently folded into another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SummaryPayload<T> {
    /// Bounded-sum partial state.
    BoundedSum(BoundedSumSummary<T>),
    /// Approximate-bounds estimator state.
    ApproxBounds(ApproxBoundsSummary),
}

/// Envelope for serialized partial aggregator state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary<T> {
    /// The payload, absent for an empty summary.
    pub data: Option<SummaryPayload<T>>,
}

impl<T> Summary<T> {
    /// Wrap a payload into an envelope.
    pub fn new(payload: SummaryPayload<T>) -> Self {
        Self {
            data: Some(payload),
        }
    }

    /// An envelope with no payload. Merging it always fails.
    pub fn empty() -> Self {
        Self { data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_round_trips_through_json() {
        let summary = Summary::new(SummaryPayload::BoundedSum(BoundedSumSummary {
            pos_sum: vec![1.5f64, 0.0],
            neg_sum: vec![-2.0, 0.0],
            bounds_summary: Some(ApproxBoundsSummary {
                pos_counts: vec![3, 0],
                neg_counts: vec![1, 0],
            }),
        }));
        let encoded = serde_json::to_string(&summary).expect("serialize");
        let decoded: Summary<f64> = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, summary);
    }

    #[test]
    fn empty_summary_has_no_payload() {
        let summary: Summary<i64> = Summary::empty();
        assert!(summary.data.is_none());
    }
}
