//! Differentially private aggregation algorithms.
//!
//! Algorithms ingest values incrementally, spend a caller-tracked privacy
//! budget to generate a noised result, and can serialize their partial state
//! for merging across independent computation shards.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod approx_bounds;
pub mod bounded_sum;

pub use approx_bounds::{ApproxBounds, ApproxBoundsBuilder};
pub use bounded_sum::{BoundedSum, BoundedSumBuilder, BoundsPolicy};

/// Common imports for downstream users.
pub mod prelude {
    pub use crate::{ApproxBounds, ApproxBoundsBuilder, BoundedSum, BoundedSumBuilder};
}
