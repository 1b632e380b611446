//! Facade crate re-exporting stable APIs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use dp_stats_algorithms as algorithms;
pub use dp_stats_core as primitives;

pub use dp_stats_algorithms::{
    ApproxBounds, ApproxBoundsBuilder, BoundedSum, BoundedSumBuilder, BoundsPolicy,
};
pub use dp_stats_core::{
    clamp, ApproxBoundsSummary, BoundedSumSummary, BoundingReport, ConfidenceInterval, DpError,
    ErrorReport, LaplaceMechanism, LaplaceMechanismBuilder, MechanismBuilder, NoiseMechanism,
    Numeric, Output, Result, Summary, SummaryPayload, DEFAULT_CONFIDENCE_LEVEL,
};

/// Convenience prelude covering common building blocks.
pub mod prelude {
    pub use dp_stats_algorithms::prelude::*;
    pub use dp_stats_core::prelude::*;
}
