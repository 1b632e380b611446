//! Core primitives for differentially private statistics.
//!
//! This crate provides the building blocks shared by the aggregation
//! algorithms: the error type, the numeric capability trait, noise
//! mechanisms, and the structured records (outputs, reports, summaries)
//! that algorithms read and write.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod mechanism;
pub mod numeric;
pub mod report;
pub mod summary;
pub mod test_utils;

pub use error::{DpError, Result};
pub use mechanism::{
    LaplaceMechanism, LaplaceMechanismBuilder, MechanismBuilder, NoiseMechanism,
    DEFAULT_CONFIDENCE_LEVEL,
};
pub use numeric::{clamp, Numeric};
pub use report::{BoundingReport, ConfidenceInterval, ErrorReport, Output};
pub use summary::{ApproxBoundsSummary, BoundedSumSummary, Summary, SummaryPayload};

/// Common imports for downstream users.
pub mod prelude {
    pub use crate::{
        clamp, ApproxBoundsSummary, BoundedSumSummary, BoundingReport, ConfidenceInterval,
        DpError, ErrorReport, LaplaceMechanism, LaplaceMechanismBuilder, MechanismBuilder,
        NoiseMechanism, Numeric, Output, Result, Summary, SummaryPayload,
    };
}
