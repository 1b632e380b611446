//! Error types for differential privacy operations.

/// Errors that can occur during DP operations.
#[derive(Debug, thiserror::Error)]
pub enum DpError {
    /// Invalid argument passed to an operation.
    #[error("invalid argument: {msg}")]
    InvalidArgument {
        /// Human-readable error description.
        msg: String,
    },

    /// Invalid configuration of an algorithm or mechanism.
    #[error("invalid configuration: {msg}")]
    InvalidConfig {
        /// Human-readable error description.
        msg: String,
    },

    /// Numerical computation error.
    #[error("numerical error: {msg}")]
    NumericalError {
        /// Human-readable error description.
        msg: String,
    },
}

/// Result type for DP operations.
pub type Result<T> = std::result::Result<T, DpError>;

impl DpError {
    /// Create an invalid argument error.
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument { msg: msg.into() }
    }

    /// Create an invalid configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig { msg: msg.into() }
    }

    /// Create a numerical error.
    pub fn numerical<S: Into<String>>(msg: S) -> Self {
        Self::NumericalError { msg: msg.into() }
    }
}
