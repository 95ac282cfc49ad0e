//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The local license record exists but cannot be decoded.
    ///
    /// Never recovered by resetting to a fresh trial.
    #[error("license state is corrupt: {0}")]
    CorruptState(String),

    /// Reading or writing the license record failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The licensing server could not be reached (timeout, DNS, refused,
    /// or an infrastructure status such as 502/504).
    #[error("network error: {0}")]
    Network(String),

    /// The licensing server answered with a body we cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The licensing server explicitly declined the key.
    #[error("activation rejected: {0}")]
    ActivationRejected(String),

    /// The OS credential store holding the install date failed.
    #[error("trust anchor error: {0}")]
    Anchor(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Returns true for failures that say nothing about the license itself,
    /// only that the server could not be trusted right now.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Protocol(_))
    }

    /// Stable machine-readable code, used across the C ABI.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CorruptState(_) => "corrupt_state",
            Self::Io(_) => "io_error",
            Self::Network(_) => "network_error",
            Self::Protocol(_) => "protocol_error",
            Self::ActivationRejected(_) => "activation_rejected",
            Self::Anchor(_) => "anchor_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
