//! Error types for the steadfast session layer
//!
//! Failures of individual logical requests are reported as
//! [`RequestError`](steadfast_core::RequestError) inside a
//! [`DataResponse`](crate::DataResponse). This module covers the errors raised
//! while assembling a session: configuration, policy validation and transport
//! setup.

use steadfast_core::PolicyError;
use steadfast_transport::TransportSetupError;
use thiserror::Error;

/// Result type alias for session-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for building and configuring sessions.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The retry policy described by the configuration is invalid.
    #[error("Invalid retry policy: {0}")]
    Policy(#[from] PolicyError),

    /// The default HTTP transport could not be created.
    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportSetupError),
}

impl Error {
    /// Check if this error came from configuration parsing.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
