//! Error types for corral
//!
//! A small taxonomy matching the ways a borrow can go wrong:
//! - the pool is not usable (closed or never initialized)
//! - the wait for an idle connection ran out
//! - the connector could not produce a connection
//! - a setter was handed an unusable value
//! - resetting a connection on borrow failed

use std::time::Duration;

use thiserror::Error;

/// Result type for corral operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for corral
#[derive(Error, Debug)]
pub enum Error {
    /// Operation invoked on a pool that is closed or was never initialized
    #[error("pool is closed")]
    Closed,

    /// Waiting for an idle connection exceeded the configured maximum
    #[error("timed out after {waited:?} waiting for a connection")]
    WaitTimeout {
        /// How long the borrower actually waited
        waited: Duration,
    },

    /// The connector failed to produce a connection
    #[error("connector error: {message}")]
    Connector {
        /// Human-readable description
        message: String,
        /// Underlying cause, when the connector has one
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A setter rejected the supplied value
    #[error("configuration error: {message}")]
    Configuration {
        /// What was wrong with the value
        message: String,
    },

    /// Resetting a connection on borrow failed
    #[error("reset error: {message}")]
    Reset {
        /// Human-readable description
        message: String,
        /// Underlying cause, when the connection reports one
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a connector error
    pub fn connector(message: impl Into<String>) -> Self {
        Self::Connector {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connector error with an underlying cause
    pub fn connector_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connector {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a reset error
    pub fn reset(message: impl Into<String>) -> Self {
        Self::Reset {
            message: message.into(),
            source: None,
        }
    }

    /// Create a reset error with an underlying cause
    pub fn reset_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Reset {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether retrying the operation later could succeed
    ///
    /// Timeouts and connector failures are transient; a closed pool or a
    /// rejected configuration value is not.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. } | Self::Connector { .. })
    }
}
