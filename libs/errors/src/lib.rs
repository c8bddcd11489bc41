//! Unified error handling for gridgen crates
//!
//! Only configuration-time problems are errors in gridgen. Transmission failures are
//! absorbed at the transport layer and never surface through this type.

use thiserror::Error;

// ============================================================================
// GridgenError - Main error type
// ============================================================================

/// Main error type for all gridgen crates
#[derive(Debug, Error)]
pub enum GridgenError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid parameter for profile '{profile}': {reason}")]
    InvalidParameter { profile: String, reason: String },

    // ======================================
    // Protocol Errors
    // ======================================
    #[error("Protocol error: {0}")]
    Protocol(String),

    // ======================================
    // System Errors
    // ======================================
    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using GridgenError
pub type GridgenResult<T> = Result<T, GridgenError>;

impl GridgenError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid config field error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid profile parameter error
    pub fn invalid_parameter(profile: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            profile: profile.into(),
            reason: reason.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether this error was caused by operator input (config, target, parameters)
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::InvalidConfig { .. }
                | Self::InvalidTarget(_)
                | Self::InvalidParameter { .. }
        )
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        if self.is_config_error() {
            2
        } else {
            1
        }
    }
}

impl From<figment::Error> for GridgenError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(format!("Failed to load configuration: {err}"))
    }
}
