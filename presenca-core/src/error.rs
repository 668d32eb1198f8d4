//! Error types for the attendance controller

use thiserror::Error;

/// Main error type for controller-level operations
#[derive(Error, Debug)]
pub enum PresencaError {
    /// The page was opened without a case reference
    #[error("Missing case reference: the confirmation page requires a case number")]
    MissingCaseReference,

    /// A required collaborator was not supplied to the builder
    #[error("{field} must be set before mounting")]
    MissingConfiguration {
        /// Builder field left unset
        field: String,
    },

    /// Configuration value out of range
    #[error("Rejected configuration: {message}")]
    InvalidConfiguration {
        /// What was wrong
        message: String,
    },

    /// Configuration file could not be read or parsed
    #[error("Failed to load configuration from {path}: {reason}")]
    ConfigurationLoad {
        /// File that failed to load
        path: String,
        /// Underlying reason
        reason: String,
    },

    /// The controller task is gone (unmounted or panicked)
    #[error("Controller closed")]
    ControllerClosed,
}

impl PresencaError {
    /// Stable code for logs and host applications
    pub fn error_code(&self) -> &'static str {
        match self {
            PresencaError::MissingCaseReference => "MISSING_CASE_REFERENCE",
            PresencaError::MissingConfiguration { .. } => "MISSING_CONFIGURATION",
            PresencaError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            PresencaError::ConfigurationLoad { .. } => "CONFIGURATION_LOAD_FAILED",
            PresencaError::ControllerClosed => "CONTROLLER_CLOSED",
        }
    }
}
