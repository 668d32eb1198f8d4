//! Verification error taxonomy and the recovery policy it drives

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Generic message shown for failures nobody classified
pub const GENERIC_FAILURE_MESSAGE: &str = "Erro inesperado. Tente novamente.";

/// Classified outcome of a failed verification attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ErrorClassification {
    /// No reference image is enrolled for the case
    NoReferencePhoto,
    /// Transport-level failure talking to the face service
    NetworkError,
    /// The face did not match, or the service refused the attempt with a message
    VerificationRejected {
        /// Server-supplied rejection message
        message: String,
    },
    /// Anything else, including malformed responses
    Unknown {
        /// Diagnostic detail (not shown to the user)
        message: String,
    },
}

impl ErrorClassification {
    /// Stable error code for logs and reports
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorClassification::NoReferencePhoto => "NO_REFERENCE_PHOTO",
            ErrorClassification::NetworkError => "NETWORK_ERROR",
            ErrorClassification::VerificationRejected { .. } => "VERIFICATION_ERROR",
            ErrorClassification::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    /// Message displayed while the session is failed
    pub fn user_message(&self) -> String {
        match self {
            ErrorClassification::NoReferencePhoto => {
                "Não há foto de referência cadastrada para este processo.".to_string()
            }
            ErrorClassification::NetworkError => {
                "Erro de conexão com o servidor. Verifique sua internet.".to_string()
            }
            ErrorClassification::VerificationRejected { message } if !message.trim().is_empty() => {
                message.clone()
            }
            ErrorClassification::VerificationRejected { .. } => {
                "Erro na verificação facial.".to_string()
            }
            ErrorClassification::Unknown { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// Whether this classification hands control to the enrollment fallback
    pub fn triggers_enrollment(&self) -> bool {
        matches!(self, ErrorClassification::NoReferencePhoto)
    }

    /// Delay before the automatic return to capturing.
    ///
    /// `None` means no automatic retry happens for this classification.
    pub fn retry_delay(&self, policy: &RetryPolicy) -> Option<Duration> {
        match self {
            ErrorClassification::NoReferencePhoto => None,
            ErrorClassification::NetworkError => Some(policy.network_delay),
            ErrorClassification::VerificationRejected { .. } => Some(policy.rejected_delay),
            ErrorClassification::Unknown { .. } => Some(policy.unknown_delay),
        }
    }
}

/// Automatic retry delays per classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after a rejected match
    pub rejected_delay: Duration,
    /// Delay after a transport failure (longer to spare a degraded network)
    pub network_delay: Duration,
    /// Delay after an unclassified failure
    pub unknown_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rejected_delay: Duration::from_secs(3),
            network_delay: Duration::from_secs(5),
            unknown_delay: Duration::from_secs(3),
        }
    }
}
