//! Errors from the face-service layer

use presenca_core::ErrorClassification;

/// Errors from the face-verification service
#[derive(Debug, thiserror::Error)]
pub enum FacialApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Transport failure reported by a non-HTTP implementation
    #[error("Transport error: {reason}")]
    Transport {
        /// Failure reason
        reason: String,
    },

    /// No reference image is enrolled for the case
    #[error("No reference photo: {message}")]
    NoReferencePhoto {
        /// Server message
        message: String,
    },

    /// The face service answered with an error status or `success: false`
    #[error("Face service error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Server-supplied message; empty when the body carried none
        message: String,
    },

    /// Error status whose body is not a face-service response (wrong base
    /// URL, proxy or gateway page)
    #[error("Unexpected HTTP {status} from {url}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
        /// Start of the response body
        body: String,
    },

    /// The response body did not match the expected shape
    #[error("Malformed response: {reason}")]
    MalformedResponse {
        /// Decoding failure
        reason: String,
    },
}

impl FacialApiError {
    /// Map the error onto the controller's recovery taxonomy
    pub fn classify(&self) -> ErrorClassification {
        match self {
            FacialApiError::NoReferencePhoto { .. } => ErrorClassification::NoReferencePhoto,
            FacialApiError::Request(e) if e.is_decode() => ErrorClassification::Unknown {
                message: e.to_string(),
            },
            FacialApiError::Request(_)
            | FacialApiError::Transport { .. }
            | FacialApiError::UnexpectedStatus { .. } => ErrorClassification::NetworkError,
            FacialApiError::Api { message, .. } if !message.trim().is_empty() => {
                ErrorClassification::VerificationRejected {
                    message: message.clone(),
                }
            }
            FacialApiError::Api { status, message } => ErrorClassification::Unknown {
                message: format!("status {}: {}", status, message),
            },
            FacialApiError::MalformedResponse { reason } => ErrorClassification::Unknown {
                message: reason.clone(),
            },
        }
    }

    /// Whether the service could not be reached at all
    pub fn is_network(&self) -> bool {
        matches!(self.classify(), ErrorClassification::NetworkError)
    }
}
