//! Camera and frame-encoding error types

use thiserror::Error;

/// Failures opening the camera or turning its frames into JPEG stills
#[derive(Error, Debug)]
pub enum MediaError {
    /// The user or the platform refused camera access
    #[error("Camera access refused during {operation}")]
    PermissionDenied {
        /// Operation that was denied
        operation: String,
    },

    /// No camera matches the request
    #[error("No camera matches device {device_id}")]
    DeviceNotFound {
        /// Device identifier
        device_id: String,
    },

    /// The camera exists but cannot be opened right now
    #[error("Camera busy or unavailable: {resource}")]
    ResourceNotAvailable {
        /// Resource name
        resource: String,
    },

    /// Frame requested while no stream is open
    #[error("No camera stream is open")]
    CaptureNotActive,

    /// The camera request cannot be satisfied as written
    #[error("Invalid camera request: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// The JPEG encoder rejected the frame
    #[error("{codec} encoding failed: {reason}")]
    EncodingFailed {
        /// Codec name
        codec: String,
        /// Failure reason
        reason: String,
    },

    /// A raw frame whose buffer does not match its dimensions
    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    InvalidFrameData {
        /// Expected data size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Backend-specific video failure
    #[error("Camera backend error: {message}")]
    Video {
        /// Error message
        message: String,
    },
}

impl MediaError {
    /// Whether the error means the camera itself is unusable
    pub fn is_device_access(&self) -> bool {
        self.category() == ErrorCategory::Device
    }

    /// Coarse grouping, logged with camera failures
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::PermissionDenied { .. } => ErrorCategory::Device,
            MediaError::DeviceNotFound { .. } => ErrorCategory::Device,
            MediaError::ResourceNotAvailable { .. } => ErrorCategory::Device,
            MediaError::CaptureNotActive => ErrorCategory::State,
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            MediaError::EncodingFailed { .. } => ErrorCategory::Codec,
            MediaError::InvalidFrameData { .. } => ErrorCategory::Data,
            MediaError::Video { .. } => ErrorCategory::Video,
        }
    }

    /// Message shown to the user when acquisition fails
    pub fn user_message(&self) -> &'static str {
        match self {
            MediaError::PermissionDenied { .. } => {
                "Não foi possível acessar a câmera. Verifique as permissões do navegador."
            }
            MediaError::DeviceNotFound { .. } => "Nenhuma câmera foi encontrada neste dispositivo.",
            _ => "Não foi possível acessar a câmera.",
        }
    }
}

/// Coarse grouping of [`MediaError`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Device and permission errors
    Device,
    /// Stream lifecycle errors
    State,
    /// Configuration and parameter errors
    Configuration,
    /// Encoder errors
    Codec,
    /// Frame layout errors
    Data,
    /// Backend-specific errors
    Video,
}

impl ErrorCategory {
    /// Short name for structured logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Device => "device",
            ErrorCategory::State => "state",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Codec => "codec",
            ErrorCategory::Data => "data",
            ErrorCategory::Video => "video",
        }
    }
}
