//! Session state machine vocabulary and per-page capture context

use crate::classification::{ErrorClassification, RetryPolicy};
use crate::frame::FrameImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Realtime guidance signal produced by the quality validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QualityStatus {
    /// No usable signal (startup, validator outage, or outside capturing)
    #[default]
    Neutral,
    /// Frame is good enough to attempt verification
    Valid,
    /// Frame is not usable; guidance explains why
    Invalid,
}

/// Bounding box of the detected face, in source pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

/// Measurements reported by the frame-quality check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityDetails {
    /// Number of faces found in the frame
    #[serde(default)]
    pub face_count: Option<u32>,
    /// Face area divided by frame area
    #[serde(default)]
    pub face_ratio: Option<f64>,
    /// Mean brightness
    #[serde(default)]
    pub brightness: Option<f64>,
    /// Laplacian variance
    #[serde(default)]
    pub sharpness: Option<f64>,
    /// Whether the face is close enough to the frame center
    #[serde(default)]
    pub centered: Option<bool>,
    /// Detected face box
    #[serde(default)]
    pub face_box: Option<FaceBox>,
}

/// Why a session is in the failed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    /// Camera unavailable or permission refused; fatal for the session
    DeviceAccess,
    /// A classified verification failure
    Verification(ErrorClassification),
}

/// What the user sees while the session is failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNotice {
    /// Underlying cause
    pub cause: FailureCause,
    /// User-facing message
    pub message: String,
    /// Delay before the automatic return to capturing, if any
    pub retry_in: Option<Duration>,
}

impl FailureNotice {
    /// Device failure: shown once, never retried automatically
    pub fn device(message: impl Into<String>) -> Self {
        Self {
            cause: FailureCause::DeviceAccess,
            message: message.into(),
            retry_in: None,
        }
    }

    /// Verification failure with the delay the policy assigns to it
    pub fn classified(classification: ErrorClassification, policy: &RetryPolicy) -> Self {
        Self {
            message: classification.user_message(),
            retry_in: classification.retry_delay(policy),
            cause: FailureCause::Verification(classification),
        }
    }

    /// Whether the controller will return to capturing on its own
    pub fn is_recoverable(&self) -> bool {
        self.retry_in.is_some()
    }
}

/// Top-level state of a confirmation session; exactly one is active
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// Acquiring the camera
    #[default]
    Idle,
    /// Stream live, quality loop running
    Capturing,
    /// Frame submitted, awaiting the verification result
    Verifying,
    /// Attendance verified; pending redirect
    Succeeded,
    /// Transient failure (or fatal device failure)
    Failed(FailureNotice),
    /// No reference image exists; waiting for the user's enrollment choice
    EnrollmentOffered {
        /// Reference upload in flight
        submitting: bool,
    },
}

impl SessionState {
    /// Short state name for logs
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Capturing => "capturing",
            SessionState::Verifying => "verifying",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed(_) => "failed",
            SessionState::EnrollmentOffered { submitting: false } => "enrollment_offered",
            SessionState::EnrollmentOffered { submitting: true } => "enrolling",
        }
    }

    /// Whether the quality loop may run in this state
    pub fn is_capturing(&self) -> bool {
        matches!(self, SessionState::Capturing)
    }

    /// No automatic transition leaves this state other than navigation
    pub fn is_terminal(&self) -> bool {
        match self {
            SessionState::Succeeded => true,
            SessionState::Failed(notice) => !notice.is_recoverable(),
            _ => false,
        }
    }

    /// Whether the enrollment fallback currently owns the session
    pub fn is_enrollment(&self) -> bool {
        matches!(self, SessionState::EnrollmentOffered { .. })
    }
}

/// Per-page data owned by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureContext {
    /// Judicial process identifier
    pub case_reference: String,
    /// Seconds left on the visible countdown
    pub countdown_remaining: Option<u8>,
    /// Frame taken at the instant of snapshot
    pub last_frame: Option<FrameImage>,
    /// Match confidence (percent) of the verified attempt
    pub confidence_score: Option<f64>,
    /// Server-side attendance record created by the verified attempt
    pub attendance_record_id: Option<String>,
}

impl CaptureContext {
    /// Create a context for the given case
    pub fn new(case_reference: impl Into<String>) -> Self {
        Self {
            case_reference: case_reference.into(),
            countdown_remaining: None,
            last_frame: None,
            confidence_score: None,
            attendance_record_id: None,
        }
    }

    /// Record the verified outcome. Returns `false` if one was already recorded.
    pub fn record_success(&mut self, confidence: Option<f64>, record_id: Option<String>) -> bool {
        if self.attendance_record_id.is_some() || self.confidence_score.is_some() {
            return false;
        }
        self.confidence_score = confidence;
        self.attendance_record_id = record_id;
        true
    }

    /// Drop everything but the case reference
    pub fn clear(&mut self) {
        self.countdown_remaining = None;
        self.last_frame = None;
        self.confidence_score = None;
        self.attendance_record_id = None;
    }
}
