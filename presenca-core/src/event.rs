//! Discrete happenings published by the attendance controller

use crate::classification::ErrorClassification;
use crate::session::{QualityStatus, SessionState};
use serde::{Deserialize, Serialize};

/// Events a mounted controller broadcasts to its subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// The session entered a new state
    StateChanged {
        /// State left
        from: SessionState,
        /// State entered
        to: SessionState,
    },
    /// The realtime quality signal changed
    QualityChanged {
        /// New status
        status: QualityStatus,
        /// Guidance text shown with it
        guidance: String,
    },
    /// The visible countdown advanced
    CountdownTick {
        /// Seconds remaining
        remaining: u8,
    },
    /// A countdown was abandoned because quality dropped
    CaptureAborted,
    /// A submission frame was taken and sent for verification
    FrameSubmitted {
        /// Encoded size in bytes
        bytes: usize,
    },
    /// The face matched the case's reference
    VerificationSucceeded {
        /// Match confidence in percent
        confidence: Option<f64>,
        /// Attendance record created for the match
        attendance_record_id: String,
    },
    /// Verification failed and was classified
    VerificationFailed {
        /// Classified cause
        classification: ErrorClassification,
    },
    /// The camera could not be opened
    DeviceFailed {
        /// Device error detail
        reason: String,
    },
    /// The enrollment fallback was offered
    EnrollmentOffered,
    /// A reference upload finished
    EnrollmentCompleted {
        /// Whether the reference was stored
        success: bool,
        /// Server or error message
        message: Option<String>,
    },
    /// The user declined the enrollment offer
    EnrollmentDeclined,
    /// The attendance record was confirmed
    AttendanceConfirmed {
        /// Confirmed record
        attendance_record_id: String,
        /// Attempts it took
        attempts: u32,
    },
    /// Confirming the attendance record failed
    ConfirmationFailed {
        /// Record that could not be confirmed
        attendance_record_id: String,
        /// Attempt that failed (1-based)
        attempt: u32,
        /// Whether another attempt is scheduled
        will_retry: bool,
        /// Failure detail
        reason: String,
    },
    /// The controller requested navigation away from the page
    Navigated {
        /// Destination route
        route: String,
    },
    /// Page visibility changed
    VisibilityChanged {
        /// Whether the page is now visible
        visible: bool,
    },
}

impl ControllerEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            ControllerEvent::StateChanged { .. } => "state_changed",
            ControllerEvent::QualityChanged { .. } => "quality_changed",
            ControllerEvent::CountdownTick { .. } => "countdown_tick",
            ControllerEvent::CaptureAborted => "capture_aborted",
            ControllerEvent::FrameSubmitted { .. } => "frame_submitted",
            ControllerEvent::VerificationSucceeded { .. } => "verification_succeeded",
            ControllerEvent::VerificationFailed { .. } => "verification_failed",
            ControllerEvent::DeviceFailed { .. } => "device_failed",
            ControllerEvent::EnrollmentOffered => "enrollment_offered",
            ControllerEvent::EnrollmentCompleted { .. } => "enrollment_completed",
            ControllerEvent::EnrollmentDeclined => "enrollment_declined",
            ControllerEvent::AttendanceConfirmed { .. } => "attendance_confirmed",
            ControllerEvent::ConfirmationFailed { .. } => "confirmation_failed",
            ControllerEvent::Navigated { .. } => "navigated",
            ControllerEvent::VisibilityChanged { .. } => "visibility_changed",
        }
    }

    /// Whether the event reports something going wrong
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ControllerEvent::VerificationFailed { .. }
                | ControllerEvent::DeviceFailed { .. }
                | ControllerEvent::ConfirmationFailed { .. }
                | ControllerEvent::EnrollmentCompleted { success: false, .. }
        )
    }
}
