//! Operations the controller consumes from the face service

use crate::error::FacialApiError;
use async_trait::async_trait;
use presenca_core::{FrameImage, QualityDetails};

/// Result of the realtime "is this frame usable" check
#[derive(Debug, Clone, PartialEq)]
pub struct QualityCheck {
    /// Whether the frame is good enough to attempt verification
    pub usable: bool,
    /// Short guidance for the user ("aproxime-se", "centralize o rosto")
    pub guidance: String,
    /// Raw measurements behind the decision
    pub details: QualityDetails,
}

/// Result of a completed verification call
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    /// Whether the face matched the enrolled reference
    pub verified: bool,
    /// Match confidence in percent
    pub confidence: Option<f64>,
    /// Attendance record created by a successful match
    pub attendance_record_id: Option<String>,
    /// Server message (rejection reason on `verified = false`)
    pub message: Option<String>,
}

/// Result of saving a new reference image
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentOutcome {
    /// Whether the reference was stored
    pub success: bool,
    /// Server message
    pub message: Option<String>,
    /// Attendance record, when the service creates one on enrollment
    pub attendance_record_id: Option<String>,
    /// Where the service stored the reference
    pub reference_path: Option<String>,
}

/// An enrolled reference image
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRecord {
    /// Case the reference belongs to
    pub case_reference: String,
    /// Enrollment time as reported by the service (ISO-8601, no zone)
    pub registered_at: String,
}

impl ReferenceRecord {
    /// Enrollment time, when the service reported a parseable timestamp
    pub fn registered_at(&self) -> Option<chrono::NaiveDateTime> {
        self.registered_at.parse().ok()
    }
}

/// The remote face-verification service
#[async_trait]
pub trait FacialService: Send + Sync {
    /// Check whether a frame is usable for verification. Polled at 2 Hz.
    async fn check_frame_quality(&self, frame: &FrameImage) -> Result<QualityCheck, FacialApiError>;

    /// Match a frame against the case's enrolled reference.
    ///
    /// Fails with [`FacialApiError::NoReferencePhoto`] when nothing is enrolled.
    async fn verify_identity(
        &self,
        case_reference: &str,
        frame: &FrameImage,
    ) -> Result<VerificationOutcome, FacialApiError>;

    /// Confirm the attendance record created by a successful verification
    async fn confirm_attendance(&self, attendance_record_id: &str) -> Result<(), FacialApiError>;

    /// Store `frame` as the case's reference image
    async fn save_reference_image(
        &self,
        case_reference: &str,
        frame: &FrameImage,
    ) -> Result<EnrollmentOutcome, FacialApiError>;
}
