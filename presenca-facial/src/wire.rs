//! JSON bodies exchanged with the biometric module

use crate::service::{EnrollmentOutcome, QualityCheck, ReferenceRecord, VerificationOutcome};
use base64::Engine;
use presenca_core::{FrameImage, QualityDetails};
use serde::{Deserialize, Serialize};

/// Render a frame as a `data:` URL, the format the service expects
pub fn encode_data_url(frame: &FrameImage) -> String {
    format!(
        "data:{};base64,{}",
        frame.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(frame.as_bytes())
    )
}

/// Body of `POST /validar-frame`
#[derive(Debug, Serialize)]
pub struct FrameRequest {
    /// Data URL of the frame
    pub image: String,
}

/// Body of `POST /verificar-rosto` and `POST /salvar-rosto`
#[derive(Debug, Serialize)]
pub struct CaseFrameRequest<'a> {
    /// Case reference
    pub processo: &'a str,
    /// Data URL of the frame
    pub image: String,
}

/// Response of `POST /validar-frame`
#[derive(Debug, Deserialize)]
pub struct ValidationResponse {
    /// Whether the frame is usable
    pub valid: bool,
    /// Guidance text
    #[serde(default)]
    pub message: String,
    /// Measurements
    #[serde(default)]
    pub details: QualityDetails,
}

impl From<ValidationResponse> for QualityCheck {
    fn from(response: ValidationResponse) -> Self {
        Self {
            usable: response.valid,
            guidance: response.message,
            details: response.details,
        }
    }
}

/// Common response shape of the verification, confirmation and enrollment routes
#[derive(Debug, Default, Deserialize)]
pub struct FacialResponse {
    /// Whether the request was processed
    #[serde(default)]
    pub success: bool,
    /// Server message
    #[serde(default)]
    pub message: Option<String>,
    /// Verification result
    #[serde(default)]
    pub verified: Option<bool>,
    /// Match confidence in percent
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Created attendance record
    #[serde(default)]
    pub comparecimento_id: Option<String>,
    /// Stored reference path
    #[serde(default)]
    pub path: Option<String>,
}

impl FacialResponse {
    /// Interpret as a verification result; `None` when `verified` is missing
    pub fn into_verification(self) -> Option<VerificationOutcome> {
        let verified = self.verified?;
        Some(VerificationOutcome {
            verified,
            confidence: self.confidence,
            attendance_record_id: self.comparecimento_id,
            message: self.message,
        })
    }

    /// Interpret as an enrollment result
    pub fn into_enrollment(self) -> EnrollmentOutcome {
        EnrollmentOutcome {
            success: self.success,
            message: self.message,
            attendance_record_id: self.comparecimento_id,
            reference_path: self.path,
        }
    }
}

/// Entry of `GET /listar-cadastros`
#[derive(Debug, Deserialize)]
pub struct CadastroEntry {
    /// Case reference
    pub processo: String,
    /// Enrollment time
    #[serde(default)]
    pub cadastrado_em: String,
}

/// Response of `GET /listar-cadastros`
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    /// Whether listing succeeded
    #[serde(default)]
    pub success: bool,
    /// Number of entries
    #[serde(default)]
    pub total: usize,
    /// Entries
    #[serde(default)]
    pub cadastros: Vec<CadastroEntry>,
    /// Error message on failure
    #[serde(default)]
    pub message: Option<String>,
}

impl From<CadastroEntry> for ReferenceRecord {
    fn from(entry: CadastroEntry) -> Self {
        Self {
            case_reference: entry.processo,
            registered_at: entry.cadastrado_em,
        }
    }
}

/// Response of `GET /health`
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    /// `"healthy"` when the service is up
    #[serde(default)]
    pub status: String,
}

/// Path segment for a case reference (`/` is not allowed in the route)
pub fn case_path_segment(case_reference: &str) -> String {
    case_reference.replace('/', "-")
}
