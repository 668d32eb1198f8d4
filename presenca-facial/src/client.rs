//! HTTP binding to the biometric module
//!
//! Wraps the face service's JSON routes (frame validation, verification,
//! attendance confirmation, reference enrollment and administration) using
//! [`reqwest`].

use crate::error::FacialApiError;
use crate::service::{
    EnrollmentOutcome, FacialService, QualityCheck, ReferenceRecord, VerificationOutcome,
};
use crate::wire::{
    case_path_segment, encode_data_url, CaseFrameRequest, FacialResponse, FrameRequest,
    HealthResponse, ListResponse, ValidationResponse,
};
use async_trait::async_trait;
use presenca_core::FrameImage;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Default base URL of the biometric module
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

const NO_REFERENCE_MESSAGE: &str = "Não há foto cadastrada para este processo";

/// Connection settings for the face service
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FacialServiceConfig {
    /// Base HTTP URL, e.g. `http://localhost:5000`
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for FacialServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl FacialServiceConfig {
    /// Defaults overridden by `PRESENCA_FACIAL_API_URL` and `PRESENCA_FACIAL_TIMEOUT_MS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply environment overrides in place
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PRESENCA_FACIAL_API_URL") {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(raw) = std::env::var("PRESENCA_FACIAL_TIMEOUT_MS") {
            match raw.parse() {
                Ok(ms) => self.timeout_ms = ms,
                Err(_) => warn!(value = %raw, "ignoring invalid PRESENCA_FACIAL_TIMEOUT_MS"),
            }
        }
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<(), String> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!("face service URL must be http(s): {}", self.base_url));
        }
        if self.timeout_ms == 0 {
            return Err("face service timeout must be > 0".to_string());
        }
        Ok(())
    }
}

/// HTTP client for the face service
#[derive(Debug, Clone)]
pub struct HttpFacialService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFacialService {
    /// Create a client from settings
    pub fn new(config: &FacialServiceConfig) -> Result<Self, FacialApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Whether the service reports itself healthy
    pub async fn health(&self) -> Result<bool, FacialApiError> {
        let response = self.client.get(self.url("/health")).send().await?;
        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Ok(false);
        }
        let health: HealthResponse = decode(&body)?;
        Ok(health.status == "healthy")
    }

    /// List every case with an enrolled reference image
    pub async fn list_references(&self) -> Result<Vec<ReferenceRecord>, FacialApiError> {
        let url = self.url("/listar-cadastros");
        let response = self.client.get(&url).send().await?;
        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(api_error(status, &url, &body));
        }
        let list: ListResponse = decode(&body)?;
        if !list.success {
            return Err(FacialApiError::Api {
                status: status.as_u16(),
                message: list.message.unwrap_or_default(),
            });
        }
        debug!(total = list.total, "listed enrolled references");
        Ok(list.cadastros.into_iter().map(ReferenceRecord::from).collect())
    }

    /// Delete a case's enrolled reference image
    pub async fn delete_reference(&self, case_reference: &str) -> Result<(), FacialApiError> {
        let path = format!("/deletar-cadastro/{}", case_path_segment(case_reference));
        let url = self.url(&path);
        let response = self.client.delete(&url).send().await?;
        let (status, body) = read_body(response).await?;
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(not_found(&url, &body));
        }
        expect_success(status, &url, &body)
    }
}

#[async_trait]
impl FacialService for HttpFacialService {
    async fn check_frame_quality(&self, frame: &FrameImage) -> Result<QualityCheck, FacialApiError> {
        let request = FrameRequest {
            image: encode_data_url(frame),
        };
        let url = self.url("/validar-frame");
        let response = self.client.post(&url).json(&request).send().await?;
        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(api_error(status, &url, &body));
        }
        let validation: ValidationResponse = decode(&body)?;
        Ok(validation.into())
    }

    async fn verify_identity(
        &self,
        case_reference: &str,
        frame: &FrameImage,
    ) -> Result<VerificationOutcome, FacialApiError> {
        let request = CaseFrameRequest {
            processo: case_reference,
            image: encode_data_url(frame),
        };
        let url = self.url("/verificar-rosto");
        let response = self.client.post(&url).json(&request).send().await?;
        let (status, body) = read_body(response).await?;

        // Only the face service's own 404 means there is no reference photo
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(not_found(&url, &body));
        }
        if !status.is_success() {
            return Err(api_error(status, &url, &body));
        }

        let parsed: FacialResponse = decode(&body)?;
        parsed
            .into_verification()
            .ok_or_else(|| FacialApiError::MalformedResponse {
                reason: "verification response without `verified`".to_string(),
            })
    }

    async fn confirm_attendance(&self, attendance_record_id: &str) -> Result<(), FacialApiError> {
        let url = self.url(&format!("/confirmar-comparecimento/{}", attendance_record_id));
        let response = self.client.post(&url).send().await?;
        let (status, body) = read_body(response).await?;
        expect_success(status, &url, &body)
    }

    async fn save_reference_image(
        &self,
        case_reference: &str,
        frame: &FrameImage,
    ) -> Result<EnrollmentOutcome, FacialApiError> {
        let request = CaseFrameRequest {
            processo: case_reference,
            image: encode_data_url(frame),
        };
        let url = self.url("/salvar-rosto");
        let response = self.client.post(&url).json(&request).send().await?;
        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(api_error(status, &url, &body));
        }
        let parsed: FacialResponse = decode(&body)?;
        Ok(parsed.into_enrollment())
    }
}

async fn read_body(
    response: reqwest::Response,
) -> Result<(reqwest::StatusCode, String), FacialApiError> {
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, FacialApiError> {
    serde_json::from_str(body).map_err(|e| FacialApiError::MalformedResponse {
        reason: e.to_string(),
    })
}

const BODY_PREVIEW_CHARS: usize = 200;

/// Error for a non-2xx status. Bodies that are not face-service JSON are
/// reported as [`FacialApiError::UnexpectedStatus`].
fn api_error(status: reqwest::StatusCode, url: &str, body: &str) -> FacialApiError {
    match serde_json::from_str::<FacialResponse>(body) {
        Ok(parsed) => FacialApiError::Api {
            status: status.as_u16(),
            message: parsed
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_default(),
        },
        Err(_) => {
            warn!(status = status.as_u16(), url, "error status without a face-service body");
            FacialApiError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body: body.chars().take(BODY_PREVIEW_CHARS).collect(),
            }
        }
    }
}

fn not_found(url: &str, body: &str) -> FacialApiError {
    match api_error(reqwest::StatusCode::NOT_FOUND, url, body) {
        FacialApiError::Api { message, .. } => FacialApiError::NoReferencePhoto {
            message: if message.is_empty() {
                NO_REFERENCE_MESSAGE.to_string()
            } else {
                message
            },
        },
        other => other,
    }
}

fn expect_success(status: reqwest::StatusCode, url: &str, body: &str) -> Result<(), FacialApiError> {
    if !status.is_success() {
        return Err(api_error(status, url, body));
    }
    let parsed: FacialResponse = decode(body)?;
    if !parsed.success {
        return Err(FacialApiError::Api {
            status: status.as_u16(),
            message: parsed.message.unwrap_or_default(),
        });
    }
    Ok(())
}
