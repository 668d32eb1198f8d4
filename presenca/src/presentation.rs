//! User-facing status texts for each session state

use crate::controller::SessionSnapshot;
use presenca_core::{FailureCause, SessionState};
use serde::Serialize;

/// Icon shown next to the status text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIcon {
    /// Live camera
    Camera,
    /// Countdown running
    Countdown,
    /// Waiting on the service
    Loading,
    /// Attendance confirmed
    Success,
    /// Unrecoverable error
    Error,
    /// Failure with automatic retry
    Retry,
    /// Enrollment offer
    Enroll,
    /// Reference upload in flight
    Upload,
    /// Page cannot start
    Warning,
}

/// Title, description and icon the page renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    /// Heading
    pub title: String,
    /// Body text
    pub description: String,
    /// Icon
    pub icon: StatusIcon,
    /// Seconds until the automatic retry, when one is scheduled
    pub retry_in_seconds: Option<u64>,
}

impl StatusView {
    fn new(title: &str, description: impl Into<String>, icon: StatusIcon) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            icon,
            retry_in_seconds: None,
        }
    }

    /// View rendered when the page was opened without a case reference
    pub fn missing_case_reference() -> Self {
        Self::new(
            "Processo não informado",
            "Abra esta página a partir da lista de comparecimentos para informar o número do processo.",
            StatusIcon::Warning,
        )
    }

    /// View for the current snapshot
    pub fn for_snapshot(snapshot: &SessionSnapshot) -> Self {
        match &snapshot.state {
            SessionState::Idle => Self::new(
                "Iniciando câmera",
                "Aguarde enquanto acessamos a câmera.",
                StatusIcon::Loading,
            ),
            SessionState::Capturing if !snapshot.visible => Self::new(
                "Captura pausada",
                "Volte para esta aba para continuar a verificação.",
                StatusIcon::Camera,
            ),
            SessionState::Capturing => match snapshot.countdown_remaining {
                Some(remaining) => Self::new(
                    "Capturando...",
                    format!("Mantenha o rosto parado. Foto em {}s.", remaining),
                    StatusIcon::Countdown,
                ),
                None if snapshot.guidance.trim().is_empty() => Self::new(
                    "Posicione seu rosto",
                    "Posicione seu rosto no centro",
                    StatusIcon::Camera,
                ),
                None => Self::new(
                    "Posicione seu rosto",
                    snapshot.guidance.clone(),
                    StatusIcon::Camera,
                ),
            },
            SessionState::Verifying => Self::new(
                "Verificando identidade",
                "Aguarde enquanto comparamos sua foto com o cadastro.",
                StatusIcon::Loading,
            ),
            SessionState::Succeeded => Self::new(
                "Presença confirmada",
                "Comparecimento registrado com sucesso. Redirecionando...",
                StatusIcon::Success,
            ),
            SessionState::Failed(notice) => match notice.cause {
                FailureCause::DeviceAccess => {
                    Self::new("Câmera indisponível", notice.message.clone(), StatusIcon::Error)
                }
                FailureCause::Verification(_) => {
                    let mut view =
                        Self::new("Falha na verificação", notice.message.clone(), StatusIcon::Retry);
                    view.retry_in_seconds = notice
                        .retry_in
                        .map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0));
                    view
                }
            },
            SessionState::EnrollmentOffered { submitting: false } => Self::new(
                "Cadastro facial necessário",
                "Não há foto cadastrada para este processo. Deseja usar esta foto como referência?",
                StatusIcon::Enroll,
            ),
            SessionState::EnrollmentOffered { submitting: true } => Self::new(
                "Salvando foto...",
                "Cadastrando sua foto de referência.",
                StatusIcon::Upload,
            ),
        }
    }
}
