//! Per-session timeline and outcome summary built from controller events

use chrono::{DateTime, Utc};
use presenca_core::ControllerEvent;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// How a verification attempt ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Face matched
    Verified {
        /// Match confidence in percent
        confidence: Option<f64>,
    },
    /// Attempt failed with the given error code
    Failed {
        /// Stable error code
        code: String,
    },
    /// Reference enrolled from the attempt's frame
    Enrolled,
}

/// A timestamped event in the report
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// When the event was recorded
    pub at: DateTime<Utc>,
    /// Event type name
    pub event_type: &'static str,
    /// Event payload
    pub event: ControllerEvent,
}

/// Summary of one confirmation session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Report id
    pub session_id: Uuid,
    /// Case the session ran for
    pub case_reference: String,
    /// When recording started
    pub started_at: DateTime<Utc>,
    /// When the last event was recorded
    pub finished_at: Option<DateTime<Utc>>,
    /// Verification attempts in order
    pub attempts: Vec<AttemptOutcome>,
    /// Attendance record confirmed by the session
    pub confirmed_record: Option<String>,
    /// Failed confirmation attempts
    pub confirmation_failures: u32,
    /// Route navigated to at the end of the session
    pub navigated_to: Option<String>,
    /// Full timeline
    pub entries: Vec<ReportEntry>,
}

impl SessionReport {
    /// Start an empty report
    pub fn new(case_reference: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            case_reference: case_reference.into(),
            started_at: Utc::now(),
            finished_at: None,
            attempts: Vec::new(),
            confirmed_record: None,
            confirmation_failures: 0,
            navigated_to: None,
            entries: Vec::new(),
        }
    }

    /// Record one event
    pub fn record(&mut self, event: ControllerEvent) {
        match &event {
            ControllerEvent::VerificationSucceeded { confidence, .. } => {
                self.attempts.push(AttemptOutcome::Verified {
                    confidence: *confidence,
                });
            }
            ControllerEvent::VerificationFailed { classification } => {
                self.attempts.push(AttemptOutcome::Failed {
                    code: classification.error_code().to_string(),
                });
            }
            ControllerEvent::EnrollmentCompleted { success: true, .. } => {
                self.attempts.push(AttemptOutcome::Enrolled);
            }
            ControllerEvent::AttendanceConfirmed {
                attendance_record_id,
                ..
            } => {
                self.confirmed_record = Some(attendance_record_id.clone());
            }
            ControllerEvent::ConfirmationFailed { .. } => {
                self.confirmation_failures += 1;
            }
            ControllerEvent::Navigated { route } => {
                self.navigated_to = Some(route.clone());
            }
            _ => {}
        }

        let at = Utc::now();
        self.finished_at = Some(at);
        self.entries.push(ReportEntry {
            at,
            event_type: event.event_type(),
            event,
        });
    }

    /// Record events until the controller's channel closes
    pub async fn collect(mut self, mut events: broadcast::Receiver<ControllerEvent>) -> Self {
        loop {
            match events.recv().await {
                Ok(event) => self.record(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session report lagged behind controller events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        self
    }

    /// Number of verification attempts that did not verify
    pub fn failed_attempts(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| matches!(a, AttemptOutcome::Failed { .. }))
            .count()
    }

    /// Whether the session ended with a match or an enrollment
    pub fn succeeded(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| !matches!(a, AttemptOutcome::Failed { .. }))
    }

    /// Render the report as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
