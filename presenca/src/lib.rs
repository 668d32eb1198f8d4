//! # Presença - Biometric Attendance Confirmation
//!
//! Turns a live camera feed into a confirmed attendance record for a
//! judicial case through face verification. A mounted
//! [`AttendanceController`] acquires the camera, polls frame quality while
//! the user positions their face, runs a short countdown, submits the frame
//! for verification and, on a match, confirms the attendance and leaves the
//! page. Cases without an enrolled reference image fall back to enrollment.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use presenca::{AttendanceController, FacialServiceConfig, HttpFacialService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = HttpFacialService::new(&FacialServiceConfig::from_env())?;
//!
//!     let controller = AttendanceController::builder()
//!         .case_reference("0001234-56.2024.8.05.0001")
//!         .facial_service(Arc::new(service))
//!         .mount()?;
//!
//!     let mut events = controller.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         println!("Controller event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use presenca_core::{
    CaptureContext, ControllerEvent, ErrorClassification, FailureCause, FailureNotice,
    FrameImage, PresencaError, QualityDetails, QualityStatus, RetryPolicy, SamplePurpose,
    SessionState,
};

pub use presenca_diagnostics::{
    init_logging, LoggingConfig, ServiceProbe, SessionReport,
};
pub use presenca_facial::{
    EnrollmentOutcome, FacialApiError, FacialService, FacialServiceConfig, HttpFacialService,
    QualityCheck, ReferenceRecord, VerificationOutcome,
};
pub use presenca_media::{CameraBackend, CameraRequest, MediaError, SyntheticCamera};

#[cfg(feature = "native-camera")]
pub use presenca_media::NativeCamera;

// Public API modules
pub mod config;
pub mod controller;
pub mod navigation;
pub mod presentation;

// Re-export main API types
pub use config::{ControllerConfig, PresencaConfig};
pub use controller::{AttendanceController, ControllerBuilder, SessionSnapshot};
pub use navigation::{LoggingNavigator, Navigator, RecordingNavigator};
pub use presentation::{StatusIcon, StatusView};
