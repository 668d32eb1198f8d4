//! # Presença Core
//!
//! Session model and shared plumbing for the biometric attendance-confirmation
//! controller. This crate holds the state machine vocabulary, the error
//! taxonomy that drives recovery, the captured frame type exchanged between
//! the camera and the face service, and the cancelable task registry used by
//! the controller.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod classification;
pub mod error;
pub mod event;
pub mod frame;
pub mod session;
pub mod tasks;

// Re-export main types
pub use classification::{ErrorClassification, RetryPolicy};
pub use error::PresencaError;
pub use event::ControllerEvent;
pub use frame::{FrameImage, SamplePurpose};
pub use session::{
    CaptureContext, FaceBox, FailureCause, FailureNotice, QualityDetails, QualityStatus,
    SessionState,
};
pub use tasks::{Generation, TaskKind, TaskRegistry};
