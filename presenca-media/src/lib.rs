//! # Presença Media
//!
//! Camera acquisition and still-frame sampling for the attendance
//! controller. The [`MediaResourceManager`] owns the single live camera
//! stream of a session; the [`FrameSampler`] turns the current frame of that
//! stream into a JPEG [`FrameImage`](presenca_core::FrameImage).

#![warn(clippy::all)]

pub mod capture;
pub mod error;
pub mod sampler;
pub mod video_capture;

// Re-export main types
pub use capture::{default_backend, SyntheticCamera, SyntheticCameraState};
#[cfg(feature = "native-camera")]
pub use capture::native::NativeCamera;
pub use error::{ErrorCategory, MediaError};
pub use sampler::FrameSampler;
pub use video_capture::{
    CameraBackend, CameraRequest, CameraStream, FacingMode, MediaHandle, MediaResourceManager,
    RawFrame, VideoResolution,
};
