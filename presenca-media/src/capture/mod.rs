#[cfg(feature = "native-camera")]
pub mod native;
pub mod synthetic;

pub use synthetic::{SyntheticCamera, SyntheticCameraState};

use crate::video_capture::CameraBackend;

/// Get the camera backend for this build.
///
/// With the `native-camera` feature the platform camera is used through
/// `nokhwa`; otherwise a synthetic camera producing a test pattern.
pub fn default_backend() -> Box<dyn CameraBackend> {
    #[cfg(feature = "native-camera")]
    {
        Box::new(native::NativeCamera::new())
    }
    #[cfg(not(feature = "native-camera"))]
    {
        tracing::warn!(
            "built without `native-camera`, falling back to the synthetic test pattern; \
             pass a camera backend explicitly in production"
        );
        Box::new(SyntheticCamera::new())
    }
}
