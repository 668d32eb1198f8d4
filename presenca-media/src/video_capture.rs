//! Camera acquisition and the scoped stream handle
//!
//! A session owns exactly one [`MediaResourceManager`]. The manager holds at
//! most one [`MediaHandle`] at a time; acquiring while a handle is open is a
//! no-op and releasing is idempotent. Dropping a handle stops its stream, so
//! every exit path that drops the manager or calls `release` frees the
//! device.

use crate::error::MediaError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Video resolution information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoResolution {
    pub width: u32,
    pub height: u32,
}

impl VideoResolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const VGA: Self = Self::new(640, 480);
}

/// Which camera to prefer on devices that have several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Front-facing ("user") camera
    #[default]
    User,
    /// Rear-facing camera
    Environment,
}

/// What to ask the camera for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraRequest {
    /// Ideal capture resolution
    pub resolution: VideoResolution,
    /// Preferred camera
    pub facing: FacingMode,
    /// Target framerate
    pub framerate: u32,
    /// Backend device index
    pub device_index: u32,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            resolution: VideoResolution::VGA,
            facing: FacingMode::User,
            framerate: 30,
            device_index: 0,
        }
    }
}

impl CameraRequest {
    /// Validate the request
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(MediaError::InvalidConfiguration {
                message: "Invalid resolution".to_string(),
            });
        }
        if self.framerate == 0 || self.framerate > 120 {
            return Err(MediaError::InvalidConfiguration {
                message: "Invalid framerate".to_string(),
            });
        }
        Ok(())
    }
}

/// Uncompressed RGB24 frame pulled from a stream
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB bytes, row-major
    pub rgb: Vec<u8>,
    /// Per-stream frame counter
    pub sequence: u64,
}

impl RawFrame {
    /// Byte length a well-formed frame of this size must have
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// An open, live camera stream
pub trait CameraStream: Send {
    /// Pull the current frame
    fn read_frame(&mut self) -> Result<RawFrame, MediaError>;
    /// Stop the stream. Must be idempotent.
    fn stop(&mut self);
    /// Negotiated resolution
    fn resolution(&self) -> VideoResolution;
}

/// Platform camera backend
pub trait CameraBackend: Send {
    /// Backend name for logs
    fn name(&self) -> &str;
    /// Open a video-only stream matching `request`
    fn open(&mut self, request: &CameraRequest) -> Result<Box<dyn CameraStream>, MediaError>;
}

/// Exclusive handle to the session's live stream
pub struct MediaHandle {
    id: Uuid,
    stream: Box<dyn CameraStream>,
    opened_at: Instant,
}

impl MediaHandle {
    fn new(stream: Box<dyn CameraStream>) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream,
            opened_at: Instant::now(),
        }
    }

    /// Handle identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pull the current frame from the stream
    pub fn read_frame(&mut self) -> Result<RawFrame, MediaError> {
        self.stream.read_frame()
    }

    /// Negotiated resolution
    pub fn resolution(&self) -> VideoResolution {
        self.stream.resolution()
    }

    /// How long the stream has been open
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

impl std::fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaHandle")
            .field("id", &self.id)
            .field("resolution", &self.stream.resolution())
            .finish()
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        self.stream.stop();
        debug!(handle = %self.id, "camera stream stopped");
    }
}

/// Owner of the session's camera stream
pub struct MediaResourceManager {
    backend: Box<dyn CameraBackend>,
    request: CameraRequest,
    handle: Option<MediaHandle>,
    acquisitions: u64,
}

impl MediaResourceManager {
    /// Create a manager over `backend` using the default 640x480 front camera request
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self::with_request(backend, CameraRequest::default())
    }

    /// Create a manager with a custom camera request
    pub fn with_request(backend: Box<dyn CameraBackend>, request: CameraRequest) -> Self {
        Self {
            backend,
            request,
            handle: None,
            acquisitions: 0,
        }
    }

    /// Open the camera. A no-op when a handle is already open.
    pub fn acquire(&mut self) -> Result<(), MediaError> {
        if self.handle.is_some() {
            debug!("acquire skipped: camera already held");
            return Ok(());
        }
        self.request.validate()?;

        match self.backend.open(&self.request) {
            Ok(stream) => {
                let handle = MediaHandle::new(stream);
                self.acquisitions += 1;
                info!(
                    backend = self.backend.name(),
                    handle = %handle.id(),
                    width = handle.resolution().width,
                    height = handle.resolution().height,
                    "camera acquired"
                );
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "camera acquisition failed");
                Err(e)
            }
        }
    }

    /// Release the camera. Safe to call any number of times.
    pub fn release(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                info!(handle = %handle.id(), held_for = ?handle.age(), "camera released");
                true
            }
            None => false,
        }
    }

    /// Whether a stream is currently open
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Mutable access to the open handle, for sampling
    pub fn handle_mut(&mut self) -> Option<&mut MediaHandle> {
        self.handle.as_mut()
    }

    /// Number of successful acquisitions over the manager's lifetime
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions
    }

    /// The request used when opening the camera
    pub fn request(&self) -> &CameraRequest {
        &self.request
    }
}

impl Drop for MediaResourceManager {
    fn drop(&mut self) {
        self.release();
    }
}
