//! Synthetic camera for tests, demos and headless hosts

use crate::error::MediaError;
use crate::video_capture::{CameraBackend, CameraRequest, CameraStream, RawFrame, VideoResolution};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared counters and failure switches of a [`SyntheticCamera`]
#[derive(Debug, Default)]
pub struct SyntheticCameraState {
    opened: AtomicUsize,
    closed: AtomicUsize,
    frames: AtomicU64,
    deny_permission: AtomicBool,
    missing_device: AtomicBool,
    last_request: Mutex<Option<CameraRequest>>,
}

impl SyntheticCameraState {
    /// Streams opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Streams stopped so far
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Streams currently live
    pub fn live_streams(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }

    /// Frames read across all streams
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    /// Make subsequent opens fail with a permission error
    pub fn set_permission_denied(&self, denied: bool) {
        self.deny_permission.store(denied, Ordering::SeqCst);
    }

    /// Make subsequent opens fail as if no camera were attached
    pub fn set_device_missing(&self, missing: bool) {
        self.missing_device.store(missing, Ordering::SeqCst);
    }

    /// The request passed to the most recent open
    pub fn last_request(&self) -> Option<CameraRequest> {
        self.last_request.lock().clone()
    }
}

/// Camera backend producing a moving gradient
#[derive(Debug, Clone, Default)]
pub struct SyntheticCamera {
    state: Arc<SyntheticCameraState>,
}

impl SyntheticCamera {
    /// Create a camera that opens successfully
    pub fn new() -> Self {
        Self::default()
    }

    /// A camera whose opens are refused
    pub fn denying_permission() -> Self {
        let camera = Self::new();
        camera.state.set_permission_denied(true);
        camera
    }

    /// Handle to the shared counters
    pub fn state(&self) -> Arc<SyntheticCameraState> {
        self.state.clone()
    }
}

impl CameraBackend for SyntheticCamera {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&mut self, request: &CameraRequest) -> Result<Box<dyn CameraStream>, MediaError> {
        *self.state.last_request.lock() = Some(request.clone());

        if self.state.deny_permission.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied {
                operation: "camera access".to_string(),
            });
        }
        if self.state.missing_device.load(Ordering::SeqCst) {
            return Err(MediaError::DeviceNotFound {
                device_id: format!("synthetic:{}", request.device_index),
            });
        }

        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticStream {
            state: self.state.clone(),
            resolution: request.resolution,
            sequence: 0,
            stopped: false,
        }))
    }
}

struct SyntheticStream {
    state: Arc<SyntheticCameraState>,
    resolution: VideoResolution,
    sequence: u64,
    stopped: bool,
}

impl CameraStream for SyntheticStream {
    fn read_frame(&mut self) -> Result<RawFrame, MediaError> {
        if self.stopped {
            return Err(MediaError::CaptureNotActive);
        }
        let (width, height) = (self.resolution.width, self.resolution.height);
        let shift = (self.sequence % 256) as u8;
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                rgb.push((x * 255 / width.max(1)) as u8);
                rgb.push((y * 255 / height.max(1)) as u8);
                rgb.push(shift);
            }
        }
        self.sequence += 1;
        self.state.frames.fetch_add(1, Ordering::SeqCst);

        Ok(RawFrame {
            width,
            height,
            rgb,
            sequence: self.sequence,
        })
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.state.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn resolution(&self) -> VideoResolution {
        self.resolution
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}
