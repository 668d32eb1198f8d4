//! Platform camera capture through `nokhwa`
//!
//! `nokhwa::Camera` is not guaranteed to be `Send`, so each open stream lives
//! on a dedicated worker thread that owns the camera and answers frame
//! requests over a channel.

use crate::error::MediaError;
use crate::video_capture::{CameraBackend, CameraRequest, CameraStream, RawFrame, VideoResolution};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info, warn};

enum WorkerCommand {
    Grab(mpsc::SyncSender<Result<RawFrame, MediaError>>),
    Stop,
}

/// Native camera backend
#[derive(Debug, Default)]
pub struct NativeCamera;

impl NativeCamera {
    /// Create the platform camera backend
    pub fn new() -> Self {
        Self
    }
}

fn open_error(error: nokhwa::NokhwaError, index: u32) -> MediaError {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("authoriz") {
        MediaError::PermissionDenied {
            operation: format!("camera {}: {}", index, message),
        }
    } else if lowered.contains("not found") || lowered.contains("no device") {
        MediaError::DeviceNotFound {
            device_id: format!("camera:{}", index),
        }
    } else {
        MediaError::ResourceNotAvailable {
            resource: format!("camera {}: {}", index, message),
        }
    }
}

fn frame_error(error: nokhwa::NokhwaError) -> MediaError {
    MediaError::Video {
        message: error.to_string(),
    }
}

impl CameraBackend for NativeCamera {
    fn name(&self) -> &str {
        "nokhwa"
    }

    fn open(&mut self, request: &CameraRequest) -> Result<Box<dyn CameraStream>, MediaError> {
        let index = request.device_index;
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(request.resolution.width, request.resolution.height),
                FrameFormat::MJPEG,
                request.framerate,
            ),
        ));

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<VideoResolution, MediaError>>(1);
        let (command_tx, command_rx) = mpsc::channel::<WorkerCommand>();

        let worker = thread::Builder::new()
            .name(format!("camera-{}", index))
            .spawn(move || {
                let mut camera = match Camera::new(CameraIndex::Index(index), format) {
                    Ok(camera) => camera,
                    Err(e) => {
                        let _ = ready_tx.send(Err(open_error(e, index)));
                        return;
                    }
                };
                if let Err(e) = camera.open_stream() {
                    let _ = ready_tx.send(Err(open_error(e, index)));
                    return;
                }
                let negotiated = camera.resolution();
                let _ = ready_tx.send(Ok(VideoResolution::new(
                    negotiated.width(),
                    negotiated.height(),
                )));

                let mut sequence = 0u64;
                while let Ok(command) = command_rx.recv() {
                    match command {
                        WorkerCommand::Grab(reply) => {
                            let frame = camera
                                .frame()
                                .and_then(|buffer| buffer.decode_image::<RgbFormat>())
                                .map_err(frame_error)
                                .map(|image| {
                                    sequence += 1;
                                    let (width, height) = (image.width(), image.height());
                                    RawFrame {
                                        width,
                                        height,
                                        rgb: image.into_raw(),
                                        sequence,
                                    }
                                });
                            let _ = reply.send(frame);
                        }
                        WorkerCommand::Stop => break,
                    }
                }

                if let Err(e) = camera.stop_stream() {
                    warn!(error = %e, "failed to stop camera stream");
                }
                debug!(index, "camera worker exited");
            })
            .map_err(|e| MediaError::ResourceNotAvailable {
                resource: format!("camera worker thread: {}", e),
            })?;

        let resolution = match ready_rx.recv() {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(MediaError::Video {
                    message: "camera worker exited during open".to_string(),
                });
            }
        };

        info!(index, width = resolution.width, height = resolution.height, "native camera opened");
        Ok(Box::new(NativeStream {
            commands: Some(command_tx),
            worker: Some(worker),
            resolution,
        }))
    }
}

struct NativeStream {
    commands: Option<mpsc::Sender<WorkerCommand>>,
    worker: Option<thread::JoinHandle<()>>,
    resolution: VideoResolution,
}

impl CameraStream for NativeStream {
    fn read_frame(&mut self) -> Result<RawFrame, MediaError> {
        let commands = self.commands.as_ref().ok_or(MediaError::CaptureNotActive)?;
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        commands
            .send(WorkerCommand::Grab(reply_tx))
            .map_err(|_| MediaError::CaptureNotActive)?;
        reply_rx.recv().map_err(|_| MediaError::CaptureNotActive)?
    }

    fn stop(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(WorkerCommand::Stop);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn resolution(&self) -> VideoResolution {
        self.resolution
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop();
    }
}
