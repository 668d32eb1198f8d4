//! Still-frame extraction from the live stream

use crate::error::MediaError;
use crate::video_capture::MediaHandle;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use presenca_core::{FrameImage, SamplePurpose};
use tracing::trace;

/// Draws the current frame of a stream into a reusable buffer and JPEG-encodes it.
///
/// The sampler never holds a stream of its own; the caller lends it the
/// session's [`MediaHandle`] for the duration of one `sample` call.
#[derive(Debug)]
pub struct FrameSampler {
    buffer: Vec<u8>,
    validation_quality: u8,
    submission_quality: u8,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(
            SamplePurpose::Validation.default_quality(),
            SamplePurpose::Submission.default_quality(),
        )
    }
}

impl FrameSampler {
    /// Create a sampler with explicit JPEG qualities (1-100)
    pub fn new(validation_quality: u8, submission_quality: u8) -> Self {
        Self {
            buffer: Vec::new(),
            validation_quality: validation_quality.clamp(1, 100),
            submission_quality: submission_quality.clamp(1, 100),
        }
    }

    /// JPEG quality used for `purpose`
    pub fn quality_for(&self, purpose: SamplePurpose) -> u8 {
        match purpose {
            SamplePurpose::Validation => self.validation_quality,
            SamplePurpose::Submission => self.submission_quality,
        }
    }

    /// Sample the current frame of `handle`
    pub fn sample(
        &mut self,
        handle: &mut MediaHandle,
        purpose: SamplePurpose,
    ) -> Result<FrameImage, MediaError> {
        let raw = handle.read_frame()?;
        let expected = raw.expected_len();
        if raw.rgb.len() != expected || expected == 0 {
            return Err(MediaError::InvalidFrameData {
                expected,
                actual: raw.rgb.len(),
            });
        }

        let quality = self.quality_for(purpose);
        self.buffer.clear();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut self.buffer, quality);
            encoder
                .encode(&raw.rgb, raw.width, raw.height, ExtendedColorType::Rgb8)
                .map_err(|e| MediaError::EncodingFailed {
                    codec: "jpeg".to_string(),
                    reason: e.to_string(),
                })?;
        }
        trace!(
            sequence = raw.sequence,
            quality,
            bytes = self.buffer.len(),
            "frame sampled"
        );

        Ok(FrameImage::new(
            Bytes::copy_from_slice(&self.buffer),
            raw.width,
            raw.height,
            quality,
            purpose,
        ))
    }
}
