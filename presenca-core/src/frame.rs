//! Encoded still frames taken from the live camera stream

use bytes::Bytes;
use std::time::SystemTime;

/// What a sampled frame is going to be used for.
///
/// The purpose selects the JPEG quality: polling traffic is kept light while
/// the frame actually evaluated for identity is encoded at high fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplePurpose {
    /// Realtime quality polling
    Validation,
    /// Identity verification or reference enrollment
    Submission,
}

impl SamplePurpose {
    /// Default JPEG quality (0-100) for this purpose
    pub fn default_quality(&self) -> u8 {
        match self {
            SamplePurpose::Validation => 80,
            SamplePurpose::Submission => 95,
        }
    }
}

/// A JPEG-encoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameImage {
    /// JPEG bytes
    pub data: Bytes,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// JPEG quality used for encoding
    pub quality: u8,
    /// Purpose the frame was sampled for
    pub purpose: SamplePurpose,
    /// Wall-clock capture time
    pub captured_at: SystemTime,
}

impl FrameImage {
    /// Create a frame from already encoded JPEG bytes
    pub fn new(
        data: impl Into<Bytes>,
        width: u32,
        height: u32,
        quality: u8,
        purpose: SamplePurpose,
    ) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            quality,
            purpose,
            captured_at: SystemTime::now(),
        }
    }

    /// Encoded size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame carries no image data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw JPEG bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// MIME type of the encoded payload
    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }
}
