use crate::error::FrameError;
use std::time::SystemTime;

/// Single-channel 8-bit frame, row-major
#[derive(Debug, Clone)]
pub struct GrayFrame {
    /// Monotonic frame identifier assigned by the source
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Intensity samples, `width * height` bytes
    pub data: Vec<u8>,
}

impl GrayFrame {
    /// Create a frame, checking that the buffer matches the dimensions
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(FrameError::Malformed {
                frame_id: id,
                details: format!(
                    "expected {} bytes for {}x{}, got {}",
                    expected,
                    width,
                    height,
                    data.len()
                ),
            });
        }

        Ok(Self {
            id,
            timestamp,
            width,
            height,
            data,
        })
    }

    /// Frame filled with a single intensity
    pub fn filled(id: u64, width: u32, height: u32, value: u8) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len()
    }
}
