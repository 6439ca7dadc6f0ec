use crate::error::FrameError;
use crate::frame::GrayFrame;

use std::time::SystemTime;
use tracing::{debug, info, trace};

/// Aggregate absolute intensity difference between two consecutive frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Identifier of the newer frame of the pair
    pub frame_id: u64,
    /// Capture time of the newer frame
    pub timestamp: SystemTime,
    /// Sum of |current - previous| over all pixels
    pub magnitude: u64,
}

impl MotionSample {
    pub fn value(&self) -> f64 {
        self.magnitude as f64
    }
}

/// Frame differencing motion extractor
///
/// Holds the previous frame by value; each call to [`MotionExtractor::extract`]
/// moves the new frame in and drops the old one.
#[derive(Debug, Default)]
pub struct MotionExtractor {
    previous: Option<GrayFrame>,
    pub(crate) frame_count: u64,
}

impl MotionExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next frame.
    ///
    /// Returns `Ok(None)` for the first frame, which only primes the extractor.
    /// A frame whose dimensions differ from the previous one fails with
    /// [`FrameError::DimensionMismatch`] and leaves the previous frame in place.
    pub fn extract(&mut self, frame: GrayFrame) -> Result<Option<MotionSample>, FrameError> {
        let Some(previous) = self.previous.as_ref() else {
            info!(
                "Priming motion extractor with frame {} ({}x{})",
                frame.id, frame.width, frame.height
            );
            self.previous = Some(frame);
            self.frame_count = 1;
            return Ok(None);
        };

        let magnitude = absolute_difference(previous, &frame)?;
        trace!("Frame {} motion magnitude {}", frame.id, magnitude);

        let sample = MotionSample {
            frame_id: frame.id,
            timestamp: frame.timestamp,
            magnitude,
        };

        self.previous = Some(frame);
        self.frame_count += 1;

        Ok(Some(sample))
    }

    /// Drop the held frame so the next frame primes again
    pub fn reset(&mut self) {
        debug!("Resetting motion extractor after {} frames", self.frame_count);
        self.previous = None;
        self.frame_count = 0;
    }

    pub fn is_primed(&self) -> bool {
        self.previous.is_some()
    }
}

/// Sum of absolute per-pixel differences of two equally sized frames
pub fn absolute_difference(previous: &GrayFrame, current: &GrayFrame) -> Result<u64, FrameError> {
    if previous.dimensions() != current.dimensions() || previous.data.len() != current.data.len() {
        return Err(FrameError::DimensionMismatch {
            previous: previous.dimensions(),
            current: current.dimensions(),
        });
    }

    Ok(previous
        .data
        .iter()
        .zip(current.data.iter())
        .map(|(&a, &b)| a.abs_diff(b) as u64)
        .sum())
}
