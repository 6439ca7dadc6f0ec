use crate::analyzer::window::SignalWindow;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Relative margin a later bin needs to displace an earlier one
const TIE_TOLERANCE: f64 = 1e-9;

/// Dominant frequency of a full signal window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectralResult {
    /// Offset of the strongest bin from bin 1 (bin 1 reports 0)
    pub dominant_frequency_index: usize,
    pub is_rhythmic: bool,
}

impl SpectralResult {
    /// Result used while the window is still filling
    pub fn absent() -> Self {
        Self {
            dominant_frequency_index: 0,
            is_rhythmic: false,
        }
    }
}

/// FFT-based rhythm detector
///
/// The mean is removed before the transform, so bin 0 carries no energy and
/// is skipped. Only bins `[1, max_bin)` are searched.
pub struct RhythmAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    window_len: usize,
    rhythm_threshold: usize,
    max_bin: usize,
}

impl RhythmAnalyzer {
    pub fn new(window_len: usize, rhythm_threshold: usize, max_bin: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_len);
        debug!(
            "Planned {}-point FFT (rhythm threshold {}, max bin {})",
            window_len, rhythm_threshold, max_bin
        );

        Self {
            fft,
            window_len,
            rhythm_threshold,
            max_bin,
        }
    }

    /// Analyze a window; `None` until the window is full
    pub fn analyze(&self, window: &SignalWindow) -> Option<SpectralResult> {
        if !window.is_full() {
            return None;
        }
        Some(self.analyze_sequence(&window.as_sequence()))
    }

    /// Analyze an arbitrary sequence, oldest sample first
    pub fn analyze_sequence(&self, samples: &[f64]) -> SpectralResult {
        let spectrum = self.magnitude_spectrum(samples);
        let upper = self.max_bin.min(spectrum.len());

        if upper <= 1 {
            return SpectralResult::absent();
        }

        // Real input mirrors its spectrum, so equal peaks are common; the lower bin wins
        let mut best_offset = 0usize;
        let mut best_magnitude = spectrum[1];
        for (offset, &magnitude) in spectrum[1..upper].iter().enumerate().skip(1) {
            if magnitude - best_magnitude > TIE_TOLERANCE * best_magnitude.abs().max(1.0) {
                best_magnitude = magnitude;
                best_offset = offset;
            }
        }

        let result = SpectralResult {
            dominant_frequency_index: best_offset,
            is_rhythmic: best_offset > self.rhythm_threshold,
        };
        trace!(
            "Dominant frequency index {} (magnitude {:.1}, rhythmic: {})",
            result.dominant_frequency_index,
            best_magnitude,
            result.is_rhythmic
        );
        result
    }

    /// Magnitudes of the DFT of the mean-removed sequence
    pub fn magnitude_spectrum(&self, samples: &[f64]) -> Vec<f64> {
        if samples.is_empty() {
            return Vec::new();
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .map(|&s| Complex::new(s - mean, 0.0))
            .collect();

        if buffer.len() == self.window_len {
            self.fft.process(&mut buffer);
        } else {
            FftPlanner::new()
                .plan_fft_forward(buffer.len())
                .process(&mut buffer);
        }

        buffer.iter().map(|c| c.norm()).collect()
    }

    pub fn rhythm_threshold(&self) -> usize {
        self.rhythm_threshold
    }
}
