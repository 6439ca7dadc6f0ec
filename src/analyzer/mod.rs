mod motion;
mod rhythm;
mod window;

pub use motion::{absolute_difference, MotionExtractor, MotionSample};
pub use rhythm::{RhythmAnalyzer, SpectralResult};
pub use window::SignalWindow;
