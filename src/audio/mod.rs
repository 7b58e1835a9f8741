pub mod level;
pub mod pitch;
pub mod classifier;
pub mod detector;
pub mod fft;
pub mod input;

pub use level::{LevelConfig, LevelProcessor, LevelState};
pub use pitch::{PitchConfig, PitchEstimator, PitchModel, PitchSource};
pub use classifier::{
    ClassifierConfig, EventClassifier, PitchRange, PitchRangeThresholds, SoundEventDescriptor,
    SoundType, SoundTypeThresholds,
};
pub use detector::{DetectorConfig, DetectorState, SoundEventDetector};
pub use fft::SpectrumAnalyzer;
pub use input::MicInput;

use serde::{Deserialize, Serialize};

/// Nyquist frequency of a 44.1 kHz source.
pub const DEFAULT_NYQUIST: f32 = 22050.0;

/// Number of magnitude bins the pipeline analyzes per frame.
pub const DEFAULT_BINS: usize = 64;

/// Magnitude spectrum for one frame, bins evenly spaced over `[0, nyquist]`.
///
/// Magnitudes are on the 0-255 byte scale produced by [`SpectrumAnalyzer`];
/// the pitch thresholds are tuned for that scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    bins: Vec<f32>,
    nyquist: f32,
}

impl Spectrum {
    pub fn new(bins: Vec<f32>) -> Self {
        Self::with_nyquist(bins, DEFAULT_NYQUIST)
    }

    /// Negative or NaN magnitudes are floored to zero.
    pub fn with_nyquist(bins: Vec<f32>, nyquist: f32) -> Self {
        let bins = bins
            .into_iter()
            .map(|m| if m.is_finite() { m.max(0.0) } else { 0.0 })
            .collect();
        Self { bins, nyquist }
    }

    pub fn silent(len: usize) -> Self {
        Self::new(vec![0.0; len])
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn nyquist(&self) -> f32 {
        self.nyquist
    }

    /// Width of one bin in Hz.
    pub fn bin_size(&self) -> f32 {
        if self.bins.is_empty() {
            return 0.0;
        }
        self.nyquist / self.bins.len() as f32
    }

    pub fn bin_frequency(&self, index: usize) -> f32 {
        index as f32 * self.bin_size()
    }

    /// Index of the bin containing `frequency`, or `None` past the last bin.
    pub fn bin_for_frequency(&self, frequency: f32) -> Option<usize> {
        let bin_size = self.bin_size();
        if bin_size <= 0.0 || frequency < 0.0 {
            return None;
        }
        let index = (frequency / bin_size).floor() as usize;
        (index < self.bins.len()).then_some(index)
    }

    pub fn magnitude(&self, index: usize) -> f32 {
        self.bins.get(index).copied().unwrap_or(0.0)
    }

    /// Magnitude-weighted mean frequency, `None` when the spectrum carries no energy.
    pub fn centroid(&self) -> Option<f32> {
        let mut weighted_sum = 0.0;
        let mut magnitude_sum = 0.0;

        for (i, &magnitude) in self.bins.iter().enumerate() {
            weighted_sum += self.bin_frequency(i) * magnitude;
            magnitude_sum += magnitude;
        }

        if magnitude_sum > 0.0 {
            Some(weighted_sum / magnitude_sum)
        } else {
            None
        }
    }
}

impl Default for Spectrum {
    fn default() -> Self {
        Self::silent(DEFAULT_BINS)
    }
}

/// One frame of analyzed input as retained by the event detector.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundFrame {
    pub level: f32,
    pub pitch: f32,
    pub timestamp_ms: u64,
    pub spectrum: Option<Spectrum>,
}

impl SoundFrame {
    pub fn new(level: f32, pitch: f32, timestamp_ms: u64) -> Self {
        Self {
            level,
            pitch,
            timestamp_ms,
            spectrum: None,
        }
    }

    pub fn with_spectrum(mut self, spectrum: Spectrum) -> Self {
        self.spectrum = Some(spectrum);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_geometry() {
        let spectrum = Spectrum::silent(64);
        assert!((spectrum.bin_size() - 344.53125).abs() < 1e-3);
        assert_eq!(spectrum.bin_for_frequency(0.0), Some(0));
        assert_eq!(spectrum.bin_for_frequency(400.0), Some(1));
        assert_eq!(spectrum.bin_for_frequency(22050.0), None);
    }

    #[test]
    fn test_centroid_of_single_bin() {
        let mut bins = vec![0.0; 64];
        bins[4] = 200.0;
        let spectrum = Spectrum::new(bins);
        let centroid = spectrum.centroid().unwrap();
        assert!((centroid - spectrum.bin_frequency(4)).abs() < 1e-3);
        assert_eq!(Spectrum::silent(64).centroid(), None);
    }

    #[test]
    fn test_negative_magnitudes_are_floored() {
        let spectrum = Spectrum::new(vec![-3.0, f32::NAN, 5.0]);
        assert_eq!(spectrum.bins(), &[0.0, 0.0, 5.0]);
    }
}
