use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::Spectrum;

/// Produces the per-frame [`Spectrum`] the pitch estimator and classifier consume.
///
/// Output mirrors a browser `AnalyserNode` byte spectrum: Blackman window,
/// magnitudes smoothed over time, converted to dB and mapped from a
/// `[min_db, max_db]` window onto 0-255. The FFT length is twice the bin count.
pub struct SpectrumAnalyzer {
    sample_rate: f32,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: f32, bins: usize) -> Self {
        let fft_size = (bins.max(1)) * 2;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            sample_rate,
            fft_size,
            fft,
            window: Self::blackman_window(fft_size),
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 0.99);
        self
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        if size < 2 {
            return vec![1.0; size];
        }
        let a0 = 0.42;
        let a1 = 0.5;
        let a2 = 0.08;
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Analyze the most recent `fft_size` samples (zero-padded when short).
    pub fn analyze(&mut self, samples: &[f32]) -> Spectrum {
        let start = samples.len().saturating_sub(self.fft_size);
        let recent = &samples[start..];

        let mut buffer: Vec<Complex<f32>> = recent
            .iter()
            .zip(self.window.iter())
            .map(|(&x, &w)| Complex::new(x * w, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        let db_span = self.max_db - self.min_db;
        let bins = buffer[..self.fft_size / 2]
            .iter()
            .zip(self.smoothed.iter_mut())
            .map(|(c, smoothed)| {
                let magnitude = c.norm() / self.fft_size as f32;
                *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
                let db = 20.0 * smoothed.max(1e-12).log10();
                (255.0 * (db - self.min_db) / db_span).clamp(0.0, 255.0)
            })
            .collect();

        Spectrum::with_nyquist(bins, self.sample_rate / 2.0)
    }
}

/// RMS amplitude of a block of samples.
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, amplitude: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate).sin() * amplitude)
            .collect()
    }

    #[test]
    fn test_silence_maps_to_zero() {
        let mut analyzer = SpectrumAnalyzer::new(44100.0, 64);
        let spectrum = analyzer.analyze(&vec![0.0; 128]);
        assert_eq!(spectrum.len(), 64);
        assert!(spectrum.bins().iter().all(|&m| m == 0.0));
        assert!((spectrum.nyquist() - 22050.0).abs() < 1e-3);
    }

    #[test]
    fn test_tone_peaks_in_its_bin() {
        let mut analyzer = SpectrumAnalyzer::new(44100.0, 64).with_smoothing(0.0);
        // 1378 Hz sits on bin 4 (4 * 344.5); quiet enough that neighbours don't clip at 255.
        let spectrum = analyzer.analyze(&sine(1378.125, 0.01, 44100.0, 128));
        let loudest = spectrum
            .bins()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(loudest, 4);
        assert!(spectrum.magnitude(4) > 150.0);
        assert!(spectrum.magnitude(4) < 255.0);
    }

    #[test]
    fn test_rms_level() {
        assert_eq!(rms_level(&[]), 0.0);
        assert!((rms_level(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }
}
