use super::Spectrum;
use crate::math::lerp;
use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Frequency windows and acceptance thresholds for FFT pitch estimation.
///
/// Magnitude thresholds assume the 0-255 byte scale of [`super::SpectrumAnalyzer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    // Peak-picking
    pub peak_min_hz: f32,
    pub peak_max_hz: f32,
    pub peak_threshold: f32,

    // Harmonic-sum
    pub fundamental_min_hz: f32,
    pub fundamental_max_hz: f32,
    pub fundamental_step_hz: f32,
    pub harmonics: u32,
    pub harmonic_score_threshold: f32,

    /// Harmonic results at or above this are distrusted in favor of the peak.
    pub harmonic_ceiling_hz: f32,
    pub smoothing: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            peak_min_hz: 80.0,
            peak_max_hz: 2000.0,
            peak_threshold: 50.0,

            fundamental_min_hz: 80.0,
            fundamental_max_hz: 800.0,
            fundamental_step_hz: 5.0,
            harmonics: 5,
            harmonic_score_threshold: 100.0,

            harmonic_ceiling_hz: 1000.0,
            smoothing: 0.1,
        }
    }
}

/// Smoothed fundamental-frequency estimate from a magnitude spectrum.
///
/// Two estimators run every frame: plain peak-picking over the voice band and
/// a harmonic-sum search over candidate fundamentals. The harmonic result wins
/// when it finds something plausible, otherwise the peak is used, and when
/// neither fires the previous pitch is retained. Detections are folded in
/// through a one-pole low-pass so the output lags step changes by roughly
/// ten frames.
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    config: PitchConfig,
    pitch: f32,
}

impl PitchEstimator {
    pub fn new(config: PitchConfig) -> Self {
        Self { config, pitch: 0.0 }
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Fold this frame's spectrum into the smoothed pitch and return it.
    pub fn estimate(&mut self, spectrum: &Spectrum) -> f32 {
        if spectrum.is_empty() {
            return self.pitch;
        }

        let harmonic = self.find_fundamental_frequency(spectrum);
        let peak = self.find_peak_frequency(spectrum);

        let detected = if harmonic > 0.0 && harmonic < self.config.harmonic_ceiling_hz {
            harmonic
        } else if peak > 0.0 {
            peak
        } else {
            0.0
        };

        if detected > 0.0 {
            self.pitch = lerp(self.pitch, detected, self.config.smoothing);
        }

        self.pitch
    }

    /// Strongest bin in the voice band above the absolute threshold, in Hz.
    pub fn find_peak_frequency(&self, spectrum: &Spectrum) -> f32 {
        let bin_size = spectrum.bin_size();
        if bin_size <= 0.0 {
            return 0.0;
        }

        let start_bin = (self.config.peak_min_hz / bin_size).floor() as usize;
        let end_bin = ((self.config.peak_max_hz / bin_size).floor() as usize).min(spectrum.len());

        let mut max_amp = 0.0;
        let mut max_bin = 0;
        for (i, &magnitude) in spectrum.bins().iter().enumerate().take(end_bin).skip(start_bin) {
            if magnitude > max_amp && magnitude > self.config.peak_threshold {
                max_amp = magnitude;
                max_bin = i;
            }
        }

        if max_amp > self.config.peak_threshold {
            max_bin as f32 * bin_size
        } else {
            0.0
        }
    }

    /// Candidate fundamental with the best weighted harmonic sum, in Hz.
    pub fn find_fundamental_frequency(&self, spectrum: &Spectrum) -> f32 {
        let mut best_fundamental = 0.0;
        let mut best_score = 0.0;

        let mut candidate = self.config.fundamental_min_hz;
        while candidate <= self.config.fundamental_max_hz {
            let score = self.harmonic_score(spectrum, candidate);
            if score > best_score {
                best_score = score;
                best_fundamental = candidate;
            }
            candidate += self.config.fundamental_step_hz.max(1.0);
        }

        if best_score > self.config.harmonic_score_threshold {
            best_fundamental
        } else {
            0.0
        }
    }

    /// Sum of the magnitudes at `f, 2f, ..`, each weighted by `1/h`.
    pub fn harmonic_score(&self, spectrum: &Spectrum, fundamental: f32) -> f32 {
        (1..=self.config.harmonics)
            .filter_map(|h| {
                spectrum
                    .bin_for_frequency(fundamental * h as f32)
                    .map(|bin| spectrum.magnitude(bin) / h as f32)
            })
            .sum()
    }
}

impl Default for PitchEstimator {
    fn default() -> Self {
        Self::new(PitchConfig::default())
    }
}

/// An external pitch tracker (e.g. a neural model) polled once per frame.
///
/// `Ok(None)` means the model heard nothing voiced this frame.
pub trait PitchModel {
    fn query(&mut self) -> Result<Option<f32>>;

    /// Identification string used in logs.
    fn model_name(&self) -> &str;
}

/// Where the authoritative pitch comes from, chosen once at startup.
pub enum PitchSource {
    Fft(PitchEstimator),
    External {
        model: Box<dyn PitchModel>,
        fallback: PitchEstimator,
        pitch: f32,
    },
}

impl PitchSource {
    pub fn fft(config: PitchConfig) -> Self {
        PitchSource::Fft(PitchEstimator::new(config))
    }

    /// Use the external model if it initialized, the FFT estimator otherwise.
    ///
    /// Initialization is attempted once; a failure is not retried.
    pub fn select(model: Option<Result<Box<dyn PitchModel>>>, config: PitchConfig) -> Self {
        match model {
            Some(Ok(model)) => {
                info!("✅ Using external pitch model '{}'", model.model_name());
                PitchSource::External {
                    model,
                    fallback: PitchEstimator::new(config),
                    pitch: 0.0,
                }
            }
            Some(Err(e)) => {
                warn!("⚠️  Pitch model failed to initialize: {:#}. Falling back to FFT estimation.", e);
                Self::fft(config)
            }
            None => {
                info!("Using FFT-based pitch estimation");
                Self::fft(config)
            }
        }
    }

    pub fn source_type(&self) -> &'static str {
        match self {
            PitchSource::Fft(_) => "FFT",
            PitchSource::External { .. } => "External",
        }
    }

    pub fn pitch(&self) -> f32 {
        match self {
            PitchSource::Fft(estimator) => estimator.pitch(),
            PitchSource::External { pitch, .. } => *pitch,
        }
    }

    /// Produce this frame's pitch. A model error demotes the source to FFT for good.
    pub fn update(&mut self, spectrum: Option<&Spectrum>) -> f32 {
        match self {
            PitchSource::Fft(estimator) => match spectrum {
                Some(spectrum) => estimator.estimate(spectrum),
                None => estimator.pitch(),
            },
            PitchSource::External {
                model,
                fallback,
                pitch,
            } => {
                // Keep the FFT path warm so a later fallback starts from a sane value.
                if let Some(spectrum) = spectrum {
                    fallback.estimate(spectrum);
                }

                match model.query() {
                    Ok(reading) => {
                        *pitch = reading.filter(|f| f.is_finite() && *f > 0.0).unwrap_or(0.0);
                        *pitch
                    }
                    Err(e) => {
                        warn!(
                            "⚠️  Pitch model '{}' failed: {:#}. Using FFT estimation for the rest of the session.",
                            model.model_name(),
                            e
                        );
                        let estimator = std::mem::take(fallback);
                        let current = estimator.pitch();
                        *self = PitchSource::Fft(estimator);
                        current
                    }
                }
            }
        }
    }
}
