use crate::math::{lerp, map_range};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Tuning for the loudness path from raw microphone amplitude to calibrated level.
///
/// # Normalization
/// `level = clamp(map(raw * sensitivity, 0, max_recorded * dynamic_range, 0, 1), 0, 1)`
///
/// The running maximum makes the processor self-normalizing: the loudest sound
/// seen so far (scaled by `dynamic_range`) defines full scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub initial_sensitivity: f32,
    pub min_sensitivity: f32,
    pub max_sensitivity: f32,
    pub dynamic_range: f32,
    pub peak_decay: f32,
    pub smoothing: f32,

    // Auto-calibration
    pub auto_calibrate: bool,
    pub calibration_window_ms: u64,
    pub calibration_target_peak: f32,
    pub calibration_max_sensitivity: f32,
    pub calibration_rate: f32,
    pub continuous_rate: f32,
    pub calibration_peak_decay: f32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            initial_sensitivity: 3.0,
            min_sensitivity: 0.5,
            max_sensitivity: 10.0,
            dynamic_range: 0.5,
            peak_decay: 0.95,
            smoothing: 0.15,

            auto_calibrate: false,
            calibration_window_ms: 5000,
            calibration_target_peak: 0.4,
            calibration_max_sensitivity: 8.0,
            calibration_rate: 0.05,
            continuous_rate: 0.001,
            calibration_peak_decay: 0.9995,
        }
    }
}

/// Loudness state mutated once per frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LevelState {
    pub raw_level: f32,
    pub calibrated_level: f32,
    pub smooth_level: f32,
    pub max_recorded_level: f32,
    pub peak_hold: f32,
    pub dynamic_range: f32,
    pub sensitivity: f32,
}

/// Raw levels below this are treated as silence when deriving a sensitivity.
const CALIBRATION_FLOOR: f32 = 1e-4;

#[derive(Debug, Clone, Default)]
struct AutoCalibrator {
    window_started_ms: Option<u64>,
    complete: bool,
    peak_raw: f32,
    mean_raw: f32,
    samples: u32,
}

impl AutoCalibrator {
    fn restart(&mut self) {
        *self = Self::default();
    }

    /// Returns true on the frame the warm-up window closes.
    fn update(&mut self, raw: f32, now_ms: u64, state: &mut LevelState, config: &LevelConfig) -> bool {
        let started = *self.window_started_ms.get_or_insert(now_ms);

        if self.complete {
            self.peak_raw = (self.peak_raw * config.calibration_peak_decay).max(raw);
            self.mean_raw = lerp(self.mean_raw, raw, 0.01);
        } else {
            self.peak_raw = self.peak_raw.max(raw);
            self.samples += 1;
            self.mean_raw += (raw - self.mean_raw) / self.samples as f32;
        }

        let rate = if self.complete {
            config.continuous_rate
        } else {
            config.calibration_rate
        };

        let desired_sensitivity = (config.calibration_target_peak / self.peak_raw.max(CALIBRATION_FLOOR))
            .clamp(config.min_sensitivity, config.calibration_max_sensitivity);
        state.sensitivity = lerp(state.sensitivity, desired_sensitivity, rate)
            .clamp(config.min_sensitivity, config.max_sensitivity);

        if self.peak_raw > CALIBRATION_FLOOR {
            let desired_range = (self.mean_raw / self.peak_raw).clamp(0.3, 0.9);
            state.dynamic_range = lerp(state.dynamic_range, desired_range, rate);
        }

        if !self.complete && now_ms.saturating_sub(started) >= config.calibration_window_ms {
            self.complete = true;
            return true;
        }
        false
    }
}

/// Turns raw microphone amplitude into a calibrated, bounded loudness signal.
pub struct LevelProcessor {
    config: LevelConfig,
    state: LevelState,
    calibrator: Option<AutoCalibrator>,
    frames: u64,
}

impl LevelProcessor {
    pub fn new(config: LevelConfig) -> Self {
        let state = LevelState {
            sensitivity: config
                .initial_sensitivity
                .clamp(config.min_sensitivity, config.max_sensitivity),
            dynamic_range: config.dynamic_range,
            ..LevelState::default()
        };
        let calibrator = config.auto_calibrate.then(AutoCalibrator::default);

        Self {
            config,
            state,
            calibrator,
            frames: 0,
        }
    }

    /// Process one raw amplitude reading and return the calibrated level.
    pub fn process(&mut self, raw_level: f32, now_ms: u64) -> f32 {
        let raw = if raw_level.is_finite() {
            raw_level.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.state.raw_level = raw;
        self.frames += 1;

        if let Some(calibrator) = self.calibrator.as_mut() {
            if calibrator.update(raw, now_ms, &mut self.state, &self.config) {
                // Warm-up maxima were measured at a different sensitivity.
                self.state.max_recorded_level = 0.0;
                info!(
                    "✅ Level calibration complete: sensitivity {:.2}x, dynamic range {:.2}",
                    self.state.sensitivity, self.state.dynamic_range
                );
            }
        }

        let mut level = raw * self.state.sensitivity;

        if level > self.state.max_recorded_level {
            self.state.max_recorded_level = level;
        }

        let full_scale = self.state.max_recorded_level * self.state.dynamic_range;
        if full_scale > 0.0 {
            level = map_range(level, 0.0, full_scale, 0.0, 1.0);
        }
        level = level.clamp(0.0, 1.0);

        if level > self.state.peak_hold {
            self.state.peak_hold = level;
        } else {
            self.state.peak_hold *= self.config.peak_decay;
        }

        self.state.smooth_level = lerp(self.state.smooth_level, level, self.config.smoothing);
        self.state.calibrated_level = level;

        if self.frames % 120 == 0 {
            debug!(
                "level: raw={:.4}, calibrated={:.3}, smooth={:.3}, peak={:.3}, sensitivity={:.2}x, max={:.4}",
                raw,
                level,
                self.state.smooth_level,
                self.state.peak_hold,
                self.state.sensitivity,
                self.state.max_recorded_level
            );
        }

        level
    }

    pub fn state(&self) -> &LevelState {
        &self.state
    }

    pub fn calibrated_level(&self) -> f32 {
        self.state.calibrated_level
    }

    pub fn smooth_level(&self) -> f32 {
        self.state.smooth_level
    }

    pub fn peak_hold(&self) -> f32 {
        self.state.peak_hold
    }

    pub fn sensitivity(&self) -> f32 {
        self.state.sensitivity
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.state.sensitivity = sensitivity.clamp(self.config.min_sensitivity, self.config.max_sensitivity);
    }

    pub fn adjust_sensitivity(&mut self, delta: f32) {
        self.set_sensitivity(self.state.sensitivity + delta);
        info!("Sensitivity set to {:.1}x", self.state.sensitivity);
    }

    /// True while the warm-up window of auto-calibration is still open.
    pub fn is_calibrating(&self) -> bool {
        self.calibrator.as_ref().is_some_and(|c| !c.complete)
    }

    /// Forget the recorded maximum and peak; restarts warm-up when auto-calibrating.
    pub fn reset_calibration(&mut self) {
        self.state.max_recorded_level = 0.0;
        self.state.peak_hold = 0.0;
        self.state.dynamic_range = self.config.dynamic_range;
        if let Some(calibrator) = self.calibrator.as_mut() {
            calibrator.restart();
        }
        info!("Level calibration reset");
    }
}

impl Default for LevelProcessor {
    fn default() -> Self {
        Self::new(LevelConfig::default())
    }
}
