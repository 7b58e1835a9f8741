use crate::audio::{ClassifierConfig, DetectorConfig, LevelConfig, PitchConfig};
use crate::effects::FireworkConfig;
use crate::music::MusicConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything tunable about a session, one section per pipeline stage.
///
/// Every section defaults field-by-field, so a file only needs the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub frame_rate: f32,
    pub canvas_width: f32,
    pub canvas_height: f32,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
    pub mic_enabled: bool,
    pub level: LevelConfig,
    pub pitch: PitchConfig,
    pub detector: DetectorConfig,
    pub classifier: ClassifierConfig,
    pub fireworks: FireworkConfig,
    pub music: MusicConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            canvas_width: 1400.0,
            canvas_height: 800.0,
            seed: None,
            mic_enabled: true,
            level: LevelConfig::default(),
            pitch: PitchConfig::default(),
            detector: DetectorConfig::default(),
            classifier: ClassifierConfig::default(),
            fireworks: FireworkConfig::default(),
            music: MusicConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::Mode;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "seed": 42, "detector": { "cooldown_ms": 500 }, "music": { "mode": "Minor" } }"#)
                .unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.detector.cooldown_ms, 500);
        assert_eq!(config.detector.buffer_size, 15);
        assert_eq!(config.music.mode, Mode::Minor);
        assert_eq!(config.music.initial_tempo, 120.0);
        assert_eq!(config.frame_rate, 60.0);
    }

    #[test]
    fn test_partial_pitch_ranges_keep_other_bounds() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "classifier": { "pitch_ranges": { "low_max": 120.0 } } }"#).unwrap();
        let ranges = config.classifier.pitch_ranges;
        assert_eq!(ranges.low_max, 120.0);
        assert_eq!(ranges.mid_low_max, 300.0);
        assert_eq!(ranges.mid_high_max, 450.0);
        assert_eq!(config.classifier.min_valid_pitch, 80.0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!("sonic-fireworks-config-{}.json", std::process::id()));
        let mut config = EngineConfig::default();
        config.level.auto_calibrate = true;
        config.classifier.pitch_ranges = crate::audio::PitchRangeThresholds::wide();
        config.fireworks.gravity = 0.2;

        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(loaded.level.auto_calibrate);
        assert_eq!(loaded.classifier.pitch_ranges.mid_high_max, 500.0);
        assert_eq!(loaded.fireworks.gravity, 0.2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = EngineConfig::load("/nonexistent/sonic-fireworks.json").unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config"));
    }
}
