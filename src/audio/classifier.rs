use super::SoundFrame;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Four ordered frequency bands a dominant pitch is sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchRange {
    Low,
    MidLow,
    MidHigh,
    High,
}

impl fmt::Display for PitchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PitchRange::Low => "low",
            PitchRange::MidLow => "mid-low",
            PitchRange::MidHigh => "mid-high",
            PitchRange::High => "high",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundType {
    Snap,
    Clap,
    Whistle,
    Voice,
    Percussion,
    Unknown,
    Manual,
}

impl fmt::Display for SoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SoundType::Snap => "snap",
            SoundType::Clap => "clap",
            SoundType::Whistle => "whistle",
            SoundType::Voice => "voice",
            SoundType::Percussion => "percussion",
            SoundType::Unknown => "unknown",
            SoundType::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Summary of one detected sound event, handed by value to fireworks and music.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundEventDescriptor {
    pub dominant_pitch: f32,
    pub pitch_range: PitchRange,
    pub intensity: f32,
    pub spectral_centroid: f32,
    pub sound_type: SoundType,
}

/// Upper bounds (exclusive) of the low, mid-low and mid-high buckets, in Hz.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchRangeThresholds {
    pub low_max: f32,
    pub mid_low_max: f32,
    pub mid_high_max: f32,
}

impl PitchRangeThresholds {
    /// 100/300/500 Hz split used by the spectral-classification variant.
    pub fn wide() -> Self {
        Self {
            low_max: 100.0,
            mid_low_max: 300.0,
            mid_high_max: 500.0,
        }
    }

    pub fn classify(&self, pitch: f32) -> PitchRange {
        if pitch < self.low_max {
            PitchRange::Low
        } else if pitch < self.mid_low_max {
            PitchRange::MidLow
        } else if pitch < self.mid_high_max {
            PitchRange::MidHigh
        } else {
            PitchRange::High
        }
    }
}

impl Default for PitchRangeThresholds {
    fn default() -> Self {
        Self {
            low_max: 150.0,
            mid_low_max: 300.0,
            mid_high_max: 450.0,
        }
    }
}

/// Empirically tuned cut-offs for the sound-type decision table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundTypeThresholds {
    pub snap_centroid: f32,
    pub snap_pitch_variation: f32,
    pub snap_intensity_range: f32,
    pub clap_centroid: f32,
    pub clap_intensity_range: f32,
    pub whistle_min_pitch: f32,
    pub whistle_max_variation: f32,
    pub whistle_max_intensity_range: f32,
    pub voice_min_pitch: f32,
    pub voice_max_pitch: f32,
    pub voice_min_frames: usize,
}

impl Default for SoundTypeThresholds {
    fn default() -> Self {
        Self {
            snap_centroid: 1500.0,
            snap_pitch_variation: 200.0,
            snap_intensity_range: 0.3,
            clap_centroid: 1000.0,
            clap_intensity_range: 0.4,
            whistle_min_pitch: 800.0,
            whistle_max_variation: 100.0,
            whistle_max_intensity_range: 0.2,
            voice_min_pitch: 100.0,
            voice_max_pitch: 800.0,
            voice_min_frames: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Pitches at or below this are treated as rumble, not tone.
    pub min_valid_pitch: f32,
    pub pitch_ranges: PitchRangeThresholds,
    pub default_centroid: f32,
    pub classify_sound_type: bool,
    pub sound_types: SoundTypeThresholds,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_valid_pitch: 80.0,
            pitch_ranges: PitchRangeThresholds::default(),
            default_centroid: 500.0,
            classify_sound_type: true,
            sound_types: SoundTypeThresholds::default(),
        }
    }
}

/// Derives a [`SoundEventDescriptor`] from the frames buffered around an event.
#[derive(Debug, Clone, Default)]
pub struct EventClassifier {
    config: ClassifierConfig,
}

impl EventClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn pitch_range(&self, pitch: f32) -> PitchRange {
        self.config.pitch_ranges.classify(pitch)
    }

    /// Classify the buffered frames.
    ///
    /// `current_pitch` and `current_level` stand in when the buffer is empty or
    /// holds no usable pitch.
    pub fn classify(&self, frames: &VecDeque<SoundFrame>, current_pitch: f32, current_level: f32) -> SoundEventDescriptor {
        if frames.is_empty() {
            return SoundEventDescriptor {
                dominant_pitch: current_pitch,
                pitch_range: self.pitch_range(current_pitch),
                intensity: current_level,
                spectral_centroid: self.config.default_centroid,
                sound_type: if self.config.classify_sound_type {
                    SoundType::Percussion
                } else {
                    SoundType::Unknown
                },
            };
        }

        let valid_pitches: Vec<f32> = frames
            .iter()
            .map(|f| f.pitch)
            .filter(|&p| p > self.config.min_valid_pitch)
            .collect();

        let max_pitch = valid_pitches.iter().copied().fold(0.0f32, f32::max);
        let avg_pitch = if valid_pitches.is_empty() {
            0.0
        } else {
            valid_pitches.iter().sum::<f32>() / valid_pitches.len() as f32
        };

        let dominant_pitch = if max_pitch > 0.0 {
            max_pitch
        } else if avg_pitch > 0.0 {
            avg_pitch
        } else {
            current_pitch
        };

        let intensity = frames.iter().map(|f| f.level).fold(f32::MIN, f32::max);
        let min_level = frames.iter().map(|f| f.level).fold(f32::MAX, f32::min);

        let spectral_centroid = frames
            .back()
            .and_then(|f| f.spectrum.as_ref())
            .and_then(|s| s.centroid())
            .unwrap_or(self.config.default_centroid);

        let sound_type = if self.config.classify_sound_type {
            self.sound_type(
                spectral_centroid,
                max_pitch,
                max_pitch - avg_pitch,
                intensity - min_level,
                valid_pitches.len(),
            )
        } else {
            SoundType::Unknown
        };

        SoundEventDescriptor {
            dominant_pitch,
            pitch_range: self.pitch_range(dominant_pitch),
            intensity,
            spectral_centroid,
            sound_type,
        }
    }

    fn sound_type(
        &self,
        centroid: f32,
        max_pitch: f32,
        pitch_variation: f32,
        intensity_range: f32,
        voiced_frames: usize,
    ) -> SoundType {
        let t = &self.config.sound_types;

        if centroid > t.snap_centroid
            && pitch_variation > t.snap_pitch_variation
            && intensity_range > t.snap_intensity_range
        {
            SoundType::Snap
        } else if centroid > t.clap_centroid && intensity_range > t.clap_intensity_range {
            SoundType::Clap
        } else if max_pitch > t.whistle_min_pitch
            && pitch_variation < t.whistle_max_variation
            && intensity_range < t.whistle_max_intensity_range
        {
            SoundType::Whistle
        } else if max_pitch > t.voice_min_pitch && max_pitch < t.voice_max_pitch && voiced_frames >= t.voice_min_frames {
            SoundType::Voice
        } else {
            SoundType::Percussion
        }
    }
}
