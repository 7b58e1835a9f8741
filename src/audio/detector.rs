use super::{ClassifierConfig, EventClassifier, SoundEventDescriptor, SoundFrame};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum single-frame rise in level that counts as an onset.
    pub peak_sensitivity: f32,
    pub peak_threshold: f32,
    /// Fraction of `peak_threshold` below which an event ends early.
    pub release_ratio: f32,
    pub cooldown_ms: u64,
    pub analysis_duration_ms: u64,
    pub buffer_size: usize,
    /// Retain a copy of each frame's spectrum for classification.
    pub keep_spectra: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            peak_sensitivity: 0.12,
            peak_threshold: 0.25,
            release_ratio: 0.5,
            cooldown_ms: 300,
            analysis_duration_ms: 200,
            buffer_size: 15,
            keep_spectra: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Analyzing { started_at_ms: u64 },
}

/// Turns the continuous level signal into discrete, debounced sound events.
///
/// Every frame lands in a fixed-size ring buffer whatever the state, so the
/// classifier sees context from before the onset. An event starts on a sharp
/// single-frame rise and closes after a fixed analysis window or as soon as
/// the level falls away, whichever comes first.
pub struct SoundEventDetector {
    config: DetectorConfig,
    classifier: EventClassifier,
    buffer: VecDeque<SoundFrame>,
    state: DetectorState,
    previous_level: f32,
    last_event_ms: Option<u64>,
    events_emitted: u64,
}

impl SoundEventDetector {
    pub fn new(config: DetectorConfig, classifier_config: ClassifierConfig) -> Self {
        let capacity = config.buffer_size.max(1);
        Self {
            config,
            classifier: EventClassifier::new(classifier_config),
            buffer: VecDeque::with_capacity(capacity),
            state: DetectorState::Idle,
            previous_level: 0.0,
            last_event_ms: None,
            events_emitted: 0,
        }
    }

    /// Feed one frame; returns a descriptor on the frame an event closes.
    pub fn process(&mut self, frame: SoundFrame) -> Option<SoundEventDescriptor> {
        let now = frame.timestamp_ms;
        let level = frame.level;
        let pitch = frame.pitch;

        self.push_frame(frame);

        let level_change = level - self.previous_level;
        let cooled_down = self
            .last_event_ms
            .map_or(true, |last| now.saturating_sub(last) > self.config.cooldown_ms);

        if level_change > self.config.peak_sensitivity
            && level > self.config.peak_threshold
            && !self.is_analyzing()
            && cooled_down
        {
            self.state = DetectorState::Analyzing { started_at_ms: now };
            debug!("Sound event onset at {}ms (level {:.3}, rise {:.3})", now, level, level_change);
        }

        let mut descriptor = None;
        if let DetectorState::Analyzing { started_at_ms } = self.state {
            let elapsed = now.saturating_sub(started_at_ms);
            let released = level < self.config.peak_threshold * self.config.release_ratio;

            if elapsed >= self.config.analysis_duration_ms || released {
                let event = self.classifier.classify(&self.buffer, pitch, level);
                info!(
                    "🎆 Sound event: {} {:.1}Hz ({}), intensity {:.2}, centroid {:.0}Hz after {}ms",
                    event.sound_type,
                    event.dominant_pitch,
                    event.pitch_range,
                    event.intensity,
                    event.spectral_centroid,
                    elapsed
                );
                self.state = DetectorState::Idle;
                self.last_event_ms = Some(now);
                self.events_emitted += 1;
                descriptor = Some(event);
            }
        }

        self.previous_level = level;
        descriptor
    }

    fn push_frame(&mut self, mut frame: SoundFrame) {
        if !self.config.keep_spectra {
            frame.spectrum = None;
        }
        self.buffer.push_back(frame);
        while self.buffer.len() > self.config.buffer_size.max(1) {
            self.buffer.pop_front();
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self.state, DetectorState::Analyzing { .. })
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.config.buffer_size
    }

    pub fn frames(&self) -> &VecDeque<SoundFrame> {
        &self.buffer
    }

    pub fn classifier(&self) -> &EventClassifier {
        &self.classifier
    }

    pub fn last_event_ms(&self) -> Option<u64> {
        self.last_event_ms
    }

    pub fn events_emitted(&self) -> u64 {
        self.events_emitted
    }
}

impl Default for SoundEventDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default(), ClassifierConfig::default())
    }
}
