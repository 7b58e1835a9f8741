use crate::audio::{
    LevelProcessor, PitchSource, SoundEventDescriptor, SoundEventDetector, SoundFrame, SoundType, Spectrum,
};
use crate::clock::FrameClock;
use crate::config::EngineConfig;
use crate::effects::FireworkEngine;
use crate::music::{Mode, MusicContext, NoteScheduler, ReactiveMusicEngine, ScheduledNote, TonePlayer};
use glam::Vec2;
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

pub const SENSITIVITY_STEP: f32 = 0.5;
pub const FREQUENCY_THRESHOLD_STEP: f32 = 10.0;
pub const ENERGY_THRESHOLD_STEP: f32 = 0.02;

/// Frames between periodic telemetry dumps (about two seconds at 60 fps).
const TELEMETRY_INTERVAL: u64 = 120;

/// What happened during one frame.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub now_ms: u64,
    /// Descriptor of a sound event that closed this frame.
    pub event: Option<SoundEventDescriptor>,
    /// Where the event's firework launched from.
    pub launch: Option<Vec2>,
    /// Notes handed to the tone player this frame.
    pub notes: Vec<ScheduledNote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Telemetry {
    pub now_ms: u64,
    pub level: f32,
    pub smooth_level: f32,
    pub peak_hold: f32,
    pub pitch: f32,
    pub pitch_source: &'static str,
    pub sensitivity: f32,
    pub calibrating: bool,
    pub analyzing: bool,
    /// Events closed by the detector; manual triggers are not counted.
    pub sound_events: u64,
    pub buffered_frames: usize,
    pub buffer_capacity: usize,
    pub fireworks: usize,
    pub particles: usize,
    pub tempo: f32,
    pub mode: Mode,
    pub activity: f32,
    pub complexity: f32,
    pub music_enabled: bool,
    pub mic_enabled: bool,
    pub pending_notes: usize,
}

/// Owns every pipeline stage and runs them in order once per frame.
///
/// The caller supplies the raw amplitude and spectrum for each frame; the
/// engine never touches devices or the wall clock itself, so a recorded
/// session fed through an engine with the same seed replays exactly.
pub struct VisualizerEngine {
    canvas: Vec2,
    clock: FrameClock,
    level: LevelProcessor,
    pitch: PitchSource,
    detector: SoundEventDetector,
    fireworks: FireworkEngine,
    music: ReactiveMusicEngine,
    scheduler: NoteScheduler,
    player: Box<dyn TonePlayer>,
    rng: ChaCha8Rng,
    mic_enabled: bool,
    events_detected: u64,
}

impl VisualizerEngine {
    /// Engine with FFT pitch estimation.
    pub fn new(config: EngineConfig, player: Box<dyn TonePlayer>) -> Self {
        let pitch = PitchSource::fft(config.pitch.clone());
        Self::with_pitch_source(config, pitch, player)
    }

    pub fn with_pitch_source(config: EngineConfig, pitch: PitchSource, player: Box<dyn TonePlayer>) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        info!(
            "Engine starting: {} fps, canvas {}x{}, seed {}, pitch source {}, tone player {}",
            config.frame_rate,
            config.canvas_width,
            config.canvas_height,
            seed,
            pitch.source_type(),
            player.player_type()
        );

        Self {
            canvas: Vec2::new(config.canvas_width, config.canvas_height),
            clock: FrameClock::new(config.frame_rate),
            level: LevelProcessor::new(config.level),
            pitch,
            detector: SoundEventDetector::new(config.detector, config.classifier),
            fireworks: FireworkEngine::new(config.fireworks, ChaCha8Rng::seed_from_u64(seed)),
            music: ReactiveMusicEngine::new(config.music, ChaCha8Rng::seed_from_u64(seed.wrapping_add(1))),
            scheduler: NoteScheduler::new(),
            player,
            rng: ChaCha8Rng::seed_from_u64(seed.wrapping_add(2)),
            mic_enabled: config.mic_enabled,
            events_detected: 0,
        }
    }

    /// Run one frame of the pipeline.
    pub fn tick(&mut self, raw_level: f32, spectrum: Option<&Spectrum>) -> TickOutcome {
        let now = self.clock.advance();

        let (raw_level, spectrum) = if self.mic_enabled {
            (raw_level, spectrum)
        } else {
            (0.0, None)
        };

        let level = self.level.process(raw_level, now);
        let pitch = self.pitch.update(spectrum);

        let mut frame = SoundFrame::new(level, pitch, now);
        if let Some(spectrum) = spectrum {
            frame = frame.with_spectrum(spectrum.clone());
        }

        let mut outcome = TickOutcome {
            now_ms: now,
            ..TickOutcome::default()
        };

        if let Some(event) = self.detector.process(frame) {
            let origin = self.random_launch_point();
            self.dispatch_event(origin, &event, now);
            outcome.launch = Some(origin);
            outcome.event = Some(event);
        }

        let ctx = MusicContext {
            now_ms: now,
            smooth_level: self.level.smooth_level(),
            analyzing: self.detector.is_analyzing(),
        };
        self.music.tick(&ctx, &mut self.scheduler);
        outcome.notes = self.scheduler.play_due(now, self.player.as_mut());

        self.fireworks.update();

        if self.clock.tick() % TELEMETRY_INTERVAL == 0 {
            let t = self.telemetry();
            debug!(
                "t={}ms level {:.3} (peak {:.3}), pitch {:.1}Hz, sens {:.2}, {} fireworks / {} particles, {:.1} bpm {}, activity {:.2}, complexity {:.2}",
                t.now_ms,
                t.smooth_level,
                t.peak_hold,
                t.pitch,
                t.sensitivity,
                t.fireworks,
                t.particles,
                t.tempo,
                t.mode,
                t.activity,
                t.complexity
            );
        }

        outcome
    }

    fn random_launch_point(&mut self) -> Vec2 {
        let x = self.rng.gen_range(0.2 * self.canvas.x..=0.8 * self.canvas.x);
        let y = self.rng.gen_range(0.3 * self.canvas.y..=0.7 * self.canvas.y);
        Vec2::new(x, y)
    }

    fn dispatch_event(&mut self, origin: Vec2, event: &SoundEventDescriptor, now_ms: u64) {
        self.events_detected += 1;
        self.fireworks.trigger(origin, event.clone());
        self.music.record_event(event, now_ms, &mut self.scheduler);
    }

    /// Launch a firework at `position` as if a sound had been detected.
    ///
    /// Pitch comes from `pitch_hint`, then the live estimate, then a random
    /// value in 200-800 Hz. Intensity is the current smoothed level.
    pub fn manual_trigger(&mut self, position: Vec2, pitch_hint: Option<f32>) -> SoundEventDescriptor {
        let live = self.pitch.pitch();
        let pitch = match pitch_hint.filter(|&p| p > 0.0) {
            Some(hint) => hint,
            None if live > 0.0 => live,
            None => self.rng.gen_range(200.0..800.0),
        };

        let classifier = self.detector.classifier();
        let descriptor = SoundEventDescriptor {
            dominant_pitch: pitch,
            pitch_range: classifier.pitch_range(pitch),
            intensity: self.level.smooth_level(),
            spectral_centroid: classifier.config().default_centroid,
            sound_type: SoundType::Manual,
        };
        info!("Manual trigger at ({:.0}, {:.0}): {:.1}Hz", position.x, position.y, pitch);

        let now = self.clock.now_ms();
        self.dispatch_event(position, &descriptor, now);
        descriptor
    }

    pub fn increase_sensitivity(&mut self) {
        self.level.adjust_sensitivity(SENSITIVITY_STEP);
    }

    pub fn decrease_sensitivity(&mut self) {
        self.level.adjust_sensitivity(-SENSITIVITY_STEP);
    }

    pub fn set_music_enabled(&mut self, enabled: bool) {
        self.music.set_enabled(enabled);
    }

    pub fn toggle_music(&mut self) {
        self.music.toggle();
    }

    pub fn set_mic_enabled(&mut self, enabled: bool) {
        if self.mic_enabled != enabled {
            info!("Microphone input {}", if enabled { "enabled" } else { "disabled" });
        }
        self.mic_enabled = enabled;
    }

    pub fn toggle_mic(&mut self) {
        self.set_mic_enabled(!self.mic_enabled);
    }

    pub fn reset_calibration(&mut self) {
        self.level.reset_calibration();
    }

    pub fn reset_music_patterns(&mut self) {
        self.music.reset_patterns();
    }

    pub fn raise_frequency_threshold(&mut self) {
        self.music.adjust_frequency_threshold(FREQUENCY_THRESHOLD_STEP);
    }

    pub fn lower_frequency_threshold(&mut self) {
        self.music.adjust_frequency_threshold(-FREQUENCY_THRESHOLD_STEP);
    }

    pub fn raise_energy_threshold(&mut self) {
        self.music.adjust_energy_threshold(ENERGY_THRESHOLD_STEP);
    }

    pub fn lower_energy_threshold(&mut self) {
        self.music.adjust_energy_threshold(-ENERGY_THRESHOLD_STEP);
    }

    pub fn telemetry(&self) -> Telemetry {
        let music = self.music.state();
        Telemetry {
            now_ms: self.clock.now_ms(),
            level: self.level.calibrated_level(),
            smooth_level: self.level.smooth_level(),
            peak_hold: self.level.peak_hold(),
            pitch: self.pitch.pitch(),
            pitch_source: self.pitch.source_type(),
            sensitivity: self.level.sensitivity(),
            calibrating: self.level.is_calibrating(),
            analyzing: self.detector.is_analyzing(),
            sound_events: self.detector.events_emitted(),
            buffered_frames: self.detector.buffered(),
            buffer_capacity: self.detector.capacity(),
            fireworks: self.fireworks.fireworks().len(),
            particles: self.fireworks.particles().len(),
            tempo: music.tempo,
            mode: music.mode,
            activity: music.activity,
            complexity: music.complexity,
            music_enabled: music.enabled,
            mic_enabled: self.mic_enabled,
            pending_notes: self.scheduler.pending(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn events_detected(&self) -> u64 {
        self.events_detected
    }

    pub fn level(&self) -> &LevelProcessor {
        &self.level
    }

    pub fn pitch_source(&self) -> &PitchSource {
        &self.pitch
    }

    pub fn detector(&self) -> &SoundEventDetector {
        &self.detector
    }

    pub fn fireworks(&self) -> &FireworkEngine {
        &self.fireworks
    }

    pub fn music(&self) -> &ReactiveMusicEngine {
        &self.music
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PitchRange;
    use crate::music::{NoteRecorder, SilentPlayer};

    fn seeded() -> EngineConfig {
        EngineConfig {
            seed: Some(11),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_clock_advances_per_tick() {
        let mut engine = VisualizerEngine::new(seeded(), Box::new(SilentPlayer));
        assert_eq!(engine.tick(0.0, None).now_ms, 17);
        assert_eq!(engine.tick(0.0, None).now_ms, 33);
        assert_eq!(engine.now_ms(), 33);
    }

    #[test]
    fn test_manual_trigger_uses_hint_then_random_pitch() {
        let recorder = NoteRecorder::new();
        let mut engine = VisualizerEngine::new(seeded(), Box::new(recorder.clone()));

        let hinted = engine.manual_trigger(Vec2::new(700.0, 400.0), Some(520.0));
        assert_eq!(hinted.sound_type, SoundType::Manual);
        assert_eq!(hinted.dominant_pitch, 520.0);
        assert_eq!(hinted.pitch_range, PitchRange::High);
        assert_eq!(engine.fireworks().fireworks().len(), 1);

        let random = engine.manual_trigger(Vec2::new(100.0, 100.0), None);
        assert!((200.0..800.0).contains(&random.dominant_pitch));
        assert_eq!(engine.events_detected(), 2);
        assert_eq!(engine.telemetry().sound_events, 0);

        // Manual events bypass the phrase gates even at zero intensity.
        for _ in 0..40 {
            engine.tick(0.0, None);
        }
        assert!(recorder.len() >= 6);
    }

    #[test]
    fn test_mic_off_silences_input() {
        let mut engine = VisualizerEngine::new(seeded(), Box::new(SilentPlayer));
        engine.set_mic_enabled(false);
        for _ in 0..30 {
            let outcome = engine.tick(if engine.now_ms() > 200 { 0.5 } else { 0.0 }, None);
            assert!(outcome.event.is_none());
        }
        assert_eq!(engine.telemetry().smooth_level, 0.0);
        assert_eq!(engine.telemetry().level, 0.0);
        assert!(!engine.telemetry().mic_enabled);
    }

    #[test]
    fn test_controls() {
        let mut engine = VisualizerEngine::new(seeded(), Box::new(SilentPlayer));
        assert_eq!(engine.telemetry().sensitivity, 3.0);
        engine.increase_sensitivity();
        assert_eq!(engine.telemetry().sensitivity, 3.5);
        for _ in 0..30 {
            engine.decrease_sensitivity();
        }
        assert_eq!(engine.telemetry().sensitivity, 0.5);

        engine.toggle_music();
        assert!(!engine.telemetry().music_enabled);
        engine.raise_frequency_threshold();
        assert_eq!(engine.music().state().frequency_threshold, 100.0);
        engine.lower_energy_threshold();
        assert!((engine.music().state().energy_threshold - 0.10).abs() < 1e-6);
    }
}
