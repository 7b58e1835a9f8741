use super::{midi_to_freq, scale_note, EventHistory, EventRecord, Mode, Note, NoteScheduler, Voice};
use crate::audio::{PitchRange, SoundEventDescriptor, SoundType};
use crate::math::{lerp, map_clamped};
use log::{debug, info};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    pub enabled: bool,
    /// Semitone offset of the tonic from C.
    pub key: i32,
    pub mode: Mode,
    pub initial_tempo: f32,
    pub min_tempo: f32,
    pub max_tempo: f32,
    pub tempo_smoothing: f32,
    pub activity_window_ms: u64,
    /// Event count within the window that maps to full activity.
    pub activity_saturation: f32,
    /// Session seconds until complexity reaches its ceiling.
    pub complexity_ramp_s: f32,
    pub melody_keep_alive_ms: u64,
    pub harmony_keep_alive_ms: u64,
    pub percussion_spacing_ms: u64,
    pub percussion_level: f32,
    pub evolution_interval_ms: u64,
    pub bass_capacity: usize,
    pub melody_capacity: usize,
    pub frequency_threshold: f32,
    pub energy_threshold: f32,
    pub phrase_delay_ms: u64,
    pub phrase_spacing_ms: u64,
    pub phrase_note_s: f32,
    pub mode_shift_probability: f64,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: 0,
            mode: Mode::Major,
            initial_tempo: 120.0,
            min_tempo: 80.0,
            max_tempo: 140.0,
            tempo_smoothing: 0.02,
            activity_window_ms: 5000,
            activity_saturation: 10.0,
            complexity_ramp_s: 120.0,
            melody_keep_alive_ms: 4000,
            harmony_keep_alive_ms: 6000,
            percussion_spacing_ms: 200,
            percussion_level: 0.3,
            evolution_interval_ms: 8000,
            bass_capacity: 8,
            melody_capacity: 12,
            frequency_threshold: 90.0,
            energy_threshold: 0.12,
            phrase_delay_ms: 100,
            phrase_spacing_ms: 150,
            phrase_note_s: 0.3,
            mode_shift_probability: 0.3,
        }
    }
}

pub const FREQUENCY_THRESHOLD_RANGE: (f32, f32) = (20.0, 200.0);
pub const ENERGY_THRESHOLD_RANGE: (f32, f32) = (0.01, 0.5);

const INITIAL_BASS: [i32; 4] = [0, 0, 4, 3];
const INITIAL_MELODY: [i32; 8] = [0, 2, 4, 2, 5, 4, 2, 0];
const INITIAL_HARMONY: [i32; 4] = [0, 3, 4, 0];

/// Pentatonic MIDI notes answering an event in each pitch range.
fn phrase_notes(range: PitchRange) -> &'static [u8; 5] {
    match range {
        PitchRange::Low => &[60, 62, 64, 67, 69],
        PitchRange::MidLow => &[62, 64, 66, 69, 71],
        PitchRange::MidHigh => &[64, 67, 69, 72, 74],
        PitchRange::High => &[67, 69, 71, 74, 76],
    }
}

/// One value per sequencer voice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerVoice<T> {
    pub bass: T,
    pub melody: T,
    pub harmony: T,
    pub percussion: T,
}

/// Snapshot of the sequencer's mutable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MusicState {
    pub enabled: bool,
    pub key: i32,
    pub mode: Mode,
    pub tempo: f32,
    pub last_trigger_ms: PerVoice<u64>,
    pub positions: PerVoice<usize>,
    pub complexity: f32,
    pub activity: f32,
    pub frequency_threshold: f32,
    pub energy_threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Patterns {
    bass: Vec<i32>,
    melody: Vec<i32>,
    harmony: Vec<i32>,
}

impl Default for Patterns {
    fn default() -> Self {
        Self {
            bass: INITIAL_BASS.to_vec(),
            melody: INITIAL_MELODY.to_vec(),
            harmony: INITIAL_HARMONY.to_vec(),
        }
    }
}

/// Per-frame inputs the sequencer reacts to.
#[derive(Debug, Clone, Copy)]
pub struct MusicContext {
    pub now_ms: u64,
    pub smooth_level: f32,
    /// A sound event is currently being analyzed.
    pub analyzing: bool,
}

/// Four-voice generative sequencer steered by sound-event history.
///
/// Each voice keeps its own timer and pattern position. Tempo tracks recent
/// activity, complexity grows with session time and unlocks pattern
/// evolution. Notes are never played directly: they are pushed into a
/// [`NoteScheduler`] that the caller drains.
pub struct ReactiveMusicEngine {
    config: MusicConfig,
    state: MusicState,
    patterns: Patterns,
    history: EventHistory,
    rng: ChaCha8Rng,
    session_start_ms: u64,
    last_evolution_ms: u64,
}

impl ReactiveMusicEngine {
    pub fn new(config: MusicConfig, rng: ChaCha8Rng) -> Self {
        let state = MusicState {
            enabled: config.enabled,
            key: config.key,
            mode: config.mode,
            tempo: config.initial_tempo,
            last_trigger_ms: PerVoice::default(),
            positions: PerVoice::default(),
            complexity: 0.1,
            activity: 0.0,
            frequency_threshold: config.frequency_threshold,
            energy_threshold: config.energy_threshold,
        };

        Self {
            config,
            state,
            patterns: Patterns::default(),
            history: EventHistory::default(),
            rng,
            session_start_ms: 0,
            last_evolution_ms: 0,
        }
    }

    /// Sixteenth-note length in milliseconds at the current tempo.
    pub fn beat_interval_ms(&self) -> f32 {
        60000.0 / self.state.tempo.max(1.0) / 4.0
    }

    pub fn tick(&mut self, ctx: &MusicContext, scheduler: &mut NoteScheduler) {
        let now = ctx.now_ms;

        let recent = self.history.count_since(now, self.config.activity_window_ms);
        self.state.activity = map_clamped(recent as f32, 0.0, self.config.activity_saturation, 0.0, 1.0);

        let elapsed_s = now.saturating_sub(self.session_start_ms) as f32 / 1000.0;
        self.state.complexity = map_clamped(elapsed_s, 0.0, self.config.complexity_ramp_s, 0.1, 1.0);

        let target = lerp(self.config.min_tempo, self.config.max_tempo, self.state.activity);
        self.state.tempo = lerp(self.state.tempo, target, self.config.tempo_smoothing);

        if !self.state.enabled {
            return;
        }

        let beat = self.beat_interval_ms();
        let since = |last: u64| now.saturating_sub(last) as f32;

        if since(self.state.last_trigger_ms.bass) >= 4.0 * beat {
            self.play_bass(now, beat, scheduler);
        }

        let melody_idle = now.saturating_sub(self.state.last_trigger_ms.melody);
        if since(self.state.last_trigger_ms.melody) >= beat * (4.0 - 3.0 * self.state.activity)
            && (self.state.activity > 0.1 || melody_idle >= self.config.melody_keep_alive_ms)
        {
            self.play_melody(now, beat, scheduler);
        }

        let harmony_idle = now.saturating_sub(self.state.last_trigger_ms.harmony);
        if since(self.state.last_trigger_ms.harmony) >= 8.0 * beat
            && (self.state.activity > 0.05 || harmony_idle >= self.config.harmony_keep_alive_ms)
        {
            self.play_harmony(now, beat, scheduler);
        }

        if ctx.analyzing
            && ctx.smooth_level > self.config.percussion_level
            && now.saturating_sub(self.state.last_trigger_ms.percussion) >= self.config.percussion_spacing_ms
        {
            self.play_percussion(now, ctx.smooth_level, scheduler);
        }

        if now.saturating_sub(self.last_evolution_ms) >= self.config.evolution_interval_ms {
            self.last_evolution_ms = now;
            if self.state.complexity >= 0.3 {
                self.evolve();
            }
        }
    }

    fn play_bass(&mut self, now: u64, beat: f32, scheduler: &mut NoteScheduler) {
        let degree = step(&self.patterns.bass, &mut self.state.positions.bass);
        let frequency = scale_note(self.state.mode, self.state.key, degree, 2);
        let duration = 4.0 * beat * 0.9 / 1000.0;
        scheduler.schedule(now, Voice::Bass, Note::new(frequency, 0.3, duration));
        self.state.last_trigger_ms.bass = now;
    }

    fn play_melody(&mut self, now: u64, beat: f32, scheduler: &mut NoteScheduler) {
        let degree = step(&self.patterns.melody, &mut self.state.positions.melody);
        let octave = match self.history.dominant_range() {
            Some(PitchRange::Low) => 3,
            Some(PitchRange::High) => 5,
            _ => 4,
        };
        let frequency = scale_note(self.state.mode, self.state.key, degree, octave);
        let velocity = 0.15 + 0.2 * self.state.activity;
        let duration = (2.0 * beat / 1000.0).max(0.1);
        scheduler.schedule(now, Voice::Melody, Note::new(frequency, velocity, duration));
        self.state.last_trigger_ms.melody = now;
    }

    fn play_harmony(&mut self, now: u64, beat: f32, scheduler: &mut NoteScheduler) {
        let root = step(&self.patterns.harmony, &mut self.state.positions.harmony);
        let duration = 8.0 * beat / 1000.0;
        for offset in [0, 2, 4] {
            let frequency = scale_note(self.state.mode, self.state.key, root + offset, 4);
            scheduler.schedule(now, Voice::Harmony, Note::new(frequency, 0.08, duration));
        }
        self.state.last_trigger_ms.harmony = now;
    }

    fn play_percussion(&mut self, now: u64, level: f32, scheduler: &mut NoteScheduler) {
        let velocity = map_clamped(level, self.config.percussion_level, 1.0, 0.2, 0.5);
        scheduler.schedule(now, Voice::Percussion, Note::new(60.0, velocity, 0.08));
        self.state.positions.percussion += 1;
        self.state.last_trigger_ms.percussion = now;
    }

    /// Remember an event and answer it with a short phrase when it clears the gates.
    pub fn record_event(&mut self, descriptor: &SoundEventDescriptor, now_ms: u64, scheduler: &mut NoteScheduler) {
        self.history.push(EventRecord::from_descriptor(descriptor, now_ms));

        if !self.state.enabled || !self.passes_gates(descriptor) {
            return;
        }

        let notes = phrase_notes(descriptor.pitch_range);
        let length = self.rng.gen_range(3..=4);
        let start = self.rng.gen_range(0..=notes.len() - length);
        let velocity = map_clamped(descriptor.intensity, 0.0, 1.0, 0.1, 0.5);

        for (i, &midi) in notes[start..start + length].iter().enumerate() {
            let fire_at = now_ms + self.config.phrase_delay_ms + i as u64 * self.config.phrase_spacing_ms;
            scheduler.schedule(
                fire_at,
                Voice::Phrase,
                Note::new(midi_to_freq(midi), velocity, self.config.phrase_note_s),
            );
        }
        debug!("Phrase of {} notes for {} event", length, descriptor.pitch_range);

        if self.rng.gen_bool(self.config.mode_shift_probability.clamp(0.0, 1.0)) {
            let shifted = match descriptor.pitch_range {
                PitchRange::High => self.state.mode.brighter(),
                PitchRange::Low => self.state.mode.darker(),
                _ => self.state.mode,
            };
            if shifted != self.state.mode {
                info!("Mode shift: {} -> {}", self.state.mode, shifted);
                self.state.mode = shifted;
            }
        }
    }

    fn passes_gates(&self, descriptor: &SoundEventDescriptor) -> bool {
        descriptor.sound_type == SoundType::Manual
            || (descriptor.dominant_pitch >= self.state.frequency_threshold
                && descriptor.intensity >= self.state.energy_threshold)
    }

    fn evolve(&mut self) {
        let mut changes = 0;

        if self.rng.gen_bool(0.3) {
            let slot = self.rng.gen_range(0..self.patterns.bass.len());
            self.patterns.bass[slot] = self.rng.gen_range(0..7);
            changes += 1;
        }
        if self.rng.gen_bool(0.4) {
            let slot = self.rng.gen_range(0..self.patterns.melody.len());
            self.patterns.melody[slot] = self.rng.gen_range(-3..10);
            changes += 1;
        }

        if self.state.complexity > 0.7 {
            if self.rng.gen_bool(0.2) && self.patterns.bass.len() < self.config.bass_capacity {
                let degree = self.rng.gen_range(0..7);
                self.patterns.bass.push(degree);
                changes += 1;
            }
            if self.rng.gen_bool(0.2) && self.patterns.melody.len() < self.config.melody_capacity {
                let degree = self.rng.gen_range(-3..10);
                self.patterns.melody.push(degree);
                changes += 1;
            }
        }

        if changes > 0 {
            info!(
                "🎼 Patterns evolved ({} changes, complexity {:.2}): bass {:?}, melody {:?}",
                changes, self.state.complexity, self.patterns.bass, self.patterns.melody
            );
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.state.enabled != enabled {
            info!("Music {}", if enabled { "enabled" } else { "disabled" });
        }
        self.state.enabled = enabled;
    }

    pub fn toggle(&mut self) {
        self.set_enabled(!self.state.enabled);
    }

    pub fn reset_patterns(&mut self) {
        self.patterns = Patterns::default();
        self.state.positions = PerVoice::default();
        self.state.mode = self.config.mode;
        info!("Music patterns reset");
    }

    pub fn adjust_frequency_threshold(&mut self, delta: f32) {
        let (min, max) = FREQUENCY_THRESHOLD_RANGE;
        self.state.frequency_threshold = (self.state.frequency_threshold + delta).clamp(min, max);
    }

    pub fn adjust_energy_threshold(&mut self, delta: f32) {
        let (min, max) = ENERGY_THRESHOLD_RANGE;
        self.state.energy_threshold = (self.state.energy_threshold + delta).clamp(min, max);
    }

    pub fn state(&self) -> &MusicState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn tempo(&self) -> f32 {
        self.state.tempo
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn bass_pattern(&self) -> &[i32] {
        &self.patterns.bass
    }

    pub fn melody_pattern(&self) -> &[i32] {
        &self.patterns.melody
    }

    pub fn harmony_progression(&self) -> &[i32] {
        &self.patterns.harmony
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }
}

/// Current degree at `position`, then advance with wrap-around.
fn step(pattern: &[i32], position: &mut usize) -> i32 {
    if pattern.is_empty() {
        return 0;
    }
    let degree = pattern[*position % pattern.len()];
    *position = (*position + 1) % pattern.len();
    degree
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn engine(config: MusicConfig) -> ReactiveMusicEngine {
        ReactiveMusicEngine::new(config, ChaCha8Rng::seed_from_u64(7))
    }

    fn quiet(now_ms: u64) -> MusicContext {
        MusicContext {
            now_ms,
            smooth_level: 0.0,
            analyzing: false,
        }
    }

    fn descriptor(pitch: f32, range: PitchRange, intensity: f32, sound_type: SoundType) -> SoundEventDescriptor {
        SoundEventDescriptor {
            dominant_pitch: pitch,
            pitch_range: range,
            intensity,
            spectral_centroid: 500.0,
            sound_type,
        }
    }

    fn frame_ms(frame: u64) -> u64 {
        (frame as f64 * 1000.0 / 60.0).round() as u64
    }

    #[test]
    fn test_tempo_approaches_constant_target() {
        let mut music = engine(MusicConfig::default());
        let mut scheduler = NoteScheduler::new();
        let target = 80.0;
        let mut distance = (music.tempo() - target).abs();
        for frame in 1..500 {
            music.tick(&quiet(frame_ms(frame)), &mut scheduler);
            let next = (music.tempo() - target).abs();
            assert!(next < distance);
            assert!(music.tempo() >= target);
            distance = next;
        }
    }

    #[test]
    fn test_bass_fires_every_four_beats() {
        let config = MusicConfig {
            initial_tempo: 80.0,
            ..MusicConfig::default()
        };
        let mut music = engine(config);
        let mut scheduler = NoteScheduler::new();
        let mut bass_times = Vec::new();
        for frame in 1..=300 {
            let now = frame_ms(frame);
            music.tick(&quiet(now), &mut scheduler);
            bass_times.extend(
                scheduler
                    .drain_due(now)
                    .into_iter()
                    .filter(|n| n.voice == Voice::Bass)
                    .map(|n| n.fire_at_ms),
            );
        }

        // 80 bpm: 16th = 187.5ms, bass every 750ms.
        assert!(bass_times.len() >= 5);
        for pair in bass_times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!((750..=767).contains(&gap), "gap {}", gap);
        }
    }

    #[test]
    fn test_percussion_needs_analysis_and_level() {
        let mut music = engine(MusicConfig::default());
        let mut scheduler = NoteScheduler::new();
        let mut hits = Vec::new();

        for frame in 1..=120u64 {
            let now = frame_ms(frame);
            let ctx = MusicContext {
                now_ms: now,
                smooth_level: if frame <= 40 { 0.9 } else if frame <= 80 { 0.2 } else { 0.6 },
                analyzing: frame > 40,
            };
            music.tick(&ctx, &mut scheduler);
            hits.extend(
                scheduler
                    .drain_due(now)
                    .into_iter()
                    .filter(|n| n.voice == Voice::Percussion)
                    .map(|n| n.fire_at_ms),
            );
        }

        assert!(!hits.is_empty());
        assert!(hits.iter().all(|&t| t > frame_ms(80)));
        for pair in hits.windows(2) {
            assert!(pair[1] - pair[0] >= 200);
        }
    }

    /// Tick at 60 fps for `frames`, calling `on_frame` first, and collect fire times per voice.
    fn run_voices(
        music: &mut ReactiveMusicEngine,
        frames: u64,
        mut on_frame: impl FnMut(&mut ReactiveMusicEngine, u64, &mut NoteScheduler),
    ) -> Vec<ScheduledNoteTime> {
        let mut scheduler = NoteScheduler::new();
        let mut fired = Vec::new();
        for frame in 1..=frames {
            let now = frame_ms(frame);
            on_frame(music, frame, &mut scheduler);
            music.tick(&quiet(now), &mut scheduler);
            fired.extend(
                scheduler
                    .drain_due(now)
                    .into_iter()
                    .map(|n| (n.voice, n.fire_at_ms, n.note.frequency_hz)),
            );
        }
        fired
    }

    type ScheduledNoteTime = (Voice, u64, f32);

    fn times(fired: &[ScheduledNoteTime], voice: Voice) -> Vec<u64> {
        fired.iter().filter(|n| n.0 == voice).map(|n| n.1).collect()
    }

    #[test]
    fn test_quiet_session_uses_keep_alive_timers() {
        let mut music = engine(MusicConfig::default());
        let fired = run_voices(&mut music, 600, |_, _, _| {});

        assert_eq!(times(&fired, Voice::Melody), vec![4000, 8000]);
        assert_eq!(times(&fired, Voice::Harmony), vec![6000, 6000, 6000]);

        // First progression step is the tonic triad.
        let triad: Vec<f32> = fired.iter().filter(|n| n.0 == Voice::Harmony).map(|n| n.2).collect();
        for (frequency, degree) in triad.iter().zip([0, 2, 4]) {
            assert!((frequency - scale_note(Mode::Major, 0, degree, 4)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_activity_saturates_after_ten_recent_events() {
        let mut music = engine(MusicConfig::default());
        let mut scheduler = NoteScheduler::new();
        for i in 0..10u64 {
            music.record_event(&descriptor(300.0, PitchRange::MidLow, 0.5, SoundType::Clap), i * 400, &mut scheduler);
        }
        music.tick(&quiet(4000), &mut scheduler);
        assert_eq!(music.state().activity, 1.0);

        // Events age out of the five second window.
        music.tick(&quiet(20_000), &mut scheduler);
        assert_eq!(music.state().activity, 0.0);
    }

    #[test]
    fn test_busy_session_speeds_up_melody() {
        let mut music = engine(MusicConfig::default());
        let fired = run_voices(&mut music, 600, |music, frame, scheduler| {
            if frame % 20 == 0 {
                let event = descriptor(300.0, PitchRange::MidLow, 0.5, SoundType::Clap);
                music.record_event(&event, frame_ms(frame), scheduler);
            }
        });

        let melody = times(&fired, Voice::Melody);
        assert!(melody.len() >= 20, "melody fired {} times", melody.len());
        assert!(melody[0] < 4000);
        let late: Vec<u64> = melody.into_iter().filter(|&t| t >= 5000).collect();
        for pair in late.windows(2) {
            assert!(pair[1] - pair[0] < 250, "gap {}", pair[1] - pair[0]);
        }
        assert!(!times(&fired, Voice::Harmony).is_empty());
        assert!(times(&fired, Voice::Harmony)[0] < 6000);
        assert_eq!(music.state().activity, 1.0);
        assert!(music.tempo() > 120.0);
    }

    #[test]
    fn test_pitch_extremes_shift_the_mode() {
        let mut music = engine(MusicConfig::default());
        let mut scheduler = NoteScheduler::new();

        for i in 0..40u64 {
            music.record_event(&descriptor(300.0, PitchRange::MidLow, 0.8, SoundType::Voice), i * 100, &mut scheduler);
        }
        assert_eq!(music.mode(), Mode::Major);

        for i in 0..40u64 {
            music.record_event(&descriptor(500.0, PitchRange::High, 0.8, SoundType::Whistle), i * 100, &mut scheduler);
        }
        assert_eq!(music.mode(), Mode::Mixolydian);

        for i in 0..40u64 {
            music.record_event(&descriptor(120.0, PitchRange::Low, 0.8, SoundType::Voice), i * 100, &mut scheduler);
        }
        assert_eq!(music.mode(), Mode::Minor);
    }

    #[test]
    fn test_phrase_is_scheduled_after_event() {
        let mut music = engine(MusicConfig::default());
        let mut scheduler = NoteScheduler::new();
        music.record_event(&descriptor(500.0, PitchRange::High, 0.8, SoundType::Whistle), 1000, &mut scheduler);

        let phrase = scheduler.drain_due(u64::MAX);
        assert!(phrase.len() == 3 || phrase.len() == 4);
        let allowed: Vec<f32> = phrase_notes(PitchRange::High).iter().map(|&m| midi_to_freq(m)).collect();
        for (i, scheduled) in phrase.iter().enumerate() {
            assert_eq!(scheduled.voice, Voice::Phrase);
            assert_eq!(scheduled.fire_at_ms, 1100 + 150 * i as u64);
            assert!(allowed.contains(&scheduled.note.frequency_hz));
            assert!((scheduled.note.velocity - 0.42).abs() < 1e-5);
            assert_eq!(scheduled.note.duration_s, 0.3);
        }
        for pair in phrase.windows(2) {
            assert!(pair[1].note.frequency_hz > pair[0].note.frequency_hz);
        }
    }

    #[test]
    fn test_phrase_gates() {
        let mut music = engine(MusicConfig::default());
        let mut scheduler = NoteScheduler::new();

        music.record_event(&descriptor(50.0, PitchRange::Low, 0.8, SoundType::Clap), 0, &mut scheduler);
        music.record_event(&descriptor(300.0, PitchRange::MidLow, 0.05, SoundType::Clap), 0, &mut scheduler);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(music.history().recent().len(), 2);

        music.record_event(&descriptor(50.0, PitchRange::Low, 0.05, SoundType::Manual), 0, &mut scheduler);
        assert!(scheduler.pending() >= 3);
    }

    #[test]
    fn test_disabled_engine_schedules_nothing() {
        let mut music = engine(MusicConfig::default());
        let mut scheduler = NoteScheduler::new();
        music.set_enabled(false);
        for frame in 1..600 {
            music.tick(&quiet(frame_ms(frame)), &mut scheduler);
        }
        music.record_event(&descriptor(400.0, PitchRange::MidHigh, 0.9, SoundType::Voice), 10_000, &mut scheduler);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_evolution_respects_capacities() {
        let mut music = engine(MusicConfig::default());
        let mut scheduler = NoteScheduler::new();
        let mut now = 0;
        while now <= 1_200_000 {
            music.tick(&quiet(now), &mut scheduler);
            scheduler.drain_due(now);
            now += 500;
        }

        assert_eq!(music.state().complexity, 1.0);
        assert!(music.bass_pattern().len() <= 8);
        assert!(music.melody_pattern().len() <= 12);
        assert!(music.bass_pattern().len() > INITIAL_BASS.len());
        assert!(music.melody_pattern().len() > INITIAL_MELODY.len());
        assert!(music.bass_pattern().iter().all(|d| (0..7).contains(d)));
        assert!(music.melody_pattern().iter().all(|d| (-3..10).contains(d)));
    }

    #[test]
    fn test_no_evolution_before_complexity_threshold() {
        let mut music = engine(MusicConfig::default());
        let mut scheduler = NoteScheduler::new();
        // Complexity reaches 0.3 after ~26.7s.
        for now in (0..=26_000).step_by(100) {
            music.tick(&quiet(now), &mut scheduler);
        }
        assert_eq!(music.bass_pattern(), &INITIAL_BASS);
        assert_eq!(music.melody_pattern(), &INITIAL_MELODY);
    }

    #[test]
    fn test_reset_and_threshold_controls() {
        let mut music = engine(MusicConfig::default());
        let mut scheduler = NoteScheduler::new();
        for frame in 1..200 {
            music.tick(&quiet(frame_ms(frame)), &mut scheduler);
        }
        assert!(music.state().last_trigger_ms.bass > 0);
        music.reset_patterns();
        assert_eq!(music.state().positions, PerVoice::default());
        assert_eq!(music.mode(), Mode::Major);

        for _ in 0..30 {
            music.adjust_frequency_threshold(10.0);
            music.adjust_energy_threshold(-0.02);
        }
        assert_eq!(music.state().frequency_threshold, 200.0);
        assert_eq!(music.state().energy_threshold, 0.01);
    }
}
