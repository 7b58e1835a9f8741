use super::Note;
use anyhow::{Context, Result};
use rodio::source::{SineWave, Source};
use rodio::{OutputStream, OutputStreamHandle};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Fire-and-forget tone output.
///
/// Implementations may fail; callers log the error and move on.
pub trait TonePlayer {
    fn play(&mut self, note: &Note) -> Result<()>;

    /// Identification string used in logs.
    fn player_type(&self) -> &'static str;
}

/// Plays each note as an enveloped sine tone on the default output device.
pub struct RodioTonePlayer {
    #[allow(dead_code)]
    stream: OutputStream,
    stream_handle: OutputStreamHandle,
    master_volume: f32,
}

impl RodioTonePlayer {
    pub fn new() -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default().context("No audio output device available")?;
        Ok(Self {
            stream,
            stream_handle,
            master_volume: 0.5,
        })
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }
}

impl TonePlayer for RodioTonePlayer {
    fn play(&mut self, note: &Note) -> Result<()> {
        let duration = Duration::from_secs_f32(note.duration_s.max(0.01));
        let source = SineWave::new(note.frequency_hz)
            .take_duration(duration)
            .fade_in(Duration::from_millis(10))
            .amplify(note.velocity.clamp(0.0, 1.0) * self.master_volume)
            .delay(Duration::from_secs_f32(note.start_offset_s.max(0.0)));

        self.stream_handle
            .play_raw(source)
            .with_context(|| format!("Failed to play {:.1}Hz", note.frequency_hz))?;
        Ok(())
    }

    fn player_type(&self) -> &'static str {
        "rodio"
    }
}

/// Collects played notes instead of sounding them; clones share one log.
#[derive(Debug, Clone, Default)]
pub struct NoteRecorder {
    notes: Rc<RefCell<Vec<Note>>>,
}

impl NoteRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.notes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.borrow().is_empty()
    }
}

impl TonePlayer for NoteRecorder {
    fn play(&mut self, note: &Note) -> Result<()> {
        self.notes.borrow_mut().push(note.clone());
        Ok(())
    }

    fn player_type(&self) -> &'static str {
        "recorder"
    }
}

/// Discards every note.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPlayer;

impl TonePlayer for SilentPlayer {
    fn play(&mut self, _note: &Note) -> Result<()> {
        Ok(())
    }

    fn player_type(&self) -> &'static str {
        "silent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_clones_share_log() {
        let recorder = NoteRecorder::new();
        let mut handle = recorder.clone();
        handle.play(&Note::new(440.0, 0.4, 0.3)).unwrap();
        handle.play(&Note::new(220.0, 0.2, 0.3)).unwrap();
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.notes()[1].frequency_hz, 220.0);
    }
}
