pub mod scale;
pub mod scheduler;
pub mod player;
pub mod history;
pub mod engine;

pub use scale::{midi_to_freq, scale_note, Mode};
pub use scheduler::{NoteScheduler, ScheduledNote};
pub use player::{NoteRecorder, RodioTonePlayer, SilentPlayer, TonePlayer};
pub use history::{EventHistory, EventRecord};
pub use engine::{MusicConfig, MusicContext, MusicState, ReactiveMusicEngine};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One tone request for the synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub frequency_hz: f32,
    pub velocity: f32,
    pub start_offset_s: f32,
    pub duration_s: f32,
}

impl Note {
    pub fn new(frequency_hz: f32, velocity: f32, duration_s: f32) -> Self {
        Self {
            frequency_hz,
            velocity,
            start_offset_s: 0.0,
            duration_s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Voice {
    Bass,
    Melody,
    Harmony,
    Percussion,
    /// Short phrase answering a sound event.
    Phrase,
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Voice::Bass => "bass",
            Voice::Melody => "melody",
            Voice::Harmony => "harmony",
            Voice::Percussion => "percussion",
            Voice::Phrase => "phrase",
        };
        f.write_str(name)
    }
}
