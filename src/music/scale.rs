use serde::{Deserialize, Serialize};
use std::fmt;

/// Frequency of C4, the reference for degree 0 in octave 4.
pub const C4_HZ: f32 = 261.63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
    Mixolydian,
    Dorian,
}

const MAJOR: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];
const MIXOLYDIAN: [i32; 7] = [0, 2, 4, 5, 7, 9, 10];
const DORIAN: [i32; 7] = [0, 2, 3, 5, 7, 9, 10];

impl Mode {
    /// Semitone offsets of each scale degree above the root.
    pub fn intervals(self) -> &'static [i32] {
        match self {
            Mode::Major => &MAJOR,
            Mode::Minor => &MINOR,
            Mode::Mixolydian => &MIXOLYDIAN,
            Mode::Dorian => &DORIAN,
        }
    }

    /// One step up the minor → major → mixolydian ladder.
    pub fn brighter(self) -> Self {
        match self {
            Mode::Minor | Mode::Dorian => Mode::Major,
            Mode::Major | Mode::Mixolydian => Mode::Mixolydian,
        }
    }

    /// One step down the mixolydian → major → minor ladder.
    pub fn darker(self) -> Self {
        match self {
            Mode::Mixolydian => Mode::Major,
            Mode::Major | Mode::Minor | Mode::Dorian => Mode::Minor,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
            Mode::Mixolydian => "mixolydian",
            Mode::Dorian => "dorian",
        };
        f.write_str(name)
    }
}

/// Frequency of a signed scale degree in `mode`, transposed by `key` semitones.
///
/// Degrees outside `0..7` wrap into neighbouring octaves, so `-1` is the
/// seventh degree one octave down and `7` is the root one octave up.
pub fn scale_note(mode: Mode, key: i32, degree: i32, octave: i32) -> f32 {
    let intervals = mode.intervals();
    let len = intervals.len() as i32;
    let octave_shift = degree.div_euclid(len);
    let semitone = intervals[degree.rem_euclid(len) as usize] + key;

    let exponent = (octave + octave_shift - 4) as f32 + semitone as f32 / 12.0;
    C4_HZ * 2f32.powf(exponent)
}

/// Equal-tempered frequency of a MIDI note number (A4 = 69 = 440 Hz).
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}
