// Scale generation from whole/half-step interval patterns.
//
// A scale shape is seven steps read from the root: a whole step adds two
// semitones, a half step adds one. Walking all but the last step from a root
// pitch class gives the seven pitch classes of the scale (the last step only
// closes the octave back to the root). Results wrap modulo 12, so a scale
// rooted on B-flat still lands entirely inside [0, 11].
//
// Pitch classes become playable MIDI notes with `midi_note`, which places
// them in a 12-semitone octave: `octave * 12 + pitch_class`. Anything past
// MIDI note 127 has no note number and maps to `None`.
//
// Used by profile.rs to realize a mood's note pool.

use serde::{Deserialize, Serialize};

/// Semitones per octave; pitch classes live in `0..SEMITONES_PER_OCTAVE`.
pub const SEMITONES_PER_OCTAVE: u8 = 12;

/// One interval in a scale pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    Half,
    Whole,
}

impl Step {
    pub fn semitones(self) -> u8 {
        match self {
            Step::Half => 1,
            Step::Whole => 2,
        }
    }

    /// The 0/1 notation: 1 is a whole step, 0 a half step.
    pub fn from_bit(bit: u8) -> Option<Step> {
        match bit {
            0 => Some(Step::Half),
            1 => Some(Step::Whole),
            _ => None,
        }
    }
}

/// The scale shapes moods are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalePattern {
    /// W W H W W W H
    Major,
    /// W H W W H W W
    NaturalMinor,
}

impl ScalePattern {
    pub fn steps(self) -> [Step; 7] {
        use Step::{Half as H, Whole as W};
        match self {
            ScalePattern::Major => [W, W, H, W, W, W, H],
            ScalePattern::NaturalMinor => [W, H, W, W, H, W, W],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalePattern::Major => "major",
            ScalePattern::NaturalMinor => "minor",
        }
    }
}

/// Pitch classes of the scale rooted at `root` with the given step pattern.
///
/// Returns `pattern.len()` pitch classes starting with `root % 12`; the last
/// step of the pattern is not applied.
pub fn generate_scale(root: u8, pattern: &[Step]) -> Vec<u8> {
    let mut scale = Vec::with_capacity(pattern.len());
    let Some((_, walked)) = pattern.split_last() else {
        return scale;
    };
    let mut pitch = root % SEMITONES_PER_OCTAVE;
    scale.push(pitch);
    for step in walked {
        pitch = (pitch + step.semitones()) % SEMITONES_PER_OCTAVE;
        scale.push(pitch);
    }
    scale
}

/// Highest MIDI note number.
pub const MAX_MIDI_NOTE: u8 = 127;

/// MIDI note number of a pitch class in an octave, or `None` above G10.
pub fn midi_note(pitch_class: u8, octave: u8) -> Option<u8> {
    octave
        .checked_mul(SEMITONES_PER_OCTAVE)?
        .checked_add(pitch_class)
        .filter(|&note| note <= MAX_MIDI_NOTE)
}

/// Note name of a pitch class, for logs.
pub fn pitch_name(pc: u8) -> &'static str {
    match pc % SEMITONES_PER_OCTAVE {
        0 => "C",
        1 => "C#",
        2 => "D",
        3 => "Eb",
        4 => "E",
        5 => "F",
        6 => "F#",
        7 => "G",
        8 => "Ab",
        9 => "A",
        10 => "Bb",
        _ => "B",
    }
}
