// Mood profiles: the fixed musical character of each sentiment.
//
// Positive moods play a banjo in A or B-flat major with short, busy note
// values; negative moods play a violin in C, B-flat, or B natural minor with
// long ones. The duration pools repeat values to skew the random draw (the
// positive pool is mostly eighths and sixteenths, the negative pool mostly
// halves).
//
// A profile is static. `MoodProfile::realize` draws a root key and produces a
// `Mood`: the concrete note pool and duration pool the playback loop samples
// from. A `Mood` is immutable once built and is always swapped as a whole, so
// notes and durations can never come from two different moods.

use std::time::Duration;

use sentimusic_prng::MoodRng;
use sentimusic_sentiment::Sentiment;
use serde::{Deserialize, Serialize};

use crate::error::ComposerError;
use crate::scale::{ScalePattern, generate_scale, midi_note, pitch_name};

/// Instruments the moods play, with their General MIDI programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instrument {
    Banjo,
    Violin,
}

impl Instrument {
    /// Zero-based General MIDI program number.
    pub fn program(self) -> u8 {
        match self {
            Instrument::Banjo => 105,
            Instrument::Violin => 40,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Instrument::Banjo => "banjo",
            Instrument::Violin => "violin",
        }
    }
}

#[derive(Debug)]
pub struct MoodProfile {
    pub sentiment: Sentiment,
    pub instrument: Instrument,
    /// Root pitch classes a mood may be played in.
    pub keys: &'static [u8],
    pub pattern: ScalePattern,
    /// Note lengths in milliseconds, repeated to weight the draw.
    pub durations_ms: &'static [u64],
    pub octave: u8,
}

static POSITIVE: MoodProfile = MoodProfile {
    sentiment: Sentiment::Positive,
    instrument: Instrument::Banjo,
    keys: &[9, 10],
    pattern: ScalePattern::Major,
    durations_ms: &[
        500, 500, //
        250, 250, 250, 250, //
        125, 125, 125, 125, 125, 125, 125, 125,
    ],
    octave: 5,
};

static NEGATIVE: MoodProfile = MoodProfile {
    sentiment: Sentiment::Negative,
    instrument: Instrument::Violin,
    keys: &[0, 10, 11],
    pattern: ScalePattern::NaturalMinor,
    durations_ms: &[1000, 500, 500],
    octave: 5,
};

impl MoodProfile {
    pub fn of(sentiment: Sentiment) -> &'static MoodProfile {
        match sentiment {
            Sentiment::Positive => &POSITIVE,
            Sentiment::Negative => &NEGATIVE,
        }
    }

    /// Build the mood in a given root key.
    pub fn in_key(&self, key: u8) -> Result<Mood, ComposerError> {
        let octave = self.octave;
        let notes = generate_scale(key, &self.pattern.steps())
            .into_iter()
            .map(|pitch_class| {
                midi_note(pitch_class, octave)
                    .ok_or(ComposerError::NoteOutOfRange { pitch_class, octave })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let durations = self
            .durations_ms
            .iter()
            .map(|&ms| Duration::from_millis(ms))
            .collect();
        Mood::new(self.sentiment, key, self.instrument, notes, durations)
    }

    /// Build the mood in a root key drawn uniformly from `keys`.
    pub fn realize(&self, rng: &mut MoodRng) -> Result<Mood, ComposerError> {
        let key = *rng.choose(self.keys).ok_or(ComposerError::EmptyPool)?;
        self.in_key(key)
    }
}

/// A realized mood: everything the playback loop needs for one sentiment.
#[derive(Debug, Clone, PartialEq)]
pub struct Mood {
    sentiment: Sentiment,
    key: u8,
    instrument: Instrument,
    notes: Vec<u8>,
    durations: Vec<Duration>,
}

impl Mood {
    /// Fails with `EmptyPool` if either pool is empty.
    pub fn new(
        sentiment: Sentiment,
        key: u8,
        instrument: Instrument,
        notes: Vec<u8>,
        durations: Vec<Duration>,
    ) -> Result<Self, ComposerError> {
        if notes.is_empty() || durations.is_empty() {
            return Err(ComposerError::EmptyPool);
        }
        Ok(Mood {
            sentiment,
            key,
            instrument,
            notes,
            durations,
        })
    }

    pub fn sentiment(&self) -> Sentiment {
        self.sentiment
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    pub fn notes(&self) -> &[u8] {
        &self.notes
    }

    pub fn durations(&self) -> &[Duration] {
        &self.durations
    }

    /// Draw the next note and how long to hold it.
    pub fn pick(&self, rng: &mut MoodRng) -> Result<(u8, Duration), ComposerError> {
        let note = rng.choose(&self.notes).ok_or(ComposerError::EmptyPool)?;
        let duration = rng.choose(&self.durations).ok_or(ComposerError::EmptyPool)?;
        Ok((*note, *duration))
    }

    /// One-line description for debug logs.
    pub fn describe(&self) -> String {
        let profile = MoodProfile::of(self.sentiment);
        let secs: Vec<String> = self
            .durations
            .iter()
            .map(|d| format!("{}", d.as_secs_f64()))
            .collect();
        format!(
            "instrument={} key={} scale={} octave={} durations=[{}]",
            self.instrument.name(),
            pitch_name(self.key),
            profile.pattern.name(),
            profile.octave,
            secs.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_match_their_sentiment() {
        for sentiment in Sentiment::ALL {
            assert_eq!(MoodProfile::of(sentiment).sentiment, sentiment);
        }
        assert_eq!(
            MoodProfile::of(Sentiment::Positive).instrument,
            Instrument::Banjo
        );
        assert_eq!(
            MoodProfile::of(Sentiment::Negative).instrument,
            Instrument::Violin
        );
    }

    #[test]
    fn test_programs() {
        assert_eq!(Instrument::Banjo.program(), 105);
        assert_eq!(Instrument::Violin.program(), 40);
    }

    #[test]
    fn test_a_major_mood() {
        let mood = MoodProfile::of(Sentiment::Positive).in_key(9).unwrap();
        // A B C# D E F# G# in octave 5
        assert_eq!(mood.notes(), &[69, 71, 73, 74, 76, 78, 80]);
        assert_eq!(mood.durations().len(), 14);
        assert_eq!(
            mood.durations().iter().filter(|d| d.as_millis() == 125).count(),
            8
        );
    }

    #[test]
    fn test_c_minor_mood() {
        let mood = MoodProfile::of(Sentiment::Negative).in_key(0).unwrap();
        assert_eq!(mood.notes(), &[60, 62, 63, 65, 67, 68, 70]);
        assert_eq!(
            mood.durations(),
            &[
                Duration::from_secs(1),
                Duration::from_millis(500),
                Duration::from_millis(500)
            ]
        );
    }

    #[test]
    fn test_realize_uses_candidate_keys() {
        let mut rng = MoodRng::new(7);
        for sentiment in Sentiment::ALL {
            let profile = MoodProfile::of(sentiment);
            for _ in 0..50 {
                let mood = profile.realize(&mut rng).unwrap();
                assert!(profile.keys.contains(&mood.key()));
                assert_eq!(mood.sentiment(), sentiment);
            }
        }
    }

    #[test]
    fn test_empty_pools_rejected() {
        let empty_notes = Mood::new(
            Sentiment::Positive,
            0,
            Instrument::Banjo,
            vec![],
            vec![Duration::from_millis(100)],
        );
        assert!(matches!(empty_notes, Err(ComposerError::EmptyPool)));
        let empty_durations =
            Mood::new(Sentiment::Positive, 0, Instrument::Banjo, vec![60], vec![]);
        assert!(matches!(empty_durations, Err(ComposerError::EmptyPool)));
    }

    #[test]
    fn test_octave_past_midi_range_rejected() {
        let high = MoodProfile {
            octave: 10,
            ..*MoodProfile::of(Sentiment::Positive)
        };
        // A major in octave 10 runs from A10 = 129, past the last MIDI note.
        assert!(matches!(
            high.in_key(9),
            Err(ComposerError::NoteOutOfRange {
                pitch_class: 9,
                octave: 10
            })
        ));
        // C major in octave 10 tops out at B10 = 131 as well.
        assert!(high.in_key(0).is_err());
    }

    #[test]
    fn test_pick_draws_from_pools() {
        let mood = MoodProfile::of(Sentiment::Negative).in_key(11).unwrap();
        let mut rng = MoodRng::new(3);
        for _ in 0..100 {
            let (note, duration) = mood.pick(&mut rng).unwrap();
            assert!(mood.notes().contains(&note));
            assert!(mood.durations().contains(&duration));
        }
    }

    #[test]
    fn test_describe_mentions_key_and_scale() {
        let mood = MoodProfile::of(Sentiment::Positive).in_key(10).unwrap();
        let text = mood.describe();
        assert!(text.contains("key=Bb"));
        assert!(text.contains("scale=major"));
        assert!(text.contains("banjo"));
    }
}
