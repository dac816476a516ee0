// Sentimusic live composer
//
// Plays an endless, randomly generated melody whose character follows the
// sentiment of whatever the user last typed. Positive text gets a banjo in a
// bright major key with quick notes; negative text gets a violin in a minor
// key with long ones. Sentiment comes from `sentimusic_sentiment`.
//
// Architecture:
// - scale.rs: whole/half-step scale patterns, pitch classes, MIDI note mapping
// - profile.rs: per-sentiment mood profiles and realized `Mood` note/duration pools
// - backend.rs: the `AudioBackend` trait the composer plays through
// - midi.rs: `MidiRecorder` backend (event log + Standard MIDI File output)
// - soundfont.rs: live SoundFont synthesis backend (feature `soundfont`)
// - composer.rs: `LiveComposer`, the background playback loop and mood switching
// - config.rs: `SessionConfig`, JSON session configuration
// - error.rs: backend, composer, and config error types
//
// Given a seed, key and note choices are reproducible; timing is wall-clock.

pub mod backend;
pub mod composer;
pub mod config;
pub mod error;
pub mod midi;
pub mod profile;
pub mod scale;
#[cfg(feature = "soundfont")]
pub mod soundfont;

pub use backend::{AudioBackend, BankId};
pub use composer::{ComposerSettings, LiveComposer};
pub use config::{BackendKind, SessionConfig};
pub use error::{BackendError, ComposerError, ConfigError};
pub use profile::{Instrument, Mood, MoodProfile};
