// Error types for audio backends, the live composer, and session config.
//
// Backend errors are split by when they can happen: `Device` and `Bank`
// during construction (the composer wraps those in `AudioDeviceInit` and the
// session never starts), `Event` for note and program messages once playback
// is running (the composer logs and keeps going), `MidiWrite`/`Io` when a
// recording is flushed at shutdown.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BankId;

#[derive(Debug, Error)]
pub enum BackendError {
    /// No usable output device, or the device refused to start.
    #[error("audio device error: {0}")]
    Device(String),

    /// An instrument bank could not be read or parsed.
    #[error("failed to load instrument bank {path}: {reason}")]
    Bank { path: PathBuf, reason: String },

    #[error("instrument bank {0:?} was never loaded")]
    UnknownBank(BankId),

    /// A note or program message was rejected.
    #[error("audio event failed: {0}")]
    Event(String),

    #[error("failed to encode MIDI recording: {0}")]
    MidiWrite(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ComposerError {
    /// A mood ended up with no notes or no durations to draw from.
    #[error("mood has an empty note or duration pool")]
    EmptyPool,

    /// A mood's octave pushes a scale note past MIDI note 127.
    #[error("pitch class {pitch_class} in octave {octave} is not a MIDI note")]
    NoteOutOfRange { pitch_class: u8, octave: u8 },

    #[error("audio backend failed to initialize: {0}")]
    AudioDeviceInit(#[source] BackendError),

    #[error("playback is already running")]
    AlreadyStarted,

    #[error("composer has been closed")]
    Closed,

    #[error("playback thread panicked")]
    PlaybackPanicked,

    #[error("failed to spawn playback thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
