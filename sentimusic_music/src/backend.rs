// The audio backend seam.
//
// The live composer drives sound through `AudioBackend` and never talks to a
// device directly. Two implementations exist: `MidiRecorder` (midi.rs), which
// logs events and can write them out as a MIDI file, and `SoundFontBackend`
// (soundfont.rs, feature `soundfont`), which synthesizes them live.
//
// Backends are used from two threads (input and playback) through a mutex,
// so they must be `Send` but need not be `Sync`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Handle to an instrument bank loaded into a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BankId(pub u32);

pub trait AudioBackend: Send {
    /// Bring the output up. Called once, before any other event.
    fn start(&mut self) -> Result<(), BackendError>;

    fn load_instrument_bank(&mut self, path: &Path) -> Result<BankId, BackendError>;

    /// Select `preset` from a loaded bank on `channel`.
    fn select_program(&mut self, channel: u8, bank: BankId, preset: u8) -> Result<(), BackendError>;

    /// Plain General MIDI program change, for backends without banks.
    fn change_program(&mut self, channel: u8, program: u8) -> Result<(), BackendError>;

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), BackendError>;

    fn note_off(&mut self, channel: u8, note: u8) -> Result<(), BackendError>;

    /// Release the output. Called at most once, last.
    fn shutdown(&mut self) -> Result<(), BackendError>;
}
