// MIDI recorder backend.
//
// `MidiRecorder` implements `AudioBackend` by timestamping every event it
// receives against the moment `start` was called. The log is shared through a
// cloneable `EventLog` handle so callers (and tests) can watch a session as it
// plays. On shutdown, if an output path is configured, the recording is
// written as a Standard MIDI File.
//
// Uses the `midly` crate for MIDI writing. Output is SMF Format 0 (single
// track) at a fixed 120 BPM, so wall-clock offsets convert to ticks with one
// constant: 480 ticks per 500 ms quarter note.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use tracing::{debug, info};

use crate::backend::{AudioBackend, BankId};
use crate::error::BackendError;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// Microseconds per quarter note (120 BPM).
const MICROS_PER_QUARTER: u32 = 500_000;

/// Largest delta a 28-bit variable-length quantity can hold.
const MAX_DELTA: u64 = (1 << 28) - 1;

/// One event as the backend saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Start,
    LoadBank { path: PathBuf, bank: BankId },
    SelectProgram { channel: u8, bank: BankId, preset: u8 },
    ProgramChange { channel: u8, program: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    Shutdown,
}

impl RecordedEvent {
    /// The program this event switches to, if it is a program change of
    /// either kind.
    pub fn program(&self) -> Option<u8> {
        match *self {
            RecordedEvent::SelectProgram { preset, .. } => Some(preset),
            RecordedEvent::ProgramChange { program, .. } => Some(program),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    /// Offset from `start`.
    pub at: Duration,
    pub event: RecordedEvent,
}

/// Shared, append-only view of a recording.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<TimedEvent>>>,
}

impl EventLog {
    fn push(&self, event: TimedEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<TimedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, pred: impl Fn(&RecordedEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| pred(&e.event))
            .count()
    }

    pub fn programs(&self) -> Vec<u8> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|e| e.event.program())
            .collect()
    }
}

pub struct MidiRecorder {
    output: Option<PathBuf>,
    log: EventLog,
    started: Option<Instant>,
    banks: Vec<PathBuf>,
}

impl MidiRecorder {
    /// A recorder that keeps events in memory only.
    pub fn new() -> Self {
        MidiRecorder {
            output: None,
            log: EventLog::default(),
            started: None,
            banks: Vec::new(),
        }
    }

    /// A recorder that writes `path` on shutdown.
    pub fn with_output(path: impl Into<PathBuf>) -> Self {
        MidiRecorder {
            output: Some(path.into()),
            ..MidiRecorder::new()
        }
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    fn record(&self, event: RecordedEvent) {
        let at = self.started.map(|t| t.elapsed()).unwrap_or_default();
        self.log.push(TimedEvent { at, event });
    }
}

impl Default for MidiRecorder {
    fn default() -> Self {
        MidiRecorder::new()
    }
}

impl AudioBackend for MidiRecorder {
    fn start(&mut self) -> Result<(), BackendError> {
        self.started = Some(Instant::now());
        self.record(RecordedEvent::Start);
        Ok(())
    }

    /// Banks are not rendered, only checked for existence and remembered.
    fn load_instrument_bank(&mut self, path: &Path) -> Result<BankId, BackendError> {
        if !path.is_file() {
            return Err(BackendError::Bank {
                path: path.to_path_buf(),
                reason: "no such file".into(),
            });
        }
        let bank = BankId(self.banks.len() as u32);
        self.banks.push(path.to_path_buf());
        self.record(RecordedEvent::LoadBank {
            path: path.to_path_buf(),
            bank,
        });
        Ok(bank)
    }

    fn select_program(
        &mut self,
        channel: u8,
        bank: BankId,
        preset: u8,
    ) -> Result<(), BackendError> {
        if bank.0 as usize >= self.banks.len() {
            return Err(BackendError::UnknownBank(bank));
        }
        check_channel(channel)?;
        check_data(preset)?;
        self.record(RecordedEvent::SelectProgram {
            channel,
            bank,
            preset,
        });
        Ok(())
    }

    fn change_program(&mut self, channel: u8, program: u8) -> Result<(), BackendError> {
        check_channel(channel)?;
        check_data(program)?;
        self.record(RecordedEvent::ProgramChange { channel, program });
        Ok(())
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), BackendError> {
        check_channel(channel)?;
        check_data(note)?;
        check_data(velocity)?;
        self.record(RecordedEvent::NoteOn {
            channel,
            note,
            velocity,
        });
        Ok(())
    }

    fn note_off(&mut self, channel: u8, note: u8) -> Result<(), BackendError> {
        check_channel(channel)?;
        check_data(note)?;
        self.record(RecordedEvent::NoteOff { channel, note });
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), BackendError> {
        self.record(RecordedEvent::Shutdown);
        if let Some(path) = &self.output {
            let events = self.log.events();
            write_midi(&events, path)?;
            info!(path = %path.display(), events = events.len(), "wrote MIDI recording");
        }
        Ok(())
    }
}

fn check_channel(channel: u8) -> Result<(), BackendError> {
    if channel > 15 {
        return Err(BackendError::Event(format!("channel {channel} out of range")));
    }
    Ok(())
}

fn check_data(value: u8) -> Result<(), BackendError> {
    if value > 127 {
        return Err(BackendError::Event(format!("data byte {value} out of range")));
    }
    Ok(())
}

/// Convert a wall-clock offset to ticks at the fixed tempo.
fn to_ticks(at: Duration) -> u64 {
    at.as_micros() as u64 * TICKS_PER_QUARTER as u64 / MICROS_PER_QUARTER as u64
}

/// Write a recording as a format-0 MIDI file.
pub fn write_midi(events: &[TimedEvent], path: &Path) -> Result<(), BackendError> {
    let smf = events_to_smf(events);
    let mut buf = Vec::new();
    smf.write(&mut buf)
        .map_err(|e| BackendError::MidiWrite(e.to_string()))?;
    std::fs::write(path, &buf).map_err(|source| BackendError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Convert a recording to an in-memory SMF. Non-MIDI events (start, bank
/// loads, shutdown) are dropped.
fn events_to_smf(events: &[TimedEvent]) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    let mut track: Track<'static> = Vec::new();
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(MICROS_PER_QUARTER))),
    });

    let mut last_tick: u64 = 0;
    for timed in events {
        let (channel, message) = match timed.event {
            RecordedEvent::SelectProgram { channel, preset, .. } => (
                channel,
                MidiMessage::ProgramChange {
                    program: u7::new(preset),
                },
            ),
            RecordedEvent::ProgramChange { channel, program } => (
                channel,
                MidiMessage::ProgramChange {
                    program: u7::new(program),
                },
            ),
            RecordedEvent::NoteOn {
                channel,
                note,
                velocity,
            } => (
                channel,
                MidiMessage::NoteOn {
                    key: u7::new(note),
                    vel: u7::new(velocity),
                },
            ),
            RecordedEvent::NoteOff { channel, note } => (
                channel,
                MidiMessage::NoteOff {
                    key: u7::new(note),
                    vel: u7::new(0),
                },
            ),
            _ => continue,
        };
        // Events arrive from two threads; clamp so deltas never go negative.
        let tick = to_ticks(timed.at).max(last_tick);
        let delta = (tick - last_tick).min(MAX_DELTA);
        last_tick = tick;
        track.push(TrackEvent {
            delta: u28::new(delta as u32),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message,
            },
        });
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    debug!(events = track.len(), "built MIDI track");
    smf.tracks.push(track);
    smf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64, event: RecordedEvent) -> TimedEvent {
        TimedEvent {
            at: Duration::from_millis(ms),
            event,
        }
    }

    #[test]
    fn test_ticks_at_120_bpm() {
        assert_eq!(to_ticks(Duration::from_millis(500)), 480);
        assert_eq!(to_ticks(Duration::from_millis(125)), 120);
        assert_eq!(to_ticks(Duration::ZERO), 0);
    }

    #[test]
    fn test_events_to_smf_basic() {
        let events = vec![
            at(0, RecordedEvent::Start),
            at(
                0,
                RecordedEvent::ProgramChange {
                    channel: 0,
                    program: 105,
                },
            ),
            at(
                0,
                RecordedEvent::NoteOn {
                    channel: 0,
                    note: 69,
                    velocity: 120,
                },
            ),
            at(
                500,
                RecordedEvent::NoteOff {
                    channel: 0,
                    note: 69,
                },
            ),
            at(500, RecordedEvent::Shutdown),
        ];
        let smf = events_to_smf(&events);
        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(smf.tracks.len(), 1);
        let track = &smf.tracks[0];
        // tempo + program + note on + note off + end of track
        assert_eq!(track.len(), 5);
        assert_eq!(track[3].delta.as_int(), 480);
    }

    #[test]
    fn test_out_of_order_events_clamp_to_zero_delta() {
        let events = vec![
            at(
                250,
                RecordedEvent::NoteOn {
                    channel: 0,
                    note: 60,
                    velocity: 100,
                },
            ),
            at(
                200,
                RecordedEvent::ProgramChange {
                    channel: 0,
                    program: 40,
                },
            ),
        ];
        let smf = events_to_smf(&events);
        assert_eq!(smf.tracks[0][2].delta.as_int(), 0);
    }

    #[test]
    fn test_recorder_rejects_bad_events() {
        let mut rec = MidiRecorder::new();
        rec.start().unwrap();
        assert!(matches!(rec.note_on(16, 60, 100), Err(BackendError::Event(_))));
        assert!(matches!(rec.note_on(0, 128, 100), Err(BackendError::Event(_))));
        assert!(matches!(
            rec.select_program(0, BankId(0), 40),
            Err(BackendError::UnknownBank(BankId(0)))
        ));
        assert_eq!(rec.log().events().len(), 1);
    }

    #[test]
    fn test_missing_bank_is_an_error() {
        let mut rec = MidiRecorder::new();
        let err = rec
            .load_instrument_bank(Path::new("/definitely/not/here.sf2"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Bank { .. }));
    }

    #[test]
    fn test_loaded_bank_accepts_program_selection() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut rec = MidiRecorder::new();
        rec.start().unwrap();
        let bank = rec.load_instrument_bank(tmp.path()).unwrap();
        assert_eq!(bank, BankId(0));
        rec.select_program(0, bank, 105).unwrap();
        assert_eq!(rec.log().programs(), vec![105]);
    }

    #[test]
    fn test_shutdown_writes_parseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.mid");
        let mut rec = MidiRecorder::with_output(&path);
        rec.start().unwrap();
        rec.change_program(0, 40).unwrap();
        rec.note_on(0, 60, 120).unwrap();
        rec.note_off(0, 60).unwrap();
        rec.shutdown().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let notes_on = smf.tracks[0]
            .iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    TrackEventKind::Midi {
                        message: MidiMessage::NoteOn { .. },
                        ..
                    }
                )
            })
            .count();
        assert_eq!(notes_on, 1);
    }
}
