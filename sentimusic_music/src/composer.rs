// Live composer: endless random melody that follows the current mood.
//
// A background playback thread loops forever: draw a note and a duration from
// the current `Mood`, send note-on, wait out the duration, send note-off. The
// input side calls `set_sentiment` whenever a new line of text is
// classified; that swaps in a freshly realized `Mood` (new random key in the
// new profile) and changes the instrument. The playback thread picks the new
// mood up at the start of its next note, so a change is heard within one
// note.
//
// Locking: playback state (the current `Arc<Mood>` plus the key RNG) and the
// audio backend each sit behind their own mutex. `set_sentiment` holds the
// state lock across the program change so concurrent callers serialize and
// the instrument always matches the installed mood; the playback thread only
// ever holds one of the two locks at a time, and never while waiting. Lock
// order is state, then backend.
//
// Shutdown: the wait between note-on and note-off is a `recv_timeout` on a
// stop channel, so `close` cuts the current note short instead of sleeping
// it out. The loop still sends that note's note-off, then exits; `close`
// joins the thread and shuts the backend down while holding the state lock,
// so no mood change can reach the backend after its shutdown. An atomic flag
// makes `close` idempotent, and dropping the composer closes it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use sentimusic_prng::MoodRng;
use sentimusic_sentiment::Sentiment;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::backend::{AudioBackend, BankId};
use crate::error::{BackendError, ComposerError};
use crate::profile::{Instrument, Mood, MoodProfile};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerSettings {
    /// MIDI channel all notes and program changes go to.
    pub channel: u8,
    pub velocity: u8,
    /// Mood to start in before any text has been classified.
    pub initial_sentiment: Sentiment,
    /// SoundFont (or other bank) to select instruments from. Without one,
    /// instruments are plain General MIDI program changes.
    pub instrument_bank: Option<PathBuf>,
    /// Fixed seed for key and note choices. `None` seeds from the clock.
    pub seed: Option<u64>,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        ComposerSettings {
            channel: 0,
            velocity: 120,
            initial_sentiment: Sentiment::Positive,
            instrument_bank: None,
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct PlaybackState {
    mood: Arc<Mood>,
    /// Draws root keys on each mood change.
    rng: MoodRng,
}

struct Shared<B> {
    state: Mutex<PlaybackState>,
    backend: Mutex<B>,
    channel: u8,
    velocity: u8,
    bank: Option<BankId>,
}

impl<B: AudioBackend> Shared<B> {
    fn state(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn backend(&self) -> MutexGuard<'_, B> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_mood(&self) -> Arc<Mood> {
        Arc::clone(&self.state().mood)
    }

    /// Run one backend call; failures are logged and dropped.
    fn emit(&self, what: &str, f: impl FnOnce(&mut B) -> Result<(), BackendError>) {
        if let Err(e) = f(&mut self.backend()) {
            warn!(error = %e, "{what} failed");
        }
    }
}

fn switch_instrument<B: AudioBackend>(
    backend: &mut B,
    channel: u8,
    bank: Option<BankId>,
    instrument: Instrument,
) -> Result<(), BackendError> {
    match bank {
        Some(bank) => backend.select_program(channel, bank, instrument.program()),
        None => backend.change_program(channel, instrument.program()),
    }
}

struct Worker {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<Result<(), ComposerError>>,
}

// ---------------------------------------------------------------------------
// LiveComposer
// ---------------------------------------------------------------------------

pub struct LiveComposer<B: AudioBackend + 'static> {
    shared: Arc<Shared<B>>,
    /// Note/duration RNG, handed to the playback thread on `start`.
    note_rng: Mutex<Option<MoodRng>>,
    worker: Mutex<Option<Worker>>,
    closed: AtomicBool,
}

impl<B: AudioBackend + 'static> LiveComposer<B> {
    /// Start the backend, load the instrument bank if one is configured, and
    /// realize the initial mood. Nothing plays until `start`.
    ///
    /// Any backend failure here is fatal and reported as `AudioDeviceInit`.
    pub fn new(settings: ComposerSettings, mut backend: B) -> Result<Self, ComposerError> {
        let mut rng = match settings.seed {
            Some(seed) => MoodRng::new(seed),
            None => MoodRng::from_clock(),
        };
        let note_rng = rng.fork();

        let (bank, mood) = match prepare(&mut backend, &settings, &mut rng) {
            Ok(prepared) => prepared,
            Err(e) => {
                if let Err(cleanup) = backend.shutdown() {
                    warn!(error = %cleanup, "backend shutdown after failed setup failed");
                }
                return Err(e);
            }
        };
        info!(sentiment = %mood.sentiment(), "composer ready");
        debug!("{}", mood.describe());

        Ok(LiveComposer {
            shared: Arc::new(Shared {
                state: Mutex::new(PlaybackState {
                    mood: Arc::new(mood),
                    rng,
                }),
                backend: Mutex::new(backend),
                channel: settings.channel,
                velocity: settings.velocity,
                bank,
            }),
            note_rng: Mutex::new(Some(note_rng)),
            worker: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Spawn the playback thread. A composer plays at most once.
    pub fn start(&self) -> Result<(), ComposerError> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::SeqCst) {
            return Err(ComposerError::Closed);
        }
        let rng = self
            .note_rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ComposerError::AlreadyStarted)?;

        let (stop_tx, stop_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let thread = std::thread::Builder::new()
            .name("sentimusic-playback".into())
            .spawn(move || {
                let result = run_playback(&shared, rng, &stop_rx);
                if let Err(e) = &result {
                    error!(error = %e, "playback stopped");
                }
                result
            })
            .map_err(ComposerError::Spawn)?;

        *worker = Some(Worker {
            stop: stop_tx,
            thread,
        });
        info!("playback started");
        Ok(())
    }

    /// Switch to the mood for `sentiment`.
    ///
    /// Returns `Ok(false)` without touching anything if that sentiment is
    /// already playing. Otherwise draws a new key, changes the instrument
    /// (a failed program change is logged, the mood still switches), and
    /// installs the new mood for the playback thread's next note.
    pub fn set_sentiment(&self, sentiment: Sentiment) -> Result<bool, ComposerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ComposerError::Closed);
        }
        let mut state = self.shared.state();
        // `close` shuts the backend down under this lock; check again now
        // that no shutdown can be in flight.
        if self.closed.load(Ordering::SeqCst) {
            return Err(ComposerError::Closed);
        }
        if state.mood.sentiment() == sentiment {
            debug!(%sentiment, "mood unchanged");
            return Ok(false);
        }

        let mood = MoodProfile::of(sentiment).realize(&mut state.rng)?;
        if let Err(e) = switch_instrument(
            &mut *self.shared.backend(),
            self.shared.channel,
            self.shared.bank,
            mood.instrument(),
        ) {
            warn!(error = %e, instrument = mood.instrument().name(), "program change failed");
        }
        info!(%sentiment, "mood changed");
        debug!("{}", mood.describe());
        state.mood = Arc::new(mood);
        Ok(true)
    }

    pub fn sentiment(&self) -> Sentiment {
        self.shared.state().mood.sentiment()
    }

    /// The mood currently playing.
    pub fn snapshot(&self) -> Arc<Mood> {
        self.shared.current_mood()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop playback and shut the backend down.
    ///
    /// Only the first call does anything; later calls return `Ok(())`. If
    /// the playback loop had already died, its error is returned here.
    pub fn close(&self) -> Result<(), ComposerError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let mut outcome = Ok(());
        if let Some(worker) = worker {
            let _ = worker.stop.send(());
            outcome = match worker.thread.join() {
                Ok(result) => result,
                Err(_) => Err(ComposerError::PlaybackPanicked),
            };
        }

        // Holding the state lock waits out any `set_sentiment` already past
        // its closed check, so its program change lands before shutdown.
        let _state = self.shared.state();
        if let Err(e) = self.shared.backend().shutdown() {
            warn!(error = %e, "backend shutdown failed");
        }
        info!("composer closed");
        outcome
    }
}

impl<B: AudioBackend + 'static> Drop for LiveComposer<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "composer closed with error");
        }
    }
}

/// Backend setup and the initial mood.
fn prepare<B: AudioBackend>(
    backend: &mut B,
    settings: &ComposerSettings,
    rng: &mut MoodRng,
) -> Result<(Option<BankId>, Mood), ComposerError> {
    backend.start().map_err(ComposerError::AudioDeviceInit)?;
    let bank = match &settings.instrument_bank {
        Some(path) => Some(
            backend
                .load_instrument_bank(path)
                .map_err(ComposerError::AudioDeviceInit)?,
        ),
        None => None,
    };
    let mood = MoodProfile::of(settings.initial_sentiment).realize(rng)?;
    switch_instrument(backend, settings.channel, bank, mood.instrument())
        .map_err(ComposerError::AudioDeviceInit)?;
    Ok((bank, mood))
}

/// The playback loop. Returns `Ok` when told to stop.
fn run_playback<B: AudioBackend>(
    shared: &Shared<B>,
    mut rng: MoodRng,
    stop: &mpsc::Receiver<()>,
) -> Result<(), ComposerError> {
    let (channel, velocity) = (shared.channel, shared.velocity);
    loop {
        if !matches!(stop.try_recv(), Err(TryRecvError::Empty)) {
            return Ok(());
        }
        let mood = shared.current_mood();
        let (note, duration) = mood.pick(&mut rng)?;
        trace!(note, ?duration, "note");

        shared.emit("note on", |b| b.note_on(channel, note, velocity));
        let stopped = !matches!(stop.recv_timeout(duration), Err(RecvTimeoutError::Timeout));
        shared.emit("note off", |b| b.note_off(channel, note));

        if stopped {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{MidiRecorder, RecordedEvent};

    fn settings(seed: u64) -> ComposerSettings {
        ComposerSettings {
            seed: Some(seed),
            ..ComposerSettings::default()
        }
    }

    #[test]
    fn test_default_settings() {
        let s = ComposerSettings::default();
        assert_eq!(s.channel, 0);
        assert_eq!(s.velocity, 120);
        assert_eq!(s.initial_sentiment, Sentiment::Positive);
        assert!(s.instrument_bank.is_none());
    }

    #[test]
    fn test_new_selects_initial_instrument() {
        let recorder = MidiRecorder::new();
        let log = recorder.log();
        let composer = LiveComposer::new(settings(1), recorder).unwrap();
        assert_eq!(composer.sentiment(), Sentiment::Positive);
        assert_eq!(log.programs(), vec![105]);
        assert!(matches!(log.events()[0].event, RecordedEvent::Start));
    }

    #[test]
    fn test_missing_bank_is_fatal() {
        let s = ComposerSettings {
            instrument_bank: Some(PathBuf::from("/no/such/bank.sf2")),
            ..settings(1)
        };
        let result = LiveComposer::new(s, MidiRecorder::new());
        assert!(matches!(
            result,
            Err(ComposerError::AudioDeviceInit(BackendError::Bank { .. }))
        ));
    }

    #[test]
    fn test_bank_uses_select_program() {
        let bank = tempfile::NamedTempFile::new().unwrap();
        let recorder = MidiRecorder::new();
        let log = recorder.log();
        let s = ComposerSettings {
            instrument_bank: Some(bank.path().to_path_buf()),
            initial_sentiment: Sentiment::Negative,
            ..settings(2)
        };
        let composer = LiveComposer::new(s, recorder).unwrap();
        composer.set_sentiment(Sentiment::Positive).unwrap();
        let selects = log.count(|e| matches!(e, RecordedEvent::SelectProgram { .. }));
        let plain = log.count(|e| matches!(e, RecordedEvent::ProgramChange { .. }));
        assert_eq!((selects, plain), (2, 0));
        assert_eq!(log.programs(), vec![40, 105]);
    }

    #[test]
    fn test_bad_channel_fails_construction() {
        let s = ComposerSettings {
            channel: 16,
            ..settings(1)
        };
        assert!(matches!(
            LiveComposer::new(s, MidiRecorder::new()),
            Err(ComposerError::AudioDeviceInit(BackendError::Event(_)))
        ));
    }

    #[test]
    fn test_start_twice() {
        let composer = LiveComposer::new(settings(3), MidiRecorder::new()).unwrap();
        composer.start().unwrap();
        assert!(matches!(composer.start(), Err(ComposerError::AlreadyStarted)));
        composer.close().unwrap();
    }

    #[test]
    fn test_closed_composer_rejects_calls() {
        let composer = LiveComposer::new(settings(4), MidiRecorder::new()).unwrap();
        composer.close().unwrap();
        assert!(composer.is_closed());
        assert!(matches!(composer.start(), Err(ComposerError::Closed)));
        assert!(matches!(
            composer.set_sentiment(Sentiment::Negative),
            Err(ComposerError::Closed)
        ));
    }

    #[test]
    fn test_close_without_start_shuts_backend_down() {
        let recorder = MidiRecorder::new();
        let log = recorder.log();
        let composer = LiveComposer::new(settings(5), recorder).unwrap();
        composer.close().unwrap();
        assert_eq!(log.count(|e| *e == RecordedEvent::Shutdown), 1);
        assert_eq!(log.count(|e| matches!(e, RecordedEvent::NoteOn { .. })), 0);
    }

    #[test]
    fn test_mood_change_racing_close_never_follows_shutdown() {
        let recorder = MidiRecorder::new();
        let log = recorder.log();
        let composer = LiveComposer::new(settings(7), recorder).unwrap();

        let changed = std::thread::scope(|s| {
            // Park `set_sentiment` on the state lock, then let `close` mark the
            // composer closed before either can proceed.
            let guard = composer.shared.state();
            let setter = s.spawn(|| composer.set_sentiment(Sentiment::Negative));
            std::thread::sleep(std::time::Duration::from_millis(20));
            let closer = s.spawn(|| composer.close());
            while !composer.is_closed() {
                std::thread::yield_now();
            }
            drop(guard);
            closer.join().unwrap().unwrap();
            setter.join().unwrap()
        });

        assert!(matches!(changed, Err(ComposerError::Closed)));
        assert_eq!(composer.sentiment(), Sentiment::Positive);
        assert_eq!(log.programs(), vec![105]);
        assert_eq!(
            log.events().last().map(|e| e.event.clone()),
            Some(RecordedEvent::Shutdown)
        );
    }

    #[test]
    fn test_mood_change_redraws_key_from_new_profile() {
        let composer = LiveComposer::new(settings(6), MidiRecorder::new()).unwrap();
        assert!(composer.set_sentiment(Sentiment::Negative).unwrap());
        let mood = composer.snapshot();
        assert_eq!(mood.sentiment(), Sentiment::Negative);
        assert!(MoodProfile::of(Sentiment::Negative).keys.contains(&mood.key()));
        assert_eq!(mood.instrument(), Instrument::Violin);
    }
}
