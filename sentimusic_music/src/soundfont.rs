// Live SoundFont synthesis backend (feature `soundfont`).
//
// Renders `.sf2` instrument banks with `rustysynth` into the default `cpal`
// output device. A cpal `Stream` cannot leave the thread that built it, so a
// dedicated audio thread builds and owns the stream, reports the device
// sample rate back once it is playing, and then parks until shutdown.
//
// The synthesizer itself sits in a shared slot that the output callback
// locks once per buffer; while the slot is empty (no program selected yet)
// the callback writes silence. Selecting a program on a bank builds a fresh
// `Synthesizer` for that bank at the device rate.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use tracing::{error, info, warn};

use crate::backend::{AudioBackend, BankId};
use crate::error::BackendError;

/// MIDI status byte for a program change.
const PROGRAM_CHANGE: i32 = 0xC0;

type SynthSlot = Arc<Mutex<Option<Synthesizer>>>;

struct AudioThread {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

pub struct SoundFontBackend {
    synth: SynthSlot,
    fonts: Vec<Arc<SoundFont>>,
    active_bank: Option<BankId>,
    sample_rate: Option<u32>,
    audio: Option<AudioThread>,
}

impl SoundFontBackend {
    pub fn new() -> Self {
        SoundFontBackend {
            synth: Arc::new(Mutex::new(None)),
            fonts: Vec::new(),
            active_bank: None,
            sample_rate: None,
            audio: None,
        }
    }

    /// Run `f` against the active synthesizer, or fail if none is selected.
    fn with_synth(&self, f: impl FnOnce(&mut Synthesizer)) -> Result<(), BackendError> {
        let mut slot = self.synth.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_mut() {
            Some(synth) => {
                f(synth);
                Ok(())
            }
            None => Err(BackendError::Event("no instrument selected".into())),
        }
    }
}

impl Default for SoundFontBackend {
    fn default() -> Self {
        SoundFontBackend::new()
    }
}

impl AudioBackend for SoundFontBackend {
    fn start(&mut self) -> Result<(), BackendError> {
        if self.audio.is_some() {
            return Ok(());
        }
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let slot = Arc::clone(&self.synth);

        let thread = std::thread::Builder::new()
            .name("sentimusic-audio".into())
            .spawn(move || {
                let stream = match open_output(slot) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until shutdown (or until the backend is dropped).
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| BackendError::Device(format!("failed to spawn audio thread: {e}")))?;

        let rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(BackendError::Device("audio thread exited during startup".into()));
            }
        };
        info!(sample_rate = rate, "audio output started");
        self.sample_rate = Some(rate);
        self.audio = Some(AudioThread {
            stop: stop_tx,
            thread,
        });
        Ok(())
    }

    fn load_instrument_bank(&mut self, path: &Path) -> Result<BankId, BackendError> {
        let bank_err = |reason: String| BackendError::Bank {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| bank_err(e.to_string()))?;
        let mut reader = BufReader::new(file);
        let font = SoundFont::new(&mut reader).map_err(|e| bank_err(format!("{e:?}")))?;
        let bank = BankId(self.fonts.len() as u32);
        info!(path = %path.display(), presets = font.get_presets().len(), "loaded SoundFont");
        self.fonts.push(Arc::new(font));
        Ok(bank)
    }

    fn select_program(
        &mut self,
        channel: u8,
        bank: BankId,
        preset: u8,
    ) -> Result<(), BackendError> {
        let font = self
            .fonts
            .get(bank.0 as usize)
            .ok_or(BackendError::UnknownBank(bank))?;
        if self.active_bank != Some(bank) {
            let rate = self
                .sample_rate
                .ok_or_else(|| BackendError::Event("audio output not started".into()))?;
            let settings = SynthesizerSettings::new(rate as i32);
            let synth = Synthesizer::new(font, &settings)
                .map_err(|e| BackendError::Event(format!("failed to create synthesizer: {e:?}")))?;
            *self.synth.lock().unwrap_or_else(PoisonError::into_inner) = Some(synth);
            self.active_bank = Some(bank);
        }
        self.change_program(channel, preset)
    }

    fn change_program(&mut self, channel: u8, program: u8) -> Result<(), BackendError> {
        self.with_synth(|synth| {
            synth.process_midi_message(channel as i32, PROGRAM_CHANGE, program as i32, 0)
        })
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), BackendError> {
        self.with_synth(|synth| synth.note_on(channel as i32, note as i32, velocity as i32))
    }

    fn note_off(&mut self, channel: u8, note: u8) -> Result<(), BackendError> {
        self.with_synth(|synth| synth.note_off(channel as i32, note as i32))
    }

    fn shutdown(&mut self) -> Result<(), BackendError> {
        if let Some(audio) = self.audio.take() {
            let _ = audio.stop.send(());
            if audio.thread.join().is_err() {
                warn!("audio thread panicked");
            }
        }
        self.synth.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.active_bank = None;
        info!("audio output stopped");
        Ok(())
    }
}

/// Open the default output device and start a stream that renders from
/// `slot`. Returns the stream and its sample rate.
fn open_output(slot: SynthSlot) -> Result<(cpal::Stream, u32), BackendError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| BackendError::Device("no default output device".into()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| BackendError::Device(e.to_string()))?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(BackendError::Device(format!(
            "unsupported sample format {:?}",
            supported.sample_format()
        )));
    }
    let config: cpal::StreamConfig = supported.config();
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                left.resize(frames, 0.0);
                right.resize(frames, 0.0);
                let mut synth = slot.lock().unwrap_or_else(PoisonError::into_inner);
                match synth.as_mut() {
                    Some(synth) => synth.render(&mut left, &mut right),
                    None => {
                        left.fill(0.0);
                        right.fill(0.0);
                    }
                }
                for (i, frame) in data.chunks_mut(channels.max(1)).enumerate() {
                    frame[0] = left[i];
                    if frame.len() > 1 {
                        frame[1] = right[i];
                    }
                    for sample in frame.iter_mut().skip(2) {
                        *sample = 0.0;
                    }
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| BackendError::Device(e.to_string()))?;
    stream
        .play()
        .map_err(|e| BackendError::Device(e.to_string()))?;
    Ok((stream, sample_rate))
}
