// Session configuration.
//
// Everything a `sentimusic` session can be tuned by lives in `SessionConfig`,
// loaded from an optional JSON file. Every field has a default, so a config
// file only needs the keys it changes (`{"composer": {"seed": 7}}` is a
// complete config). Command-line flags are applied on top of the loaded
// values by the binary.
//
// See also: `sentimusic_sentiment::ClassifierConfig` (training parameters)
// and `composer::ComposerSettings` (playback parameters), both nested here.

use std::fs;
use std::path::{Path, PathBuf};

use sentimusic_sentiment::ClassifierConfig;
use serde::{Deserialize, Serialize};

use crate::composer::ComposerSettings;
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Which `AudioBackend` a session plays through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Record to a MIDI file; no live audio.
    #[default]
    MidiFile,
    /// Live synthesis through a SoundFont. Needs the `soundfont` feature and
    /// `composer.instrument_bank`.
    SoundFont,
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub classifier: ClassifierConfig,
    pub composer: ComposerSettings,
    /// Labeled review corpus with `pos/` and `neg/` subdirectories. Only read
    /// when no usable model artifact exists.
    pub corpus_dir: PathBuf,
    /// Where the trained model is cached.
    pub model_path: PathBuf,
    pub backend: BackendKind,
    /// MIDI recording written on exit by the `midi_file` backend.
    pub midi_output: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            classifier: ClassifierConfig::default(),
            composer: ComposerSettings::default(),
            corpus_dir: PathBuf::from("movie_reviews"),
            model_path: PathBuf::from("sentiment_model.json"),
            backend: BackendKind::MidiFile,
            midi_output: Some(PathBuf::from("session.mid")),
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
