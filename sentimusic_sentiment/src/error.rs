// Error type for corpus loading, training, classification, and model
// artifacts.
//
// A corrupt or stale artifact never surfaces here as a failure of
// `load_or_train`: `artifact::try_load` logs it and the caller retrains.
// The artifact variants below are only returned by the explicit `load` and
// `save` calls.

use std::path::PathBuf;

use thiserror::Error;

use crate::label::Sentiment;

pub type Result<T> = std::result::Result<T, SentimentError>;

#[derive(Debug, Error)]
pub enum SentimentError {
    /// `classify` or `evaluate` was called before `train` (or before a model
    /// was restored from an artifact).
    #[error("classifier has not been trained")]
    ClassifierNotTrained,

    /// Reading the training corpus failed.
    #[error("failed to load corpus from {path}: {source}")]
    CorpusLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Training needs at least one document of every class.
    #[error("corpus has no {0} documents")]
    EmptyClass(Sentiment),

    #[error("split ratio must be in (0, 1], got {0}")]
    InvalidSplitRatio(f64),

    /// Zero smoothing would give unseen words probability 0.
    #[error("smoothing must be positive, got {0}")]
    InvalidSmoothing(f64),

    /// `evaluate` needs a held-out partition; none was kept.
    #[error("no held-out documents to evaluate against")]
    NoHeldOutDocuments,

    #[error("model artifact I/O error at {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact is malformed: {0}")]
    ArtifactFormat(#[from] serde_json::Error),

    #[error("model artifact version {found} is not supported (expected {expected})")]
    UnsupportedArtifactVersion { found: u32, expected: u32 },
}
