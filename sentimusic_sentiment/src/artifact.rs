// Versioned on-disk model artifact.
//
// Training on the full movie-review corpus takes a while, so a trained model
// is persisted and reused. The artifact holds exactly the vocabulary, the
// fitted model, and the training parameters that produced them, plus a
// format version; there is no field through which a corpus handle or any
// other runtime state could leak into it.
//
// Load-or-train: `try_load` treats a missing, unreadable, malformed, or
// wrong-version artifact as "no artifact" (logging why). `load_or_train`
// also discards an artifact trained under a different `ClassifierConfig`,
// then retrains from the corpus and writes a fresh artifact. Only failing to
// load the corpus itself is an error at that point.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classifier::{ClassifierConfig, TextClassifier, TrainedModel};
use crate::corpus::Corpus;
use crate::error::{Result, SentimentError};
use crate::features::Vocabulary;

/// Bumped whenever the serialized shape of the artifact changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    /// Parameters the vocabulary and model were trained with.
    pub config: ClassifierConfig,
    pub vocabulary: Vocabulary,
    pub model: TrainedModel,
}

impl ModelArtifact {
    /// Snapshot a trained classifier. `None` if it is untrained.
    pub fn from_classifier(classifier: &TextClassifier) -> Option<Self> {
        Some(ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            config: classifier.config().clone(),
            vocabulary: classifier.vocabulary()?.clone(),
            model: classifier.model()?.clone(),
        })
    }

    /// Rebuild the classifier under the config it was trained with.
    pub fn into_classifier(self) -> TextClassifier {
        TextClassifier::restore(self.config, self.vocabulary, self.model)
    }

    /// Strict load: every failure is reported.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|source| SentimentError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: ModelArtifact = serde_json::from_str(&data)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(SentimentError::UnsupportedArtifactVersion {
                found: artifact.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }
        Ok(artifact)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let to_err = |source: std::io::Error| SentimentError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(to_err)?;
        }
        let json = serde_json::to_string(self)?;
        fs::write(path, json).map_err(to_err)?;
        info!(path = %path.display(), words = self.vocabulary.len(), "saved model artifact");
        Ok(())
    }
}

/// Lenient load: any failure is logged and yields `None`.
pub fn try_load(path: &Path) -> Option<ModelArtifact> {
    if !path.exists() {
        info!(path = %path.display(), "no model artifact found");
        return None;
    }
    match ModelArtifact::load(path) {
        Ok(artifact) => {
            info!(
                path = %path.display(),
                words = artifact.vocabulary.len(),
                "loaded model artifact"
            );
            Some(artifact)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unusable model artifact");
            None
        }
    }
}

/// Restore a classifier from `path`, or train one from `load_corpus()` and
/// persist it there. An artifact trained under a config other than `config`
/// is retrained. A failed save is logged; the trained classifier is still
/// returned.
pub fn load_or_train<F>(
    path: &Path,
    config: ClassifierConfig,
    load_corpus: F,
) -> Result<TextClassifier>
where
    F: FnOnce() -> Result<Corpus>,
{
    match try_load(path) {
        Some(artifact) if artifact.config == config => return Ok(artifact.into_classifier()),
        Some(artifact) => info!(
            path = %path.display(),
            saved = ?artifact.config,
            requested = ?config,
            "model artifact was trained with a different config; retraining"
        ),
        None => {}
    }

    info!("training sentiment classifier from corpus");
    let corpus = load_corpus()?;
    let split_ratio = config.split_ratio;
    let mut classifier = TextClassifier::new(config);
    classifier.train(&corpus, split_ratio)?;

    if let Some(artifact) = ModelArtifact::from_classifier(&classifier) {
        if let Err(e) = artifact.save(path) {
            warn!(error = %e, "could not persist model artifact");
        }
    }
    Ok(classifier)
}
