// Naive Bayes sentiment classifier over binary word-presence features.
//
// Training pipeline (`TextClassifier::train`):
//   1. Split each class's documents: the first `floor(n * split_ratio)` train
//      (at least one), the rest are held out for `evaluate`.
//   2. Count words of the training split and keep the high-information
//      vocabulary (features.rs).
//   3. Reduce every training document to the set of vocabulary words it
//      contains, and fit `TrainedModel`:
//        prior(c)        = docs(c) / docs
//        likelihood(w|c) = (docs(c) containing w + a) / (docs(c) + 2a)
//      with Laplace smoothing a > 0, so no likelihood is ever 0 or 1.
//
// Classification scores each class as
//   ln prior(c) + sum over present words of ln likelihood(w|c)
// and, in `FeatureScoring::Bernoulli` mode, additionally
//   + sum over absent vocabulary words of ln(1 - likelihood(w|c)).
// The default `PresenceOnly` mode matches dictionary-of-present-words
// classifiers: words that do not appear say nothing.
//
// Ties go to the class listed first in `Sentiment::ALL` (Positive).
// Inference is pure: likelihoods live in a `BTreeMap` and present words in a
// `BTreeSet`, so even the float summation order is fixed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::corpus::{Corpus, Document};
use crate::error::{Result, SentimentError};
use crate::features::{DEFAULT_HIGH_INFO_WORD_LIMIT, FeatureSelector, Vocabulary, WordCounts};
use crate::label::Sentiment;
use crate::tokenize::tokenize;

/// How absent vocabulary words contribute to a class score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureScoring {
    /// Only words present in the text are scored.
    #[default]
    PresenceOnly,
    /// Absent vocabulary words contribute `ln(1 - likelihood)`.
    Bernoulli,
}

/// Training parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Vocabulary size cap for feature selection.
    pub high_info_word_limit: usize,
    /// Fraction of each class used for training; the rest is held out.
    pub split_ratio: f64,
    /// Laplace smoothing constant. Must be positive.
    pub smoothing: f64,
    pub scoring: FeatureScoring,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            high_info_word_limit: DEFAULT_HIGH_INFO_WORD_LIMIT,
            split_ratio: 0.75,
            smoothing: 1.0,
            scoring: FeatureScoring::PresenceOnly,
        }
    }
}

/// Fitted Naive Bayes parameters, restricted to one vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Indexed by `Sentiment::index()`.
    priors: [f64; 2],
    /// P(word present | class), indexed by `Sentiment::index()`.
    likelihoods: BTreeMap<String, [f64; 2]>,
    smoothing: f64,
    scoring: FeatureScoring,
}

impl TrainedModel {
    /// Fit on training documents already reduced to vocabulary presence sets.
    pub fn fit(
        vocabulary: &Vocabulary,
        documents: &[(Sentiment, BTreeSet<&str>)],
        smoothing: f64,
        scoring: FeatureScoring,
    ) -> Result<Self> {
        if !(smoothing > 0.0 && smoothing.is_finite()) {
            return Err(SentimentError::InvalidSmoothing(smoothing));
        }

        let mut class_docs = [0u64; 2];
        let mut containing: BTreeMap<&str, [u64; 2]> = vocabulary
            .words()
            .iter()
            .map(|w| (w.as_str(), [0, 0]))
            .collect();

        for (label, present) in documents {
            class_docs[label.index()] += 1;
            for &word in present {
                if let Some(counts) = containing.get_mut(word) {
                    counts[label.index()] += 1;
                }
            }
        }

        let total_docs: u64 = class_docs.iter().sum();
        for label in Sentiment::ALL {
            if class_docs[label.index()] == 0 {
                return Err(SentimentError::EmptyClass(label));
            }
        }

        let priors = class_docs.map(|n| n as f64 / total_docs as f64);
        let likelihoods = containing
            .into_iter()
            .map(|(word, counts)| {
                let mut p = [0.0; 2];
                for label in Sentiment::ALL {
                    let i = label.index();
                    p[i] = (counts[i] as f64 + smoothing)
                        / (class_docs[i] as f64 + 2.0 * smoothing);
                }
                (word.to_string(), p)
            })
            .collect();

        Ok(TrainedModel {
            priors,
            likelihoods,
            smoothing,
            scoring,
        })
    }

    pub fn prior(&self, label: Sentiment) -> f64 {
        self.priors[label.index()]
    }

    /// P(word present | class), or `None` for words outside the vocabulary.
    pub fn likelihood(&self, word: &str, label: Sentiment) -> Option<f64> {
        self.likelihoods.get(word).map(|p| p[label.index()])
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn scoring(&self) -> FeatureScoring {
        self.scoring
    }

    /// Log-probability score of each class for a presence set.
    pub fn log_scores(&self, present: &BTreeSet<&str>) -> [f64; 2] {
        let mut scores = self.priors.map(f64::ln);
        match self.scoring {
            FeatureScoring::PresenceOnly => {
                for &word in present {
                    if let Some(p) = self.likelihoods.get(word) {
                        for (score, likelihood) in scores.iter_mut().zip(p) {
                            *score += likelihood.ln();
                        }
                    }
                }
            }
            FeatureScoring::Bernoulli => {
                for (word, p) in &self.likelihoods {
                    let is_present = present.contains(word.as_str());
                    for (score, &likelihood) in scores.iter_mut().zip(p) {
                        *score += if is_present {
                            likelihood.ln()
                        } else {
                            (1.0 - likelihood).ln()
                        };
                    }
                }
            }
        }
        scores
    }

    /// Highest-scoring class; ties go to the earlier entry of `Sentiment::ALL`.
    pub fn predict(&self, present: &BTreeSet<&str>) -> Sentiment {
        let scores = self.log_scores(present);
        let mut best = Sentiment::ALL[0];
        for label in &Sentiment::ALL[1..] {
            if scores[label.index()] > scores[best.index()] {
                best = *label;
            }
        }
        best
    }
}

/// Vocabulary words contained in `words`.
fn presence_set<'a>(vocabulary: &Vocabulary, words: &'a [String]) -> BTreeSet<&'a str> {
    words
        .iter()
        .map(String::as_str)
        .filter(|w| vocabulary.contains(w))
        .collect()
}

/// Split a class's documents into (training, held-out).
fn split_class(docs: Vec<&Document>, ratio: f64) -> (Vec<&Document>, Vec<&Document>) {
    let n = docs.len();
    let cutoff = ((n as f64 * ratio).floor() as usize).clamp(n.min(1), n);
    let mut train = docs;
    let held_out = train.split_off(cutoff);
    (train, held_out)
}

/// Sizes of the last training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingSummary {
    pub training_documents: usize,
    pub held_out_documents: usize,
    pub vocabulary_size: usize,
}

#[derive(Debug, Clone)]
struct Trained {
    vocabulary: Vocabulary,
    model: TrainedModel,
}

/// Sentiment classifier: untrained until `train` (or `restore`) succeeds.
#[derive(Debug, Clone, Default)]
pub struct TextClassifier {
    config: ClassifierConfig,
    trained: Option<Trained>,
    held_out: Vec<Document>,
}

impl TextClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        TextClassifier {
            config,
            trained: None,
            held_out: Vec::new(),
        }
    }

    /// Rebuild a classifier from previously trained parts. No held-out
    /// documents come along, so `evaluate` reports `NoHeldOutDocuments`.
    pub fn restore(config: ClassifierConfig, vocabulary: Vocabulary, model: TrainedModel) -> Self {
        TextClassifier {
            config,
            trained: Some(Trained { vocabulary, model }),
            held_out: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.trained.as_ref().map(|t| &t.vocabulary)
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.trained.as_ref().map(|t| &t.model)
    }

    pub fn held_out(&self) -> &[Document] {
        &self.held_out
    }

    /// Train on `corpus`, keeping `1 - split_ratio` of each class for
    /// `evaluate`. Replaces any previous model.
    pub fn train(&mut self, corpus: &Corpus, split_ratio: f64) -> Result<TrainingSummary> {
        if !(split_ratio > 0.0 && split_ratio <= 1.0) {
            return Err(SentimentError::InvalidSplitRatio(split_ratio));
        }

        let mut training: Vec<&Document> = Vec::new();
        let mut held_out: Vec<&Document> = Vec::new();
        for label in Sentiment::ALL {
            let docs: Vec<&Document> = corpus.of_class(label).collect();
            if docs.is_empty() {
                return Err(SentimentError::EmptyClass(label));
            }
            let (train, rest) = split_class(docs, split_ratio);
            training.extend(train);
            held_out.extend(rest);
        }

        let mut counts = WordCounts::new();
        for doc in &training {
            counts.add_document(doc);
        }
        let vocabulary = FeatureSelector::new(self.config.high_info_word_limit).select(&counts);

        let presence: Vec<(Sentiment, BTreeSet<&str>)> = training
            .iter()
            .map(|doc| (doc.label, presence_set(&vocabulary, &doc.words)))
            .collect();
        let model = TrainedModel::fit(
            &vocabulary,
            &presence,
            self.config.smoothing,
            self.config.scoring,
        )?;

        let summary = TrainingSummary {
            training_documents: training.len(),
            held_out_documents: held_out.len(),
            vocabulary_size: vocabulary.len(),
        };
        info!(
            training = summary.training_documents,
            held_out = summary.held_out_documents,
            vocabulary = summary.vocabulary_size,
            distinct_words = counts.words().len(),
            "trained sentiment classifier"
        );
        debug!(
            top_words = ?&vocabulary.words()[..vocabulary.len().min(10)],
            "most informative words"
        );

        self.held_out = held_out.into_iter().cloned().collect();
        self.trained = Some(Trained { vocabulary, model });
        Ok(summary)
    }

    /// Label a sentence.
    pub fn classify(&self, sentence: &str) -> Result<Sentiment> {
        self.classify_words(&tokenize(sentence))
    }

    /// Label already-tokenized (lowercase) words.
    pub fn classify_words(&self, words: &[String]) -> Result<Sentiment> {
        let trained = self
            .trained
            .as_ref()
            .ok_or(SentimentError::ClassifierNotTrained)?;
        let present = presence_set(&trained.vocabulary, words);
        Ok(trained.model.predict(&present))
    }

    /// Fraction of held-out documents labeled correctly.
    pub fn evaluate(&self) -> Result<f64> {
        if self.trained.is_none() {
            return Err(SentimentError::ClassifierNotTrained);
        }
        if self.held_out.is_empty() {
            return Err(SentimentError::NoHeldOutDocuments);
        }
        let mut correct = 0usize;
        for doc in &self.held_out {
            if self.classify_words(&doc.words)? == doc.label {
                correct += 1;
            }
        }
        Ok(correct as f64 / self.held_out.len() as f64)
    }

    /// The `n` highest-ranked vocabulary words.
    pub fn most_informative(&self, n: usize) -> Vec<&str> {
        self.vocabulary()
            .map(|v| v.words().iter().take(n).map(String::as_str).collect())
            .unwrap_or_default()
    }
}
