// sentimusic_sentiment: text sentiment classification for Sentimusic.
//
// Turns a line of user text into a `Sentiment` the live composer can react
// to. A baseline bag-of-words Naive Bayes model, trained on a labeled
// review corpus after chi-squared feature selection.
//
// Module overview:
// - `label.rs`:      `Sentiment` (positive/negative), shared with the music crate.
// - `tokenize.rs`:   lowercase word tokenizer used by training and inference.
// - `corpus.rs`:     labeled documents; loader for the `pos/` + `neg/` layout.
// - `features.rs`:   per-class word counts, chi-squared scoring, top-K
//                    `Vocabulary` selection.
// - `classifier.rs`: `TrainedModel` (priors + smoothed likelihoods) and
//                    `TextClassifier` (train / classify / evaluate).
// - `artifact.rs`:   versioned JSON model artifact and load-or-train.
// - `error.rs`:      `SentimentError`.
//
// Classification is pure and the trained classifier is `Send + Sync`, so the
// input thread can classify while the playback thread runs undisturbed.

pub mod artifact;
pub mod classifier;
pub mod corpus;
pub mod error;
pub mod features;
pub mod label;
pub mod tokenize;

pub use classifier::{ClassifierConfig, FeatureScoring, TextClassifier};
pub use error::SentimentError;
pub use label::Sentiment;
