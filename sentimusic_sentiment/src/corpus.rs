// Labeled training corpus.
//
// A corpus is a list of documents, each a sentiment label plus the document's
// tokens. Document order matters: the train/held-out split takes the first
// documents of each class for training, and feature selection breaks score
// ties by first-seen order. So loading is deterministic: directory entries
// are sorted by file name before reading.
//
// On disk the corpus follows the movie-review layout:
//
//   <root>/pos/*.txt   positive reviews
//   <root>/neg/*.txt   negative reviews
//
// Files are read and tokenized in parallel with rayon; the collected order is
// still the sorted file order.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Result, SentimentError};
use crate::label::Sentiment;
use crate::tokenize::tokenize;

/// One labeled document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub label: Sentiment,
    pub words: Vec<String>,
}

impl Document {
    pub fn from_text(label: Sentiment, text: &str) -> Self {
        Document {
            label,
            words: tokenize(text),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    pub fn new(documents: Vec<Document>) -> Self {
        Corpus { documents }
    }

    /// Build a corpus from in-memory `(label, text)` pairs.
    pub fn from_texts<'a>(texts: impl IntoIterator<Item = (Sentiment, &'a str)>) -> Self {
        Corpus::new(
            texts
                .into_iter()
                .map(|(label, text)| Document::from_text(label, text))
                .collect(),
        )
    }

    /// Load a `pos/` + `neg/` directory corpus.
    pub fn load_dir(root: &Path) -> Result<Self> {
        let mut documents = Vec::new();
        for label in Sentiment::ALL {
            let dir = root.join(class_dir_name(label));
            let files = list_text_files(&dir)?;
            debug!(
                class = %label,
                dir = %dir.display(),
                files = files.len(),
                "reading corpus class"
            );

            let class_docs: Vec<Document> = files
                .par_iter()
                .map(|path| {
                    let text = fs::read_to_string(path).map_err(|source| {
                        SentimentError::CorpusLoad {
                            path: path.clone(),
                            source,
                        }
                    })?;
                    Ok(Document::from_text(label, &text))
                })
                .collect::<Result<_>>()?;
            documents.extend(class_docs);
        }

        let corpus = Corpus::new(documents);
        info!(
            root = %root.display(),
            positive = corpus.count(Sentiment::Positive),
            negative = corpus.count(Sentiment::Negative),
            "loaded corpus"
        );
        Ok(corpus)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Documents of one class, in corpus order.
    pub fn of_class(&self, label: Sentiment) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(move |d| d.label == label)
    }

    pub fn count(&self, label: Sentiment) -> usize {
        self.of_class(label).count()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn class_dir_name(label: Sentiment) -> &'static str {
    match label {
        Sentiment::Positive => "pos",
        Sentiment::Negative => "neg",
    }
}

/// Sorted `*.txt` files directly inside `dir`.
fn list_text_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let to_err = |source: std::io::Error| SentimentError::CorpusLoad {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(to_err)? {
        let path = entry.map_err(to_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
