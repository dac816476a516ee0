// Feature selection and training throughput on a synthetic corpus.
//
// The corpus is generated deterministically from a small word list so runs
// are comparable: each document mixes neutral filler with a few
// class-leaning words.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sentimusic_sentiment::corpus::{Corpus, Document};
use sentimusic_sentiment::features::{FeatureSelector, WordCounts};
use sentimusic_sentiment::{ClassifierConfig, Sentiment, TextClassifier};

const FILLER: &[&str] = &[
    "the", "a", "film", "movie", "plot", "actor", "scene", "story", "and", "was",
];
const POSITIVE: &[&str] = &["great", "wonderful", "fun", "moving", "superb"];
const NEGATIVE: &[&str] = &["terrible", "dull", "boring", "awful", "mess"];

fn synthetic_corpus(docs_per_class: usize) -> Corpus {
    let mut documents = Vec::with_capacity(docs_per_class * 2);
    for label in Sentiment::ALL {
        let leaning = match label {
            Sentiment::Positive => POSITIVE,
            Sentiment::Negative => NEGATIVE,
        };
        for i in 0..docs_per_class {
            let mut words = Vec::with_capacity(40);
            for j in 0..40 {
                let word = if (i + j) % 7 == 0 {
                    leaning[(i * 3 + j) % leaning.len()].to_string()
                } else {
                    format!("{}{}", FILLER[(i + j * 5) % FILLER.len()], (i * j) % 50)
                };
                words.push(word);
            }
            documents.push(Document { label, words });
        }
    }
    Corpus::new(documents)
}

fn bench_training(c: &mut Criterion) {
    let corpus = synthetic_corpus(500);

    c.bench_function("feature_selection_1000_docs", |b| {
        b.iter(|| {
            let mut counts = WordCounts::new();
            for doc in corpus.documents() {
                counts.add_document(doc);
            }
            black_box(FeatureSelector::default().select(&counts))
        })
    });

    c.bench_function("train_1000_docs", |b| {
        b.iter(|| {
            let mut classifier = TextClassifier::new(ClassifierConfig::default());
            classifier.train(black_box(&corpus), 0.75).unwrap();
            black_box(classifier)
        })
    });
}

criterion_group!(benches, bench_training);
criterion_main!(benches);
