// High-information word selection.
//
// Most words in a review say nothing about its polarity ("the", "movie",
// "plot"). Before training, every distinct word is scored by how strongly its
// frequency is associated with each class, and only the top-K survive as the
// vocabulary the Naive Bayes model conditions on.
//
// Association is the chi-squared statistic of a 2x2 contingency table per
// class:
//
//                  in class c      not in class c
//   word w         n_ii            n_io
//   other words    n_oi            n_oo
//
// built from four counts: occurrences of w in c (n_ii), occurrences of w
// overall (n_ix), words in c (n_xi), and all words (n_xx). A word's combined
// score is the sum of its per-class statistics, each class using its own
// counts.
//
// Ordering is fully deterministic: scores are computed in parallel but
// collected in first-seen order (positive documents, then negative, each in
// corpus order), and the descending sort is stable, so equal scores keep
// first-seen order.

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::corpus::Document;
use crate::label::Sentiment;

/// Default vocabulary size cap.
pub const DEFAULT_HIGH_INFO_WORD_LIMIT: usize = 10_000;

/// Per-class word frequencies for one training split.
#[derive(Debug, Clone, Default)]
pub struct WordCounts {
    per_class: [FxHashMap<String, u64>; 2],
    class_totals: [u64; 2],
    first_seen: Vec<String>,
}

impl WordCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every token of a document under its label.
    pub fn add_document(&mut self, doc: &Document) {
        for word in &doc.words {
            self.add(doc.label, word, 1);
        }
    }

    /// Add `count` occurrences of `word` to `label`.
    pub fn add(&mut self, label: Sentiment, word: &str, count: u64) {
        if count == 0 {
            return;
        }
        let seen_before = self.per_class.iter().any(|m| m.contains_key(word));
        if !seen_before {
            self.first_seen.push(word.to_string());
        }
        *self.per_class[label.index()]
            .entry(word.to_string())
            .or_insert(0) += count;
        self.class_totals[label.index()] += count;
    }

    pub fn count(&self, label: Sentiment, word: &str) -> u64 {
        self.per_class[label.index()].get(word).copied().unwrap_or(0)
    }

    /// Occurrences of `word` across all classes.
    pub fn word_total(&self, word: &str) -> u64 {
        Sentiment::ALL.iter().map(|&l| self.count(l, word)).sum()
    }

    pub fn class_total(&self, label: Sentiment) -> u64 {
        self.class_totals[label.index()]
    }

    pub fn total(&self) -> u64 {
        self.class_totals.iter().sum()
    }

    /// Distinct words in first-seen order.
    pub fn words(&self) -> &[String] {
        &self.first_seen
    }

    /// Sum of the per-class chi-squared statistics for `word`.
    pub fn combined_score(&self, word: &str) -> f64 {
        let n_ix = self.word_total(word);
        let n_xx = self.total();
        Sentiment::ALL
            .iter()
            .map(|&label| {
                chi_squared(
                    self.count(label, word),
                    (n_ix, self.class_total(label)),
                    n_xx,
                )
            })
            .sum()
    }
}

/// Chi-squared statistic of a 2x2 contingency table given the joint count
/// `n_ii`, the marginals `(n_ix, n_xi)`, and the grand total `n_xx`.
///
/// Returns 0 when any marginal is empty (the statistic is undefined there and
/// such a word carries no class information).
pub fn chi_squared(n_ii: u64, (n_ix, n_xi): (u64, u64), n_xx: u64) -> f64 {
    let n_ii = n_ii as f64;
    let n_io = n_ix as f64 - n_ii;
    let n_oi = n_xi as f64 - n_ii;
    let n_oo = n_xx as f64 - n_ii - n_io - n_oi;

    let denominator = (n_ii + n_io) * (n_ii + n_oi) * (n_io + n_oo) * (n_oi + n_oo);
    if denominator <= 0.0 {
        return 0.0;
    }
    let cross = n_ii * n_oo - n_io * n_oi;
    n_xx as f64 * cross * cross / denominator
}

/// A candidate word and its combined association score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredWord {
    pub word: String,
    pub score: f64,
}

/// Picks the top-K most class-discriminative words.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSelector {
    pub high_info_word_limit: usize,
}

impl Default for FeatureSelector {
    fn default() -> Self {
        FeatureSelector {
            high_info_word_limit: DEFAULT_HIGH_INFO_WORD_LIMIT,
        }
    }
}

impl FeatureSelector {
    pub fn new(high_info_word_limit: usize) -> Self {
        FeatureSelector {
            high_info_word_limit,
        }
    }

    /// Every distinct word with its score, best first.
    pub fn rank(&self, counts: &WordCounts) -> Vec<ScoredWord> {
        let mut scored: Vec<ScoredWord> = counts
            .words()
            .par_iter()
            .map(|word| ScoredWord {
                word: word.clone(),
                score: counts.combined_score(word),
            })
            .collect();
        // `sort_by` is stable: ties keep first-seen order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    /// The top `high_info_word_limit` words.
    pub fn select(&self, counts: &WordCounts) -> Vocabulary {
        let ranked = self
            .rank(counts)
            .into_iter()
            .take(self.high_info_word_limit)
            .map(|s| s.word)
            .collect();
        Vocabulary::new(ranked)
    }
}

/// The words the classifier conditions on, best first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    ranked: Vec<String>,
    lookup: FxHashSet<String>,
}

impl Vocabulary {
    pub fn new(ranked: Vec<String>) -> Self {
        let lookup = ranked.iter().cloned().collect();
        Vocabulary { ranked, lookup }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.lookup.contains(word)
    }

    /// Words in rank order.
    pub fn words(&self) -> &[String] {
        &self.ranked
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.ranked == other.ranked
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(ranked: Vec<String>) -> Self {
        Vocabulary::new(ranked)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn counts_from(pos: &[(&str, u64)], neg: &[(&str, u64)]) -> WordCounts {
        let mut counts = WordCounts::new();
        for &(w, n) in pos {
            counts.add(Sentiment::Positive, w, n);
        }
        for &(w, n) in neg {
            counts.add(Sentiment::Negative, w, n);
        }
        counts
    }

    #[test]
    fn test_chi_squared_known_table() {
        // Table [[10, 0], [0, 10]]: perfect association, chi2 = n = 20.
        let chi = chi_squared(10, (10, 10), 20);
        assert!((chi - 20.0).abs() < 1e-9, "chi2 = {chi}");
    }

    #[test]
    fn test_chi_squared_independent_is_zero() {
        // Word spread proportionally across both classes.
        let chi = chi_squared(5, (10, 50), 100);
        assert!(chi.abs() < 1e-9, "chi2 = {chi}");
    }

    #[test]
    fn test_chi_squared_degenerate_margins() {
        assert_eq!(chi_squared(0, (0, 10), 10), 0.0);
        assert_eq!(chi_squared(0, (0, 0), 0), 0.0);
    }

    #[test]
    fn test_negative_class_uses_its_own_counts() {
        // "awful" only appears in the (larger) negative class. With the
        // positive-class inputs reused for both terms the two halves would
        // not match; with per-class inputs a 2-class table is symmetric.
        let counts = counts_from(&[("fine", 3)], &[("awful", 4), ("plot", 20)]);
        let n_ix = counts.word_total("awful");
        let n_xx = counts.total();
        let pos = chi_squared(0, (n_ix, counts.class_total(Sentiment::Positive)), n_xx);
        let neg = chi_squared(4, (n_ix, counts.class_total(Sentiment::Negative)), n_xx);
        assert!((pos - neg).abs() < 1e-9);
        assert!((counts.combined_score("awful") - (pos + neg)).abs() < 1e-9);
    }

    #[test]
    fn test_rank_prefers_discriminative_words() {
        let counts = counts_from(
            &[("the", 10), ("great", 8)],
            &[("the", 10), ("terrible", 8)],
        );
        let ranked = FeatureSelector::default().rank(&counts);
        assert_eq!(ranked.last().unwrap().word, "the");
        assert!(ranked[0].score > 0.0);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        // Mirror-image words score identically; positive-first order wins.
        let counts = counts_from(&[("great", 5), ("the", 5)], &[("awful", 5), ("the", 5)]);
        let ranked = FeatureSelector::default().rank(&counts);
        let words: Vec<&str> = ranked.iter().map(|s| s.word.as_str()).collect();
        assert_eq!(words, vec!["great", "awful", "the"]);
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[test]
    fn test_select_truncates_to_limit() {
        let counts = counts_from(
            &[("great", 9), ("fun", 4), ("the", 3)],
            &[("awful", 9), ("dull", 4), ("the", 3)],
        );
        let vocab = FeatureSelector::new(2).select(&counts);
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.words(), &["great".to_string(), "awful".to_string()]);
        assert!(vocab.contains("awful"));
        assert!(!vocab.contains("the"));
    }

    #[test]
    fn test_vocabulary_serializes_as_ranked_list() {
        let vocab = Vocabulary::new(vec!["great".into(), "awful".into()]);
        let json = serde_json::to_string(&vocab).unwrap();
        assert_eq!(json, r#"["great","awful"]"#);
        let back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert!(back.contains("great"));
        assert_eq!(back, vocab);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let counts = counts_from(
            &[("a", 3), ("b", 3), ("c", 7), ("d", 1)],
            &[("e", 3), ("f", 3), ("c", 1), ("d", 1)],
        );
        let selector = FeatureSelector::new(4);
        let first = selector.select(&counts);
        for _ in 0..10 {
            assert_eq!(selector.select(&counts), first);
        }
    }

    proptest! {
        #[test]
        fn prop_exclusive_frequency_increases_score(
            freq in 1u64..500,
            other_in_class in 0u64..500,
            other_class_total in 1u64..500,
            bump in 1u64..50,
            positive in any::<bool>(),
        ) {
            let (home, away) = if positive {
                (Sentiment::Positive, Sentiment::Negative)
            } else {
                (Sentiment::Negative, Sentiment::Positive)
            };
            let build = |n: u64| {
                let mut counts = WordCounts::new();
                counts.add(home, "target", n);
                counts.add(home, "filler", other_in_class);
                counts.add(away, "other", other_class_total);
                counts
            };
            let before = build(freq).combined_score("target");
            let after = build(freq + bump).combined_score("target");
            prop_assert!(after > before, "score went {} -> {}", before, after);
        }

        #[test]
        fn prop_scores_are_finite_and_non_negative(
            pos in proptest::collection::vec(0u64..50, 1..8),
            neg in proptest::collection::vec(0u64..50, 1..8),
        ) {
            let mut counts = WordCounts::new();
            for (i, &n) in pos.iter().enumerate() {
                counts.add(Sentiment::Positive, &format!("w{i}"), n);
            }
            for (i, &n) in neg.iter().enumerate() {
                counts.add(Sentiment::Negative, &format!("w{i}"), n);
            }
            for scored in FeatureSelector::default().rank(&counts) {
                prop_assert!(scored.score.is_finite());
                prop_assert!(scored.score >= 0.0);
            }
        }
    }
}
