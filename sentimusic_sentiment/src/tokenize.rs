// Word tokenization shared by training and classification.
//
// Both sides must normalize identically or the vocabulary lookup silently
// misses: lowercase, split on anything that is not alphanumeric or an
// apostrophe, strip leading/trailing apostrophes, drop empties.

/// Split text into lowercase word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|s| s.trim_matches('\''))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits_punctuation() {
        assert_eq!(
            tokenize("This movie was GREAT, truly!"),
            vec!["this", "movie", "was", "great", "truly"]
        );
    }

    #[test]
    fn keeps_inner_apostrophes() {
        assert_eq!(tokenize("'Don't' stop"), vec!["don't", "stop"]);
    }

    #[test]
    fn empty_and_symbol_only_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" -- ... ''").is_empty());
    }
}
