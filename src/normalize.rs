//! Text normalization ahead of embedding.

use std::sync::Arc;

use crate::analyzer::LinguisticAnalyzer;

/// Reduces text to its content-bearing lemmas.
#[derive(Clone)]
pub struct TextNormalizer {
    analyzer: Arc<dyn LinguisticAnalyzer>,
}

impl TextNormalizer {
    pub fn new(analyzer: Arc<dyn LinguisticAnalyzer>) -> Self {
        Self { analyzer }
    }

    /// Drops punctuation and stop-words, lowercases the lemma of every other
    /// token, and joins them with single spaces in input order.
    ///
    /// Returns an empty string when nothing survives.
    pub fn normalize(&self, text: &str) -> String {
        self.analyzer
            .tokenize(text)
            .into_iter()
            .filter(|token| !token.is_punct && !token.is_stop)
            .map(|token| token.lemma.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
