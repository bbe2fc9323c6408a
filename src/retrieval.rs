//! Sentence-level semantic retrieval over one document.
//!
//! [`RetrievalEngine::answer`] runs the whole pipeline for a single question:
//!
//! ```text
//! document ──segment──▶ sentences ──normalize──▶ embed (one batch) ─┐
//!                                                                   ├─▶ cosine ─▶ argmax ─▶ gate
//! question ─────────────────────▶ normalize ──▶ embed ──────────────┘
//! ```
//!
//! Scores are attributed to sentences by position, so the embedder must return
//! exactly one vector per input, in input order. Ties go to the earliest
//! sentence. A best score strictly below the threshold is answered with the
//! "not related" sentinel, but the score itself is always reported unchanged.

use serde::Serialize;
use std::sync::Arc;

use crate::analyzer::LinguisticAnalyzer;
use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, embed_one, Embedder};
use crate::error::QaError;
use crate::normalize::TextNormalizer;

/// Best scores below this are answered with [`NOT_RELATED_ANSWER`].
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;

pub const NOT_RELATED_ANSWER: &str = "This Context is not related to pdf";

/// A sentence of the document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub index: usize,
    pub text: String,
    /// Normalized form fed to the embedder; may be empty.
    pub normalized: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub answer: String,
    /// Raw cosine similarity of the best sentence, in `[-1, 1]`.
    pub similarity: f32,
    /// Position of the best-scoring sentence, reported even when gated.
    #[serde(skip)]
    pub sentence_index: usize,
}

pub struct RetrievalEngine {
    analyzer: Arc<dyn LinguisticAnalyzer>,
    normalizer: TextNormalizer,
    embedder: Arc<dyn Embedder>,
    threshold: f32,
    not_related_answer: String,
}

impl RetrievalEngine {
    pub fn new(
        analyzer: Arc<dyn LinguisticAnalyzer>,
        embedder: Arc<dyn Embedder>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            normalizer: TextNormalizer::new(Arc::clone(&analyzer)),
            analyzer,
            embedder,
            threshold: config.similarity_threshold,
            not_related_answer: config.not_related_answer.clone(),
        }
    }

    /// Splits `document` into sentences, each with its normalized form.
    pub fn segment(&self, document: &str) -> Vec<Sentence> {
        self.analyzer
            .sentences(document)
            .enumerate()
            .map(|(index, text)| Sentence {
                index,
                text: text.to_string(),
                normalized: self.normalizer.normalize(text),
            })
            .collect()
    }

    /// Answers `question` with the most similar sentence of `document`.
    ///
    /// # Errors
    ///
    /// [`QaError::EmptyDocument`] when the document has no sentences, and
    /// [`QaError::Unexpected`] when embedding fails or returns a vector count
    /// or dimensionality that does not match its input.
    pub async fn answer(&self, document: &str, question: &str) -> Result<MatchResult, QaError> {
        let sentences = self.segment(document);
        if sentences.is_empty() {
            return Err(QaError::EmptyDocument);
        }

        let query = self.normalizer.normalize(question);
        let query_vector = embed_one(self.embedder.as_ref(), &query).await?;

        let inputs: Vec<String> = sentences.iter().map(|s| s.normalized.clone()).collect();
        let sentence_vectors = self.embedder.embed(&inputs).await?;
        if sentence_vectors.len() != sentences.len() {
            return Err(anyhow::anyhow!(
                "embedder returned {} vectors for {} sentences",
                sentence_vectors.len(),
                sentences.len()
            )
            .into());
        }
        if let Some(bad) = sentence_vectors
            .iter()
            .find(|v| v.len() != query_vector.len())
        {
            return Err(anyhow::anyhow!(
                "embedding dimension mismatch: query has {}, sentence has {}",
                query_vector.len(),
                bad.len()
            )
            .into());
        }

        let scores: Vec<f32> = sentence_vectors
            .iter()
            .map(|v| cosine_similarity(&query_vector, v))
            .collect();
        let (index, similarity) =
            best_match(&scores).ok_or(QaError::EmptyDocument)?;

        tracing::debug!(
            sentences = sentences.len(),
            query = %query,
            best = index,
            similarity,
            "Ranked sentences"
        );

        let answer = if similarity >= self.threshold {
            sentences[index].text.clone()
        } else {
            self.not_related_answer.clone()
        };

        Ok(MatchResult {
            answer,
            similarity,
            sentence_index: index,
        })
    }
}

/// Index and value of the highest score; the earliest index wins ties.
/// NaN scores never win unless every score is NaN.
fn best_match(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best.or_else(|| scores.first().map(|&score| (0, score)))
}
