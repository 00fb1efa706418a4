//! Chunking strategy selection from simple text features

use serde::{Deserialize, Serialize};

/// Strategy for chunking a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Sentence-packed level-0 chunks only
    SentenceAware,
    /// Sentence-packed level 0 plus aggregated parent levels
    #[default]
    Hierarchical,
    /// Pick one of the others from text features
    Adaptive,
    /// Pure word-count windows, ignoring sentence boundaries
    FixedSize,
}

impl ChunkingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingStrategy::SentenceAware => "sentence_aware",
            ChunkingStrategy::Hierarchical => "hierarchical",
            ChunkingStrategy::Adaptive => "adaptive",
            ChunkingStrategy::FixedSize => "fixed_size",
        }
    }

    /// Whether parent levels are built on top of level 0
    pub fn builds_hierarchy(&self) -> bool {
        matches!(self, ChunkingStrategy::Hierarchical)
    }

    /// Whether level-0 chunks are cut on sentence boundaries
    pub fn respects_sentences(&self) -> bool {
        !matches!(self, ChunkingStrategy::FixedSize)
    }
}

impl std::fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Features the selector looks at
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TextFeatures {
    pub sentence_count: usize,
    pub total_words: usize,
    pub mean_sentence_words: f64,
}

impl TextFeatures {
    /// Build features from per-sentence word counts
    pub fn from_word_counts(word_counts: &[usize]) -> Self {
        let total_words: usize = word_counts.iter().sum();
        let mean_sentence_words = if word_counts.is_empty() {
            0.0
        } else {
            total_words as f64 / word_counts.len() as f64
        };
        Self {
            sentence_count: word_counts.len(),
            total_words,
            mean_sentence_words,
        }
    }
}

/// Deterministic rule set choosing a concrete strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategySelector {
    /// Documents with fewer sentences stay single-level
    pub short_document_sentences: usize,
    /// Mean sentence length (words) above which the hierarchy pays off
    pub long_sentence_words: f64,
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self {
            short_document_sentences: 5,
            long_sentence_words: 30.0,
        }
    }
}

impl StrategySelector {
    /// Choose a concrete strategy for the given features
    pub fn select(&self, features: &TextFeatures) -> ChunkingStrategy {
        if features.sentence_count == 0 {
            ChunkingStrategy::FixedSize
        } else if features.sentence_count < self.short_document_sentences {
            ChunkingStrategy::SentenceAware
        } else if features.mean_sentence_words > self.long_sentence_words {
            ChunkingStrategy::Hierarchical
        } else {
            ChunkingStrategy::SentenceAware
        }
    }

    /// Resolve `Adaptive` through [`select`](Self::select); other strategies pass through
    pub fn resolve(&self, requested: ChunkingStrategy, features: &TextFeatures) -> ChunkingStrategy {
        match requested {
            ChunkingStrategy::Adaptive => self.select(features),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_from_word_counts() {
        let features = TextFeatures::from_word_counts(&[10, 20, 30]);
        assert_eq!(features.sentence_count, 3);
        assert_eq!(features.total_words, 60);
        assert_eq!(features.mean_sentence_words, 20.0);

        let empty = TextFeatures::from_word_counts(&[]);
        assert_eq!(empty.sentence_count, 0);
        assert_eq!(empty.mean_sentence_words, 0.0);
    }

    #[test]
    fn test_short_document_is_sentence_aware() {
        let selector = StrategySelector::default();
        // long sentences, but fewer than 5 of them
        let features = TextFeatures::from_word_counts(&[50, 60, 70, 80]);
        assert_eq!(selector.select(&features), ChunkingStrategy::SentenceAware);
    }

    #[test]
    fn test_long_sentences_are_hierarchical() {
        let selector = StrategySelector::default();
        let features = TextFeatures::from_word_counts(&[31, 40, 35, 33, 32, 45]);
        assert_eq!(selector.select(&features), ChunkingStrategy::Hierarchical);
    }

    #[test]
    fn test_regular_text_is_sentence_aware() {
        let selector = StrategySelector::default();
        let features = TextFeatures::from_word_counts(&[12, 15, 9, 30, 14]);
        assert_eq!(selector.select(&features), ChunkingStrategy::SentenceAware);
    }

    #[test]
    fn test_no_sentences_is_fixed_size() {
        let selector = StrategySelector::default();
        assert_eq!(
            selector.select(&TextFeatures::default()),
            ChunkingStrategy::FixedSize
        );
    }

    #[test]
    fn test_resolve_only_touches_adaptive() {
        let selector = StrategySelector::default();
        let features = TextFeatures::from_word_counts(&[40; 10]);
        assert_eq!(
            selector.resolve(ChunkingStrategy::Adaptive, &features),
            ChunkingStrategy::Hierarchical
        );
        assert_eq!(
            selector.resolve(ChunkingStrategy::SentenceAware, &features),
            ChunkingStrategy::SentenceAware
        );
        assert_eq!(
            selector.resolve(ChunkingStrategy::FixedSize, &features),
            ChunkingStrategy::FixedSize
        );
    }

    #[test]
    fn test_strategy_properties() {
        assert!(ChunkingStrategy::Hierarchical.builds_hierarchy());
        assert!(!ChunkingStrategy::SentenceAware.builds_hierarchy());
        assert!(!ChunkingStrategy::FixedSize.builds_hierarchy());
        assert!(!ChunkingStrategy::FixedSize.respects_sentences());
        assert_eq!(ChunkingStrategy::default(), ChunkingStrategy::Hierarchical);
        assert_eq!(ChunkingStrategy::SentenceAware.to_string(), "sentence_aware");
    }
}
