//! Configuration and collaborator traits for hierarchical text chunking

use super::error::{ChunkingError, Result};
use super::strategy::ChunkingStrategy;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Sentence boundary detection capability
///
/// Implementations return ordered, non-overlapping, non-empty byte spans
/// covering every sentence of `text`. Small defects (out of order, overlapping,
/// empty spans) are repaired by the chunker; spans outside the text or off a
/// char boundary abort the run.
pub trait SentenceBoundaryDetector: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn detect_sentence_boundaries(&self, text: &str)
    -> std::result::Result<Vec<(usize, usize)>, Self::Error>;
}

/// Word counting used for budget accounting only
///
/// Any tokenizer works as long as it is consistent within a run.
pub trait WordCounter: Send + Sync {
    fn word_count(&self, text: &str) -> usize;

    /// Count words for several texts (optional optimization)
    fn word_count_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|text| self.word_count(text)).collect()
    }
}

/// Configuration for hierarchical text chunking
///
/// Out-of-range values are never rejected: [`normalized`](Self::normalized)
/// clamps them before each run and [`validate`](Self::validate) reports what
/// would be changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalChunkingConfig {
    /// Word budget of a level-0 chunk
    pub base_chunk_size: usize,
    /// Overlap target as a fraction of the neighbor's length, in `[0, 0.5]`
    pub overlap_percentage: f64,
    /// Lower bound of an overlap region in bytes
    pub min_overlap_chars: usize,
    /// Upper bound of an overlap region in bytes
    pub max_overlap_chars: usize,
    /// Number of levels including level 0
    pub max_levels: usize,
    /// Group size factor per child level (`group = max(2, round(2 * m))`)
    pub level_size_multipliers: Vec<f64>,
    pub strategy: ChunkingStrategy,
}

impl Default for HierarchicalChunkingConfig {
    fn default() -> Self {
        Self {
            base_chunk_size: 200,
            overlap_percentage: 0.1,
            min_overlap_chars: 50,
            max_overlap_chars: 200,
            max_levels: 3,
            level_size_multipliers: Self::DEFAULT_LEVEL_SIZE_MULTIPLIERS.to_vec(),
            strategy: ChunkingStrategy::Hierarchical,
        }
    }
}

/// Outcome of a configuration check
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigValidation {
    /// False when any value would be clamped before chunking
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl HierarchicalChunkingConfig {
    pub const MAX_OVERLAP_PERCENTAGE: f64 = 0.5;
    pub const DEFAULT_LEVEL_SIZE_MULTIPLIERS: [f64; 3] = [1.0, 2.0, 4.0];
    pub const ENV_PREFIX: &'static str = "CHUNKING_";

    /// Create configuration for embedding generation with the given word budget
    pub fn for_embedding(base_chunk_size: usize) -> Self {
        Self {
            base_chunk_size,
            overlap_percentage: 0.15,
            min_overlap_chars: 32,
            max_overlap_chars: 256,
            ..Default::default()
        }
    }

    /// Single-level sentence-aware chunking
    pub fn flat() -> Self {
        Self {
            max_levels: 1,
            strategy: ChunkingStrategy::SentenceAware,
            ..Default::default()
        }
    }

    /// Load from `CHUNKING_*` environment variables, defaults for the rest
    pub fn from_env() -> Result<Self> {
        envy::prefixed(Self::ENV_PREFIX)
            .from_env::<Self>()
            .map_err(ChunkingError::from)
    }

    /// Load from explicit `CHUNKING_*` key/value pairs
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(Self::ENV_PREFIX)
            .from_iter::<_, Self>(vars)
            .map_err(ChunkingError::from)
    }

    /// Copy with every value clamped into its valid range
    pub fn normalized(&self) -> Self {
        let overlap_percentage = if self.overlap_percentage.is_finite() {
            self.overlap_percentage
                .clamp(0.0, Self::MAX_OVERLAP_PERCENTAGE)
        } else {
            Self::default().overlap_percentage
        };
        let level_size_multipliers = self
            .level_size_multipliers
            .iter()
            .map(|m| if m.is_finite() && *m > 0.0 { *m } else { 1.0 })
            .collect();

        Self {
            base_chunk_size: self.base_chunk_size.max(1),
            overlap_percentage,
            min_overlap_chars: self.min_overlap_chars,
            max_overlap_chars: self.max_overlap_chars.max(self.min_overlap_chars),
            max_levels: self.max_levels.max(1),
            level_size_multipliers,
            strategy: self.strategy,
        }
    }

    /// Report out-of-range values and advisory recommendations without failing
    pub fn validate(&self) -> ConfigValidation {
        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        if self.base_chunk_size == 0 {
            warnings.push("base_chunk_size must be at least 1, clamped to 1".to_string());
        }
        if !self.overlap_percentage.is_finite() {
            warnings.push(format!(
                "overlap_percentage {} is not a number, replaced by {}",
                self.overlap_percentage,
                Self::default().overlap_percentage
            ));
        } else if !(0.0..=Self::MAX_OVERLAP_PERCENTAGE).contains(&self.overlap_percentage) {
            warnings.push(format!(
                "overlap_percentage {} outside [0, {}], clamped",
                self.overlap_percentage,
                Self::MAX_OVERLAP_PERCENTAGE
            ));
        }
        if self.max_overlap_chars < self.min_overlap_chars {
            warnings.push(format!(
                "max_overlap_chars {} below min_overlap_chars {}, raised to {}",
                self.max_overlap_chars, self.min_overlap_chars, self.min_overlap_chars
            ));
        }
        if self.max_levels == 0 {
            warnings.push("max_levels must be at least 1, clamped to 1".to_string());
        }
        for (level, m) in self.level_size_multipliers.iter().enumerate() {
            if !m.is_finite() || *m <= 0.0 {
                warnings.push(format!(
                    "level_size_multipliers[{level}] = {m} is not positive, replaced by 1.0"
                ));
            }
        }

        if self.base_chunk_size > 0 && self.base_chunk_size < 20 {
            recommendations.push(format!(
                "base_chunk_size {} is very small; 50-300 words usually retrieves better",
                self.base_chunk_size
            ));
        }
        if self.overlap_percentage > 0.3 && self.overlap_percentage.is_finite() {
            recommendations.push(
                "overlap_percentage above 0.3 duplicates a large share of the text".to_string(),
            );
        }
        if self.min_overlap_chars == 0 && self.overlap_percentage == 0.0 {
            recommendations.push(
                "overlap is disabled; context across chunk boundaries will be lost".to_string(),
            );
        }
        if self.max_levels > 5 {
            recommendations.push(format!(
                "max_levels {} is deep; levels above 5 rarely add retrievable context",
                self.max_levels
            ));
        }
        let configured = self.level_size_multipliers.len();
        if self.max_levels > 1 && configured + 1 < self.max_levels {
            recommendations.push(format!(
                "level_size_multipliers covers {configured} levels; levels beyond that use default group sizes"
            ));
        }
        if self.strategy == ChunkingStrategy::FixedSize {
            recommendations.push(
                "fixed_size ignores sentence boundaries; prefer it only when no detector is available"
                    .to_string(),
            );
        }

        ConfigValidation {
            is_valid: warnings.is_empty(),
            warnings,
            recommendations,
        }
    }

    /// Number of children per parent when building level `child_level + 1`
    pub fn group_size(&self, child_level: usize) -> usize {
        match self.level_size_multipliers.get(child_level) {
            Some(m) => ((2.0 * m).round() as usize).max(2),
            None if child_level == 0 => 2,
            None => 3,
        }
    }

    /// Overlap target for a neighbor of `neighbor_len` bytes
    pub fn target_overlap(&self, neighbor_len: usize) -> usize {
        let raw = (self.overlap_percentage * neighbor_len as f64).round() as usize;
        raw.clamp(self.min_overlap_chars, self.max_overlap_chars.max(self.min_overlap_chars))
    }
}

/// Per-run performance and size information
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkingStatistics {
    pub total_processing_time: Duration,
    pub sentence_detection_time: Duration,
    pub base_chunking_time: Duration,
    pub overlap_time: Duration,
    pub hierarchy_time: Duration,

    pub input_char_count: usize,
    pub input_line_count: usize,
    pub sentence_count: usize,
    /// Spans dropped or clamped while normalising detector output
    pub repaired_span_count: usize,

    pub total_chunks_created: usize,
    /// Chunk count per level, level 0 first
    pub level_chunk_counts: Vec<usize>,
    pub oversized_chunks: usize,
    pub chunks_with_overlap: usize,

    pub chars_per_second: f32,
    pub chunks_per_second: f32,
}

impl ChunkingStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_total_timing(&mut self) -> Instant {
        Instant::now()
    }

    pub fn finish_total_timing(&mut self, start: Instant) {
        self.total_processing_time = start.elapsed();
    }

    pub fn record_sentence_detection_time(&mut self, duration: Duration) {
        self.sentence_detection_time += duration;
    }

    pub fn record_base_chunking_time(&mut self, duration: Duration) {
        self.base_chunking_time += duration;
    }

    pub fn record_overlap_time(&mut self, duration: Duration) {
        self.overlap_time += duration;
    }

    pub fn record_hierarchy_time(&mut self, duration: Duration) {
        self.hierarchy_time += duration;
    }

    pub fn record_input_stats(&mut self, text: &str) {
        self.input_char_count = text.len();
        self.input_line_count = text.lines().count();
    }

    /// Record the chunks produced for one level
    pub fn record_level(&mut self, level: usize, chunk_count: usize) {
        if self.level_chunk_counts.len() <= level {
            self.level_chunk_counts.resize(level + 1, 0);
        }
        self.level_chunk_counts[level] += chunk_count;
        self.total_chunks_created += chunk_count;
    }

    /// Calculate derived metrics (call this after all processing is complete)
    pub fn calculate_derived_metrics(&mut self) {
        let total_seconds = self.total_processing_time.as_secs_f32();
        if total_seconds > 0.0 {
            self.chars_per_second = self.input_char_count as f32 / total_seconds;
            self.chunks_per_second = self.total_chunks_created as f32 / total_seconds;
        }
    }

    /// Get summary as string for logging
    pub fn summary(&self) -> String {
        format!(
            "Chunking Stats: {} chars, {} sentences -> {} chunks over {} levels ({} oversized, {} with overlap) in {:.2}ms | \
            detect {:.2}ms, base {:.2}ms, overlap {:.2}ms, hierarchy {:.2}ms | {:.0} chars/s",
            self.input_char_count,
            self.sentence_count,
            self.total_chunks_created,
            self.level_chunk_counts.len(),
            self.oversized_chunks,
            self.chunks_with_overlap,
            self.total_processing_time.as_secs_f64() * 1000.0,
            self.sentence_detection_time.as_secs_f64() * 1000.0,
            self.base_chunking_time.as_secs_f64() * 1000.0,
            self.overlap_time.as_secs_f64() * 1000.0,
            self.hierarchy_time.as_secs_f64() * 1000.0,
            self.chars_per_second,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HierarchicalChunkingConfig::default();
        assert_eq!(config.base_chunk_size, 200);
        assert_eq!(config.max_levels, 3);
        assert_eq!(config.level_size_multipliers, vec![1.0, 2.0, 4.0]);
        assert_eq!(config.strategy, ChunkingStrategy::Hierarchical);
        assert!(config.validate().is_valid);
    }

    #[test]
    fn test_normalization_clamps_out_of_range_values() {
        let config = HierarchicalChunkingConfig {
            base_chunk_size: 0,
            overlap_percentage: 0.9,
            min_overlap_chars: 80,
            max_overlap_chars: 10,
            max_levels: 0,
            level_size_multipliers: vec![1.0, -3.0, f64::NAN],
            ..Default::default()
        };

        let normalized = config.normalized();
        assert_eq!(normalized.base_chunk_size, 1);
        assert_eq!(normalized.overlap_percentage, 0.5);
        assert_eq!(normalized.max_overlap_chars, 80);
        assert_eq!(normalized.max_levels, 1);
        assert_eq!(normalized.level_size_multipliers, vec![1.0, 1.0, 1.0]);
        assert!(normalized.validate().is_valid);

        let nan = HierarchicalChunkingConfig {
            overlap_percentage: f64::NAN,
            ..Default::default()
        };
        assert_eq!(nan.normalized().overlap_percentage, 0.1);
    }

    #[test]
    fn test_validation_reports_without_failing() {
        let config = HierarchicalChunkingConfig {
            base_chunk_size: 0,
            overlap_percentage: -0.2,
            max_overlap_chars: 10,
            min_overlap_chars: 20,
            ..Default::default()
        };

        let report = config.validate();
        assert!(!report.is_valid);
        assert_eq!(report.warnings.len(), 3, "warnings: {:?}", report.warnings);
        assert!(report.warnings.iter().any(|w| w.contains("base_chunk_size")));
        assert!(report.warnings.iter().any(|w| w.contains("overlap_percentage")));
        assert!(report.warnings.iter().any(|w| w.contains("max_overlap_chars")));
    }

    #[test]
    fn test_validation_recommendations() {
        let config = HierarchicalChunkingConfig {
            base_chunk_size: 10,
            overlap_percentage: 0.4,
            max_levels: 7,
            ..Default::default()
        };

        let report = config.validate();
        assert!(report.is_valid);
        assert!(report.recommendations.iter().any(|r| r.contains("very small")));
        assert!(report.recommendations.iter().any(|r| r.contains("0.3")));
        assert!(report.recommendations.iter().any(|r| r.contains("deep")));
        assert!(
            report
                .recommendations
                .iter()
                .any(|r| r.contains("default group sizes"))
        );
    }

    #[test]
    fn test_group_size() {
        let config = HierarchicalChunkingConfig::default();
        assert_eq!(config.group_size(0), 2);
        assert_eq!(config.group_size(1), 4);
        assert_eq!(config.group_size(2), 8);
        // beyond the configured list
        assert_eq!(config.group_size(3), 3);

        let empty = HierarchicalChunkingConfig {
            level_size_multipliers: vec![],
            ..Default::default()
        };
        assert_eq!(empty.group_size(0), 2);
        assert_eq!(empty.group_size(1), 3);

        let tiny = HierarchicalChunkingConfig {
            level_size_multipliers: vec![0.2, 1.6],
            ..Default::default()
        };
        assert_eq!(tiny.group_size(0), 2);
        assert_eq!(tiny.group_size(1), 3);
    }

    #[test]
    fn test_target_overlap() {
        let config = HierarchicalChunkingConfig {
            overlap_percentage: 0.1,
            min_overlap_chars: 20,
            max_overlap_chars: 100,
            ..Default::default()
        };
        assert_eq!(config.target_overlap(50), 20);
        assert_eq!(config.target_overlap(500), 50);
        assert_eq!(config.target_overlap(5000), 100);
    }

    #[test]
    fn test_presets() {
        let embedding = HierarchicalChunkingConfig::for_embedding(128);
        assert_eq!(embedding.base_chunk_size, 128);
        assert!(embedding.validate().is_valid);

        let flat = HierarchicalChunkingConfig::flat();
        assert_eq!(flat.max_levels, 1);
        assert_eq!(flat.strategy, ChunkingStrategy::SentenceAware);
    }

    #[test]
    fn test_config_from_vars() {
        let vars = vec![
            ("CHUNKING_BASE_CHUNK_SIZE".to_string(), "64".to_string()),
            ("CHUNKING_OVERLAP_PERCENTAGE".to_string(), "0.2".to_string()),
            ("CHUNKING_MAX_LEVELS".to_string(), "4".to_string()),
            (
                "CHUNKING_LEVEL_SIZE_MULTIPLIERS".to_string(),
                "1.0,1.5".to_string(),
            ),
            ("CHUNKING_STRATEGY".to_string(), "adaptive".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];

        let config = HierarchicalChunkingConfig::from_vars(vars).unwrap();
        assert_eq!(config.base_chunk_size, 64);
        assert_eq!(config.overlap_percentage, 0.2);
        assert_eq!(config.max_levels, 4);
        assert_eq!(config.level_size_multipliers, vec![1.0, 1.5]);
        assert_eq!(config.strategy, ChunkingStrategy::Adaptive);
        // untouched fields keep defaults
        assert_eq!(config.min_overlap_chars, 50);
    }

    #[test]
    fn test_config_from_vars_rejects_garbage() {
        let vars = vec![(
            "CHUNKING_BASE_CHUNK_SIZE".to_string(),
            "lots".to_string(),
        )];
        let error = HierarchicalChunkingConfig::from_vars(vars).unwrap_err();
        assert!(matches!(error, ChunkingError::Environment(_)));
    }

    #[test]
    fn test_chunking_statistics() {
        let mut stats = ChunkingStatistics::new();

        let text = "Line one.\nLine two.";
        stats.record_input_stats(text);
        assert_eq!(stats.input_char_count, text.len());
        assert_eq!(stats.input_line_count, 2);

        stats.record_level(0, 8);
        stats.record_level(1, 4);
        stats.record_level(2, 1);
        stats.record_base_chunking_time(Duration::from_millis(3));
        stats.record_overlap_time(Duration::from_millis(1));
        stats.total_processing_time = Duration::from_millis(10);
        stats.calculate_derived_metrics();

        assert_eq!(stats.total_chunks_created, 13);
        assert_eq!(stats.level_chunk_counts, vec![8, 4, 1]);
        assert!(stats.chars_per_second > 0.0);

        let summary = stats.summary();
        assert!(summary.contains("13 chunks"));
        assert!(summary.contains("3 levels"));
    }
}
