//! Hierarchical chunking engine: sentence-aware base chunks, overlap and parent levels

use super::{
    base::{BaseChunker, BoundaryUnit, normalize_sentence_spans, word_unit_spans},
    config::{ChunkingStatistics, HierarchicalChunkingConfig, SentenceBoundaryDetector, WordCounter},
    error::{IntoChunkingError, Result},
    hierarchy::HierarchyBuilder,
    index::{ChunkHierarchy, HierarchyStatistics},
    overlap::OverlapCalculator,
    strategy::{ChunkingStrategy, StrategySelector, TextFeatures},
    types::{Chunk, ChunkId, ChunkOrigin, HierarchyView, SentenceSpan},
    validator::{IntegrityValidator, ValidationReport},
};
use crate::text::{SentenceSplitter, WhitespaceWordCounter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Hierarchical text chunker for RAG-oriented retrieval
///
/// Holds only configuration and shared collaborators. Every run returns its
/// own [`ChunkingOutput`], so one chunker can serve many documents, from
/// several threads at once.
pub struct HierarchicalChunker<D: SentenceBoundaryDetector = SentenceSplitter> {
    config: HierarchicalChunkingConfig,
    detector: Arc<D>,
    word_counter: Arc<dyn WordCounter>,
    selector: StrategySelector,
}

impl HierarchicalChunker<SentenceSplitter> {
    /// Chunker using the rule-based splitter and whitespace word counting
    pub fn new(config: HierarchicalChunkingConfig) -> Self {
        Self::with_detector(config, SentenceSplitter::default())
    }
}

impl<D: SentenceBoundaryDetector> HierarchicalChunker<D> {
    /// Chunker with an external sentence boundary detector
    pub fn with_detector(config: HierarchicalChunkingConfig, detector: D) -> Self {
        Self::with_shared_detector(config, Arc::new(detector))
    }

    pub fn with_shared_detector(config: HierarchicalChunkingConfig, detector: Arc<D>) -> Self {
        let validation = config.validate();
        if !validation.is_valid {
            debug!(
                "Configuration values will be clamped: {}",
                validation.warnings.join("; ")
            );
        }
        Self {
            config,
            detector,
            word_counter: Arc::new(WhitespaceWordCounter),
            selector: StrategySelector::default(),
        }
    }

    pub fn with_word_counter(mut self, word_counter: impl WordCounter + 'static) -> Self {
        self.word_counter = Arc::new(word_counter);
        self
    }

    pub fn with_selector(mut self, selector: StrategySelector) -> Self {
        self.selector = selector;
        self
    }

    /// Get configuration reference (as given, before clamping)
    pub fn config(&self) -> &HierarchicalChunkingConfig {
        &self.config
    }

    /// Chunk a document under a freshly generated document id
    pub fn chunk_document(&self, text: &str) -> Result<ChunkingOutput> {
        self.chunk_document_with_id(uuid::Uuid::new_v4().to_string(), text)
    }

    /// Main chunking method.
    ///
    /// Fails only when the detector fails or returns spans outside the text;
    /// every other defect degrades and is reported in the output warnings.
    pub fn chunk_document_with_id(
        &self,
        document_id: impl Into<String>,
        text: &str,
    ) -> Result<ChunkingOutput> {
        let document_id = document_id.into();
        let config = self.config.normalized();
        let mut statistics = ChunkingStatistics::new();
        let total_start = statistics.start_total_timing();
        statistics.record_input_stats(text);
        debug!(
            "Starting hierarchical chunking of {} ({} bytes)",
            document_id,
            text.len()
        );

        if text.trim().is_empty() {
            statistics.finish_total_timing(total_start);
            return Ok(ChunkingOutput {
                document_id,
                hierarchy: ChunkHierarchy::new(),
                sentence_spans: Vec::new(),
                boundary_unit: BoundaryUnit::Sentence,
                strategy: config.strategy,
                statistics,
                warnings: Vec::new(),
            });
        }

        // Step 1: sentence boundaries
        let detect_start = Instant::now();
        let raw_spans = self
            .detector
            .detect_sentence_boundaries(text)
            .into_chunking_error()?;
        let normalized = normalize_sentence_spans(text, &raw_spans)?;
        statistics.record_sentence_detection_time(detect_start.elapsed());
        statistics.sentence_count = normalized.spans.len();
        statistics.repaired_span_count = normalized.repaired;
        let mut warnings = normalized.warnings;

        // Step 2: strategy
        let sentence_texts: Vec<&str> = normalized.spans.iter().map(|s| &text[s.range()]).collect();
        let sentence_words = self.word_counter.word_count_batch(&sentence_texts);
        let features = TextFeatures::from_word_counts(&sentence_words);
        let strategy = self.selector.resolve(config.strategy, &features);
        debug!(
            "Resolved strategy {} from {} (features: {:?})",
            strategy, config.strategy, features
        );

        let (spans, unit_words, boundary_unit) =
            if !strategy.respects_sentences() || normalized.spans.is_empty() {
                if normalized.spans.is_empty() {
                    let msg = "no sentence boundaries detected, using fixed-size word windows";
                    warn!("{}: {}", document_id, msg);
                    warnings.push(msg.to_string());
                }
                let units = word_unit_spans(text);
                let words = vec![1; units.len()];
                (units, words, BoundaryUnit::Word)
            } else {
                (normalized.spans, sentence_words, BoundaryUnit::Sentence)
            };

        // Step 3: level-0 chunks
        let base_start = Instant::now();
        let mut level0 = BaseChunker::new(config.base_chunk_size).chunk(
            text,
            &spans,
            &unit_words,
            boundary_unit,
        );
        for chunk in &mut level0 {
            chunk.add_metadata("strategy", strategy.as_str());
        }
        statistics.oversized_chunks = level0
            .iter()
            .filter(|c| c.origin == ChunkOrigin::OversizedSentence)
            .count();
        statistics.record_base_chunking_time(base_start.elapsed());
        if statistics.oversized_chunks > 0 {
            debug!(
                "{} sentences exceed the {}-word budget and form their own chunks",
                statistics.oversized_chunks, config.base_chunk_size
            );
        }

        // Step 4: overlap between level-0 siblings
        let overlap_start = Instant::now();
        let boundaries: Vec<usize> = spans
            .iter()
            .map(|s| s.start)
            .chain(std::iter::once(text.len()))
            .collect();
        let regions = OverlapCalculator::new(&config).apply(text, &mut level0, &boundaries);
        statistics.record_overlap_time(overlap_start.elapsed());
        debug!("Assigned {} overlap regions", regions);

        // Step 5: parent levels
        let hierarchy_start = Instant::now();
        let mut hierarchy = ChunkHierarchy::new();
        hierarchy.push_level(level0);
        if strategy.builds_hierarchy() {
            HierarchyBuilder::new(&config).build(&mut hierarchy, strategy.as_str());
        }
        statistics.record_hierarchy_time(hierarchy_start.elapsed());

        let hierarchy_stats = hierarchy.get_hierarchy_statistics();
        for level in &hierarchy_stats.per_level {
            statistics.record_level(level.level, level.chunk_count);
        }
        statistics.chunks_with_overlap = hierarchy_stats.overlap.chunks_with_overlap;
        statistics.finish_total_timing(total_start);
        statistics.calculate_derived_metrics();

        info!(
            "Chunked {}: {} chunks over {} levels ({} strategy, {} warnings)",
            document_id,
            hierarchy.len(),
            hierarchy_stats.level_count(),
            strategy,
            warnings.len()
        );
        debug!("{}", statistics.summary());

        Ok(ChunkingOutput {
            document_id,
            hierarchy,
            sentence_spans: spans,
            boundary_unit,
            strategy,
            statistics,
            warnings,
        })
    }

    /// Chunk several `(document_id, text)` pairs; stops at the first failure
    pub fn batch_chunk_documents(&self, documents: &[(&str, &str)]) -> Result<Vec<ChunkingOutput>> {
        let batch_start = Instant::now();
        let mut results = Vec::with_capacity(documents.len());
        let mut total_input_chars = 0;
        let mut total_output_chunks = 0;

        for (document_id, text) in documents {
            total_input_chars += text.len();
            let output = self
                .chunk_document_with_id(*document_id, text)
                .inspect_err(|e| warn!("Chunking {} failed ({}): {}", document_id, e.category(), e))?;
            total_output_chunks += output.chunks().len();
            results.push(output);
        }

        info!(
            "Batch processing completed: {} documents, {} total chars, {} total chunks in {:.2}ms",
            documents.len(),
            total_input_chars,
            total_output_chunks,
            batch_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(results)
    }
}

/// Chunk `text` with the default splitter and word counter
pub fn chunk_document(text: &str, config: &HierarchicalChunkingConfig) -> Result<ChunkingOutput> {
    HierarchicalChunker::new(config.clone()).chunk_document(text)
}

/// Everything one chunking run produced
#[derive(Debug, Clone)]
pub struct ChunkingOutput {
    document_id: String,
    hierarchy: ChunkHierarchy,
    sentence_spans: Vec<SentenceSpan>,
    boundary_unit: BoundaryUnit,
    strategy: ChunkingStrategy,
    statistics: ChunkingStatistics,
    warnings: Vec<String>,
}

impl ChunkingOutput {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// All chunks, level 0 first, each level in index order
    pub fn chunks(&self) -> &[Chunk] {
        self.hierarchy.chunks()
    }

    pub fn leaf_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hierarchy.level_chunks(0)
    }

    pub fn hierarchy(&self) -> &ChunkHierarchy {
        &self.hierarchy
    }

    pub fn into_hierarchy(self) -> ChunkHierarchy {
        self.hierarchy
    }

    pub fn get_chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.hierarchy.get(id)
    }

    pub fn get_chunk_hierarchy(&self, id: ChunkId) -> Option<HierarchyView> {
        self.hierarchy.get_relationships(id)
    }

    /// Neighbors within `window`, then parent, then children, resolved to chunks
    pub fn get_contextual_chunks(&self, id: ChunkId, window: usize) -> Vec<&Chunk> {
        self.hierarchy
            .get_contextual_chunks(id, window)
            .into_iter()
            .filter_map(|id| self.hierarchy.get(id))
            .collect()
    }

    pub fn validate_hierarchy(&self) -> ValidationReport {
        IntegrityValidator::new().validate(&self.hierarchy)
    }

    pub fn get_hierarchy_statistics(&self) -> HierarchyStatistics {
        self.hierarchy.get_hierarchy_statistics()
    }

    /// Spans level-0 chunks were packed from: sentences, or word units when
    /// [`boundary_unit`](Self::boundary_unit) is `Word`
    pub fn sentence_spans(&self) -> &[SentenceSpan] {
        &self.sentence_spans
    }

    pub fn boundary_unit(&self) -> BoundaryUnit {
        self.boundary_unit
    }

    /// Strategy actually applied (`Adaptive` already resolved)
    pub fn strategy(&self) -> ChunkingStrategy {
        self.strategy
    }

    pub fn statistics(&self) -> &ChunkingStatistics {
        &self.statistics
    }

    /// Repairs and fallbacks applied during the run
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Hierarchy statistics of many runs, keyed by document id
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusStatistics {
    documents: BTreeMap<String, HierarchyStatistics>,
}

impl CorpusStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_outputs<'a>(outputs: impl IntoIterator<Item = &'a ChunkingOutput>) -> Self {
        let mut corpus = Self::new();
        for output in outputs {
            corpus.add(output);
        }
        corpus
    }

    /// Record a run; a later run of the same document id replaces the earlier one
    pub fn add(&mut self, output: &ChunkingOutput) {
        let replaced = self
            .documents
            .insert(output.document_id.clone(), output.get_hierarchy_statistics());
        if replaced.is_some() {
            debug!("Replaced statistics of document {}", output.document_id);
        }
    }

    pub fn document(&self, document_id: &str) -> Option<&HierarchyStatistics> {
        self.documents.get(document_id)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn total_chunks(&self) -> usize {
        self.documents.values().map(|s| s.total_chunks).sum()
    }

    pub fn total_leaf_chunks(&self) -> usize {
        self.documents.values().map(|s| s.leaf_chunks).sum()
    }

    pub fn chunks_with_overlap(&self) -> usize {
        self.documents
            .values()
            .map(|s| s.overlap.chunks_with_overlap)
            .sum()
    }

    /// Deepest hierarchy across documents, in levels
    pub fn max_level_count(&self) -> usize {
        self.documents
            .values()
            .map(HierarchyStatistics::level_count)
            .max()
            .unwrap_or(0)
    }
}
