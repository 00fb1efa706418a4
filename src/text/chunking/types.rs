//! Core data structures for hierarchical text chunking

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

/// Identifier of a chunk within one chunking run: `(level, index)`.
///
/// Only unique inside a single document's run. Do not use it as a key across
/// documents; pair it with the run's document id instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    pub level: usize,
    pub index: usize,
}

impl ChunkId {
    pub fn new(level: usize, index: usize) -> Self {
        Self { level, index }
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}#{}", self.level, self.index)
    }
}

/// A sentence span in byte offsets, after normalisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceSpan {
    pub start: usize,
    pub end: usize,
}

impl SentenceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Advisory metadata value. Never carries invariant-bearing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl MetadataValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// How a chunk came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOrigin {
    /// One or more whole sentences packed under the word budget
    SentencePacked,
    /// A single sentence that alone exceeds the word budget
    OversizedSentence,
    /// Word-count window, produced without sentence boundaries
    WordWindow,
    /// Union of child chunks at the level below
    Aggregated,
}

impl ChunkOrigin {
    /// Whether both ends of the chunk sit on sentence boundaries
    pub fn preserves_sentences(&self) -> bool {
        !matches!(self, ChunkOrigin::WordWindow)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChunkOrigin::SentencePacked => "Packed sentences",
            ChunkOrigin::OversizedSentence => "Oversized single sentence",
            ChunkOrigin::WordWindow => "Fixed word window",
            ChunkOrigin::Aggregated => "Aggregated children",
        }
    }
}

impl std::fmt::Display for ChunkOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// The atomic unit of a chunking run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text covered by `[start_char, end_char)`; never includes overlap regions
    pub content: String,
    /// Position among siblings at this level
    pub index: usize,
    /// Hierarchy depth, 0 = leaf
    pub level: usize,
    /// Back-reference to the parent at `level + 1`
    pub parent_id: Option<ChunkId>,
    /// Byte offset (inclusive) into the source text
    pub start_char: usize,
    /// Byte offset (exclusive) into the source text
    pub end_char: usize,
    /// First sentence covered (inclusive)
    pub start_sentence: usize,
    /// Last sentence covered (inclusive)
    pub end_sentence: usize,
    /// Sorted sentence indices covered
    pub sentence_indices: Vec<usize>,
    /// Start of the region shared with the previous sibling
    pub overlap_start: Option<usize>,
    /// End of the region shared with the next sibling
    pub overlap_end: Option<usize>,
    pub origin: ChunkOrigin,
    /// Advisory annotations (word count, strategy tag, group size, ...)
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Chunk {
    /// Create a chunk with no parent, overlap or metadata
    pub fn new(
        content: String,
        level: usize,
        index: usize,
        char_range: Range<usize>,
        sentence_indices: Vec<usize>,
        origin: ChunkOrigin,
    ) -> Self {
        let start_sentence = sentence_indices.first().copied().unwrap_or_default();
        let end_sentence = sentence_indices.last().copied().unwrap_or(start_sentence);
        Self {
            content,
            index,
            level,
            parent_id: None,
            start_char: char_range.start,
            end_char: char_range.end,
            start_sentence,
            end_sentence,
            sentence_indices,
            overlap_start: None,
            overlap_end: None,
            origin,
            metadata: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ChunkId {
        ChunkId::new(self.level, self.index)
    }

    /// Length of the chunk span in bytes
    pub fn char_length(&self) -> usize {
        self.end_char.saturating_sub(self.start_char)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn char_range(&self) -> (usize, usize) {
        (self.start_char, self.end_char)
    }

    /// Bytes shared with the previous sibling
    pub fn backward_overlap(&self) -> usize {
        self.overlap_start
            .map(|s| self.start_char.saturating_sub(s))
            .unwrap_or(0)
    }

    /// Bytes shared with the next sibling
    pub fn forward_overlap(&self) -> usize {
        self.overlap_end
            .map(|e| e.saturating_sub(self.end_char))
            .unwrap_or(0)
    }

    pub fn has_overlap(&self) -> bool {
        self.overlap_start.is_some() || self.overlap_end.is_some()
    }

    /// Span including both overlap regions
    pub fn context_range(&self) -> Range<usize> {
        self.overlap_start.unwrap_or(self.start_char)..self.overlap_end.unwrap_or(self.end_char)
    }

    /// Chunk text extended by its overlap regions, sliced from the source text.
    ///
    /// Returns `None` when `source` is not the text this chunk was cut from.
    pub fn content_with_overlap<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.context_range())
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Word count recorded at creation time, if any
    pub fn word_count(&self) -> Option<usize> {
        self.get_metadata("word_count")
            .and_then(MetadataValue::as_int)
            .map(|v| v as usize)
    }
}

/// Structural links of one chunk inside a hierarchy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub parent: Option<ChunkId>,
    pub children: Vec<ChunkId>,
    pub child_count: usize,
    /// Summed content length of the children (own length for leaves)
    pub total_content_len: usize,
}

/// Overlap counters of one chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlapMetrics {
    pub backward_overlap_chars: usize,
    pub forward_overlap_chars: usize,
    /// `(backward + forward) / content length`
    pub actual_overlap_ratio: f64,
}

impl OverlapMetrics {
    pub fn total(&self) -> usize {
        self.backward_overlap_chars + self.forward_overlap_chars
    }
}

/// Sibling relationships of one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    /// Siblings whose text this chunk's overlap regions reach into
    pub overlaps_with: Vec<ChunkId>,
    /// Siblings whose overlap regions reach into this chunk
    pub overlapped_by: Vec<ChunkId>,
    pub adjacent_chunks: Vec<ChunkId>,
    pub overlap_metrics: OverlapMetrics,
}

/// Result of a relationship lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyView {
    pub id: ChunkId,
    pub parent: Option<ChunkId>,
    pub children: Vec<ChunkId>,
    pub siblings: Vec<ChunkId>,
    pub descendants: Vec<ChunkId>,
    pub overlap_metrics: OverlapMetrics,
}
