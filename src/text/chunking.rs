//! Hierarchical document chunking with sentence-aware base chunks
//!
//! A document is split into sentence-packed base chunks, neighbouring chunks
//! get boundary-snapped overlap windows, and base chunks are optionally grouped
//! into coarser parent levels. The resulting [`ChunkHierarchy`] answers
//! relationship and context queries and can be checked with
//! [`IntegrityValidator`].

pub mod base;
pub mod chunker;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod index;
pub mod overlap;
pub mod strategy;
pub mod types;
pub mod validator;

// Re-export main public interfaces
pub use base::{BaseChunker, BoundaryUnit};
pub use chunker::{ChunkingOutput, CorpusStatistics, HierarchicalChunker, chunk_document};
pub use config::{
    ChunkingStatistics, ConfigValidation, HierarchicalChunkingConfig, SentenceBoundaryDetector,
    WordCounter,
};
pub use error::{ChunkingError, Result};
pub use hierarchy::{HierarchyBuilder, LevelStatistics};
pub use index::{ChunkHierarchy, HierarchyStatistics, OverlapBuckets, OverlapStatistics};
pub use overlap::OverlapCalculator;
pub use strategy::{ChunkingStrategy, StrategySelector, TextFeatures};
pub use types::{
    Chunk, ChunkId, ChunkOrigin, HierarchyNode, HierarchyView, MetadataValue, OverlapMetrics,
    RelationshipRecord, SentenceSpan,
};
pub use validator::{IntegrityValidator, ValidationReport};
