//! Aggregation of sibling chunks into parent levels

use super::config::HierarchicalChunkingConfig;
use super::index::ChunkHierarchy;
use super::types::{Chunk, ChunkId, ChunkOrigin};
use serde::Serialize;
use tracing::debug;

/// Aggregate numbers for one level
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelStatistics {
    pub level: usize,
    pub chunk_count: usize,
    /// Children linked under this level's chunks
    pub total_children: usize,
    pub avg_children_per_parent: f64,
    pub total_content_len: usize,
    pub avg_content_len: f64,
}

impl LevelStatistics {
    pub fn for_level(hierarchy: &ChunkHierarchy, level: usize) -> Self {
        let mut stats = LevelStatistics {
            level,
            ..Default::default()
        };
        for chunk in hierarchy.level_chunks(level) {
            stats.chunk_count += 1;
            stats.total_content_len += chunk.content.len();
            stats.total_children += hierarchy
                .node(chunk.id())
                .map(|n| n.child_count)
                .unwrap_or(0);
        }
        if stats.chunk_count > 0 {
            stats.avg_children_per_parent = stats.total_children as f64 / stats.chunk_count as f64;
            stats.avg_content_len = stats.total_content_len as f64 / stats.chunk_count as f64;
        }
        stats
    }
}

/// Builds levels `1..max_levels` on top of the level-0 chunks of a hierarchy
#[derive(Debug, Clone)]
pub struct HierarchyBuilder<'a> {
    config: &'a HierarchicalChunkingConfig,
}

impl<'a> HierarchyBuilder<'a> {
    /// `config` is expected to be normalized already
    pub fn new(config: &'a HierarchicalChunkingConfig) -> Self {
        Self { config }
    }

    /// Add parent levels until `max_levels` is reached or a level has a single
    /// chunk. Each level is complete, links and records included, before the
    /// next one starts.
    ///
    /// Returns statistics of the levels built.
    pub fn build(&self, hierarchy: &mut ChunkHierarchy, strategy_tag: &str) -> Vec<LevelStatistics> {
        let mut built = Vec::new();
        let mut level = 0;

        while level + 1 < self.config.max_levels {
            let children = hierarchy.level_ids(level);
            if children.len() <= 1 {
                break;
            }
            let next_level = level + 1;
            let group_size = self.config.group_size(level);

            let groups: Vec<&[ChunkId]> = children.chunks(group_size).collect();
            let parents: Vec<Chunk> = groups
                .iter()
                .enumerate()
                .map(|(index, group)| {
                    let members: Vec<&Chunk> =
                        group.iter().filter_map(|id| hierarchy.get(*id)).collect();
                    let mut parent = merge_children(&members, next_level, index);
                    parent.add_metadata("group_size", group_size);
                    parent.add_metadata("strategy", strategy_tag);
                    parent
                })
                .collect();
            hierarchy.push_level(parents);

            for (index, group) in groups.iter().enumerate() {
                let parent = ChunkId::new(next_level, index);
                for child in group.iter() {
                    hierarchy.link(parent, *child);
                }
            }

            let stats = LevelStatistics::for_level(hierarchy, next_level);
            debug!(
                "Built level {}: {} parents from {} children (group size {})",
                next_level, stats.chunk_count, stats.total_children, group_size
            );
            built.push(stats);
            level = next_level;
        }
        built
    }
}

/// Merge a contiguous run of siblings into their parent.
///
/// Children are concatenated skipping any prefix of a child that lies before
/// the end already emitted. Chunk content never holds overlap text, so the
/// result equals the source slice `[first.start, last.end)`.
pub fn merge_children(children: &[&Chunk], level: usize, index: usize) -> Chunk {
    let start = children.first().map(|c| c.start_char).unwrap_or_default();
    let end = children.last().map(|c| c.end_char).unwrap_or(start);

    let mut content = String::with_capacity(end.saturating_sub(start));
    let mut emitted_end = start;
    for child in children {
        let skip = emitted_end.saturating_sub(child.start_char);
        if let Some(rest) = child.content.get(skip..) {
            content.push_str(rest);
        }
        emitted_end = emitted_end.max(child.end_char);
    }

    let mut sentence_indices: Vec<usize> = children
        .iter()
        .flat_map(|c| c.sentence_indices.iter().copied())
        .collect();
    sentence_indices.sort_unstable();
    sentence_indices.dedup();

    let mut parent = Chunk::new(
        content,
        level,
        index,
        start..end,
        sentence_indices,
        ChunkOrigin::Aggregated,
    );
    parent.overlap_start = children.first().and_then(|c| c.overlap_start);
    parent.overlap_end = children.last().and_then(|c| c.overlap_end);

    let word_count: usize = children.iter().filter_map(|c| c.word_count()).sum();
    parent.add_metadata("word_count", word_count);
    parent.add_metadata("child_count", children.len());
    parent
}
