//! Arena holding every chunk of one run with its links and relationship records

use super::hierarchy::LevelStatistics;
use super::overlap::build_relationship_records;
use super::types::{Chunk, ChunkId, HierarchyNode, HierarchyView, RelationshipRecord};
use itertools::Itertools;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// Chunks of one document, level 0 first, with parallel node and
/// relationship tables addressed by arena position
#[derive(Debug, Clone, Default)]
pub struct ChunkHierarchy {
    pub(crate) chunks: Vec<Chunk>,
    pub(crate) nodes: Vec<HierarchyNode>,
    pub(crate) relationships: Vec<RelationshipRecord>,
    pub(crate) positions: HashMap<ChunkId, usize>,
}

/// Overlap ratio histogram over chunks that have any overlap
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OverlapBuckets {
    /// `[0, 0.05)`
    pub under_5_percent: usize,
    /// `[0.05, 0.15)`
    pub from_5_to_15_percent: usize,
    /// `[0.15, 0.30)`
    pub from_15_to_30_percent: usize,
    /// `[0.30, ..)`
    pub over_30_percent: usize,
}

impl OverlapBuckets {
    fn add(&mut self, ratio: f64) {
        if ratio < 0.05 {
            self.under_5_percent += 1;
        } else if ratio < 0.15 {
            self.from_5_to_15_percent += 1;
        } else if ratio < 0.30 {
            self.from_15_to_30_percent += 1;
        } else {
            self.over_30_percent += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.under_5_percent
            + self.from_5_to_15_percent
            + self.from_15_to_30_percent
            + self.over_30_percent
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlapStatistics {
    pub chunks_with_overlap: usize,
    /// `chunks_with_overlap / total_chunks`
    pub overlap_fraction: f64,
    pub buckets: OverlapBuckets,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HierarchyStatistics {
    pub total_chunks: usize,
    /// Distinct levels present, ascending
    pub levels: Vec<usize>,
    /// Chunks with at least one child
    pub parent_chunks: usize,
    pub leaf_chunks: usize,
    pub per_level: Vec<LevelStatistics>,
    pub overlap: OverlapStatistics,
}

impl HierarchyStatistics {
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

impl ChunkHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an arena from stored chunks.
    ///
    /// Child lists are derived from each chunk's `parent_id`; links to ids that
    /// are not present are left for the validator to report.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let mut hierarchy = Self::new();
        let by_level = chunks
            .into_iter()
            .sorted_by_key(Chunk::id)
            .chunk_by(|c| c.level);
        for (_, level) in &by_level {
            hierarchy.push_level(level.collect());
        }

        let links: Vec<(ChunkId, ChunkId)> = hierarchy
            .chunks
            .iter()
            .filter_map(|c| c.parent_id.map(|p| (p, c.id())))
            .collect();
        for (parent, child) in links {
            hierarchy.attach(parent, child);
        }
        hierarchy
    }

    /// Append one level of siblings, ordered by index, with their relationship
    /// records. Chunks keep whatever `parent_id` they carry.
    pub fn push_level(&mut self, chunks: Vec<Chunk>) {
        let records = build_relationship_records(&chunks);
        for (chunk, record) in chunks.into_iter().zip(records) {
            self.positions.insert(chunk.id(), self.chunks.len());
            self.nodes.push(HierarchyNode {
                parent: chunk.parent_id,
                children: Vec::new(),
                child_count: 0,
                total_content_len: chunk.content.len(),
            });
            self.relationships.push(record);
            self.chunks.push(chunk);
        }
    }

    /// Link `child` under `parent` in both directions.
    ///
    /// Returns false when either id is unknown.
    pub fn link(&mut self, parent: ChunkId, child: ChunkId) -> bool {
        let Some(&child_pos) = self.positions.get(&child) else {
            return false;
        };
        if !self.positions.contains_key(&parent) {
            return false;
        }
        self.chunks[child_pos].parent_id = Some(parent);
        self.nodes[child_pos].parent = Some(parent);
        self.attach(parent, child)
    }

    /// Add `child` to the parent's node only
    fn attach(&mut self, parent: ChunkId, child: ChunkId) -> bool {
        let (Some(&parent_pos), Some(&child_pos)) =
            (self.positions.get(&parent), self.positions.get(&child))
        else {
            return false;
        };
        let child_len = self.chunks[child_pos].content.len();
        let node = &mut self.nodes[parent_pos];
        if node.children.is_empty() {
            node.total_content_len = 0;
        }
        node.children.push(child);
        node.child_count = node.children.len();
        node.total_content_len += child_len;
        true
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, id: ChunkId) -> bool {
        self.positions.contains_key(&id)
    }

    /// All chunks, level 0 first, each level ordered by index
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        self.positions.get(&id).map(|&pos| &self.chunks[pos])
    }

    pub fn node(&self, id: ChunkId) -> Option<&HierarchyNode> {
        self.positions.get(&id).map(|&pos| &self.nodes[pos])
    }

    pub fn relationship(&self, id: ChunkId) -> Option<&RelationshipRecord> {
        self.positions.get(&id).map(|&pos| &self.relationships[pos])
    }

    /// Chunks of one level in index order
    pub fn level_chunks(&self, level: usize) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(move |c| c.level == level)
    }

    /// Ids of one level in index order
    pub fn level_ids(&self, level: usize) -> Vec<ChunkId> {
        self.level_chunks(level).map(Chunk::id).collect()
    }

    /// Highest level present
    pub fn top_level(&self) -> Option<usize> {
        self.chunks.iter().map(|c| c.level).max()
    }

    /// Chunks without a parent
    pub fn roots(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|c| c.parent_id.is_none())
    }

    /// Parent, children, siblings, descendants and overlap metrics of a chunk
    pub fn get_relationships(&self, id: ChunkId) -> Option<HierarchyView> {
        let pos = *self.positions.get(&id)?;
        let chunk = &self.chunks[pos];
        let node = &self.nodes[pos];

        let siblings = chunk
            .parent_id
            .and_then(|p| self.node(p))
            .map(|parent| {
                parent
                    .children
                    .iter()
                    .filter(|c| **c != id)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();

        Some(HierarchyView {
            id,
            parent: chunk.parent_id,
            children: node.children.clone(),
            siblings,
            descendants: self.descendants(id),
            overlap_metrics: self.relationships[pos].overlap_metrics,
        })
    }

    /// Transitive children in breadth-first order; stops on revisits so
    /// corrupted cyclic links terminate
    pub fn descendants(&self, id: ChunkId) -> Vec<ChunkId> {
        let mut visited: HashSet<ChunkId> = HashSet::from([id]);
        let mut queue: VecDeque<ChunkId> = VecDeque::from([id]);
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.node(current) else {
                continue;
            };
            for child in &node.children {
                if visited.insert(*child) {
                    out.push(*child);
                    queue.push_back(*child);
                }
            }
        }
        out
    }

    /// Same-level neighbors within `window` positions (the chunk included),
    /// then the parent, then the children, without duplicates.
    ///
    /// Unknown ids yield an empty list.
    pub fn get_contextual_chunks(&self, id: ChunkId, window: usize) -> Vec<ChunkId> {
        let Some(chunk) = self.get(id) else {
            return Vec::new();
        };
        let lo = chunk.index.saturating_sub(window);
        let hi = chunk.index.saturating_add(window);

        let neighbors = self
            .level_chunks(chunk.level)
            .filter(|c| (lo..=hi).contains(&c.index))
            .map(Chunk::id)
            .sorted_by_key(|c| c.index);
        let children = self
            .node(id)
            .map(|n| n.children.clone())
            .unwrap_or_default();

        neighbors
            .chain(chunk.parent_id)
            .chain(children)
            .unique()
            .collect()
    }

    /// Counts per level, parent/leaf split and overlap usage
    pub fn get_hierarchy_statistics(&self) -> HierarchyStatistics {
        let levels: Vec<usize> = self.chunks.iter().map(|c| c.level).unique().sorted().collect();
        let per_level = levels
            .iter()
            .map(|level| LevelStatistics::for_level(self, *level))
            .collect();
        let parent_chunks = self.nodes.iter().filter(|n| !n.children.is_empty()).count();

        let mut overlap = OverlapStatistics::default();
        for (chunk, record) in self.chunks.iter().zip(&self.relationships) {
            if chunk.has_overlap() {
                overlap.chunks_with_overlap += 1;
                overlap.buckets.add(record.overlap_metrics.actual_overlap_ratio);
            }
        }
        if !self.chunks.is_empty() {
            overlap.overlap_fraction = overlap.chunks_with_overlap as f64 / self.chunks.len() as f64;
        }

        HierarchyStatistics {
            total_chunks: self.chunks.len(),
            levels,
            parent_chunks,
            leaf_chunks: self.chunks.len() - parent_chunks,
            per_level,
            overlap,
        }
    }
}
