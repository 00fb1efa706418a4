//! Overlap regions between adjacent sibling chunks
//!
//! Overlap is recorded as offsets only (`overlap_start`, `overlap_end`); chunk
//! content never includes the shared text. Regions are snapped to sentence
//! boundaries when one lies inside the admissible window and fall back to a
//! minimum-size raw region otherwise.

use super::config::HierarchicalChunkingConfig;
use super::types::{Chunk, OverlapMetrics, RelationshipRecord};
use itertools::Itertools;
use tracing::debug;

/// Which way a region extends into the neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// From the start of `curr` back into `prev`
    Backward,
    /// From the end of `prev` forward into `curr`
    Forward,
}

/// Computes overlap regions for a level of sibling chunks
#[derive(Debug, Clone)]
pub struct OverlapCalculator<'a> {
    config: &'a HierarchicalChunkingConfig,
}

impl<'a> OverlapCalculator<'a> {
    /// `config` is expected to be normalized already
    pub fn new(config: &'a HierarchicalChunkingConfig) -> Self {
        Self { config }
    }

    /// Smallest admissible region, never zero
    fn min_size(&self) -> usize {
        self.config.min_overlap_chars.max(1)
    }

    fn max_size(&self) -> usize {
        self.config.max_overlap_chars.max(self.min_size())
    }

    /// Set `overlap_start`/`overlap_end` on every adjacent pair of `chunks`.
    ///
    /// `boundaries` holds sorted sentence-boundary offsets (span starts plus
    /// the text length). Returns the number of regions set.
    pub fn apply(&self, text: &str, chunks: &mut [Chunk], boundaries: &[usize]) -> usize {
        let regions: Vec<(Option<usize>, Option<usize>)> = chunks
            .iter()
            .tuple_windows()
            .map(|(prev, curr)| {
                (
                    self.forward_end(text, prev, curr, boundaries),
                    self.backward_start(text, prev, curr, boundaries),
                )
            })
            .collect();

        let mut assigned = 0;
        for (i, (forward, backward)) in regions.into_iter().enumerate() {
            if forward.is_none() || backward.is_none() {
                debug!(
                    "No admissible overlap between chunks {} and {} (forward {:?}, backward {:?})",
                    i,
                    i + 1,
                    forward,
                    backward
                );
            }
            assigned += usize::from(forward.is_some()) + usize::from(backward.is_some());
            chunks[i].overlap_end = forward;
            chunks[i + 1].overlap_start = backward;
        }
        assigned
    }

    /// Start of the region `curr` shares with `prev`, inside `prev`'s span
    pub fn backward_start(
        &self,
        text: &str,
        prev: &Chunk,
        curr: &Chunk,
        boundaries: &[usize],
    ) -> Option<usize> {
        let size = self.config.target_overlap(prev.content.len());
        if size == 0 {
            return None;
        }
        let lo = prev.start_char.max(curr.start_char.saturating_sub(self.max_size()));
        let hi = curr.start_char.checked_sub(self.min_size())?;
        if hi < lo {
            return None;
        }
        let target = curr.start_char.saturating_sub(size).clamp(lo, hi);

        snap_to_boundary(boundaries, lo, hi, target, Direction::Backward).or_else(|| {
            let raw = floor_char_boundary(text, hi);
            (raw >= lo).then_some(raw)
        })
    }

    /// End of the region `prev` shares with `curr`, inside `curr`'s span
    pub fn forward_end(
        &self,
        text: &str,
        prev: &Chunk,
        curr: &Chunk,
        boundaries: &[usize],
    ) -> Option<usize> {
        let size = self.config.target_overlap(curr.content.len());
        if size == 0 {
            return None;
        }
        let lo = prev.end_char.saturating_add(self.min_size());
        let hi = curr.end_char.min(prev.end_char.saturating_add(self.max_size()));
        if hi < lo {
            return None;
        }
        let target = prev.end_char.saturating_add(size).clamp(lo, hi);

        snap_to_boundary(boundaries, lo, hi, target, Direction::Forward).or_else(|| {
            let raw = ceil_char_boundary(text, lo);
            (raw <= hi).then_some(raw)
        })
    }
}

/// Nearest boundary to `target` within `[lo, hi]`.
///
/// On an exact tie the boundary reaching further into the neighbor wins: the
/// lower one for backward regions, the higher one for forward regions.
fn snap_to_boundary(
    boundaries: &[usize],
    lo: usize,
    hi: usize,
    target: usize,
    direction: Direction,
) -> Option<usize> {
    let first = boundaries.partition_point(|b| *b < lo);
    let last = boundaries.partition_point(|b| *b <= hi);

    let mut best: Option<usize> = None;
    for &b in &boundaries[first..last] {
        let better = match best {
            None => true,
            Some(current) => {
                let (d, dc) = (b.abs_diff(target), current.abs_diff(target));
                match direction {
                    // ascending scan keeps the lower one on ties
                    Direction::Backward => d < dc,
                    Direction::Forward => d <= dc,
                }
            }
        };
        if better {
            best = Some(b);
        }
    }
    best
}

// stable stand-ins for str::floor_char_boundary / ceil_char_boundary
fn floor_char_boundary(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn ceil_char_boundary(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

/// Relationship records for one level of siblings, ordered by index
pub fn build_relationship_records(chunks: &[Chunk]) -> Vec<RelationshipRecord> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let prev = i.checked_sub(1).and_then(|p| chunks.get(p));
            let next = chunks.get(i + 1);

            let mut overlaps_with = Vec::new();
            let mut overlapped_by = Vec::new();
            if let Some(prev) = prev {
                if chunk.overlap_start.is_some() {
                    overlaps_with.push(prev.id());
                }
                if prev.overlap_end.is_some() {
                    overlapped_by.push(prev.id());
                }
            }
            if let Some(next) = next {
                if chunk.overlap_end.is_some() {
                    overlaps_with.push(next.id());
                }
                if next.overlap_start.is_some() {
                    overlapped_by.push(next.id());
                }
            }

            let mut overlap_metrics = OverlapMetrics {
                backward_overlap_chars: chunk.backward_overlap(),
                forward_overlap_chars: chunk.forward_overlap(),
                actual_overlap_ratio: 0.0,
            };
            let content_len = chunk.content.len();
            if content_len > 0 {
                overlap_metrics.actual_overlap_ratio =
                    overlap_metrics.total() as f64 / content_len as f64;
            }
            RelationshipRecord {
                overlaps_with,
                overlapped_by,
                adjacent_chunks: prev.into_iter().chain(next).map(Chunk::id).collect(),
                overlap_metrics,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::chunking::base::{BaseChunker, BoundaryUnit, normalize_sentence_spans};
    use crate::text::chunking::types::{ChunkId, ChunkOrigin};

    /// `count` sentences of "word word. " (11 bytes, 2 words each)
    fn uniform_text(count: usize) -> (String, Vec<Chunk>, Vec<usize>) {
        let text = "word word. ".repeat(count);
        let raw: Vec<(usize, usize)> = (0..count).map(|i| (i * 11, i * 11 + 11)).collect();
        let spans = normalize_sentence_spans(&text, &raw).unwrap().spans;
        let counts = vec![2; spans.len()];
        // two sentences per chunk
        let chunks = BaseChunker::new(4).chunk(&text, &spans, &counts, BoundaryUnit::Sentence);
        let mut boundaries: Vec<usize> = spans.iter().map(|s| s.start).collect();
        boundaries.push(text.len());
        (text, chunks, boundaries)
    }

    fn config(pct: f64, min: usize, max: usize) -> HierarchicalChunkingConfig {
        HierarchicalChunkingConfig {
            overlap_percentage: pct,
            min_overlap_chars: min,
            max_overlap_chars: max,
            ..Default::default()
        }
    }

    #[test]
    fn test_overlap_snaps_to_sentence_boundaries() {
        let (text, mut chunks, boundaries) = uniform_text(8);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[1].char_range(), (22, 44));

        let config = config(0.0, 10, 15);
        let assigned = OverlapCalculator::new(&config).apply(&text, &mut chunks, &boundaries);

        assert_eq!(assigned, 6);
        assert_eq!(chunks[0].overlap_start, None);
        assert_eq!(chunks[0].overlap_end, Some(33));
        assert_eq!(chunks[1].overlap_start, Some(11));
        assert_eq!(chunks[3].overlap_end, None);
        for chunk in &chunks {
            for size in [chunk.backward_overlap(), chunk.forward_overlap()] {
                assert!(size == 0 || (10..=15).contains(&size), "size {size}");
            }
        }
    }

    #[test]
    fn test_overlap_stays_inside_neighbor() {
        let (text, mut chunks, boundaries) = uniform_text(6);
        // max larger than a whole chunk
        let config = config(0.5, 5, 500);
        OverlapCalculator::new(&config).apply(&text, &mut chunks, &boundaries);

        for pair in chunks.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            let start = curr.overlap_start.unwrap();
            let end = prev.overlap_end.unwrap();
            assert!(start >= prev.start_char && start < curr.start_char);
            assert!(end <= curr.end_char && end > prev.end_char);
        }
    }

    #[test]
    fn test_tie_prefers_boundary_deeper_in_neighbor() {
        let boundaries = [0, 10, 20, 30];
        assert_eq!(
            snap_to_boundary(&boundaries, 0, 30, 15, Direction::Backward),
            Some(10)
        );
        assert_eq!(
            snap_to_boundary(&boundaries, 0, 30, 15, Direction::Forward),
            Some(20)
        );
        assert_eq!(
            snap_to_boundary(&boundaries, 11, 19, 15, Direction::Backward),
            None
        );
    }

    #[test]
    fn test_raw_fallback_respects_char_boundaries() {
        let long = "é".repeat(50);
        let text = format!("{long}tail end.");
        let prev = Chunk::new(
            long.clone(),
            0,
            0,
            0..long.len(),
            vec![0],
            ChunkOrigin::OversizedSentence,
        );
        let curr = Chunk::new(
            "tail end.".to_string(),
            0,
            1,
            long.len()..text.len(),
            vec![1],
            ChunkOrigin::SentencePacked,
        );
        let boundaries = [0, long.len(), text.len()];

        let config = config(0.0, 11, 20);
        let start = OverlapCalculator::new(&config)
            .backward_start(&text, &prev, &curr, &boundaries)
            .unwrap();

        assert!(text.is_char_boundary(start));
        let size = curr.start_char - start;
        assert!((11..=20).contains(&size), "size {size}");
    }

    #[test]
    fn test_no_overlap_when_neighbor_too_short() {
        let text = "Hi. A much longer second sentence.";
        let prev = Chunk::new("Hi. ".to_string(), 0, 0, 0..4, vec![0], ChunkOrigin::SentencePacked);
        let curr = Chunk::new(
            text[4..].to_string(),
            0,
            1,
            4..text.len(),
            vec![1],
            ChunkOrigin::SentencePacked,
        );
        let mut chunks = vec![prev, curr];

        let config = config(0.1, 10, 50);
        OverlapCalculator::new(&config).apply(text, &mut chunks, &[0, 4, text.len()]);

        assert_eq!(chunks[1].overlap_start, None, "prev has only 4 bytes");
        assert!(chunks[0].overlap_end.is_some());
    }

    #[test]
    fn test_zero_overlap_disabled() {
        let (text, mut chunks, boundaries) = uniform_text(4);
        let config = config(0.0, 0, 100);
        let assigned = OverlapCalculator::new(&config).apply(&text, &mut chunks, &boundaries);
        assert_eq!(assigned, 0);
        assert!(chunks.iter().all(|c| !c.has_overlap()));
    }

    #[test]
    fn test_uncapped_overlap_stays_inside_neighbor() {
        let (text, mut chunks, boundaries) = uniform_text(6);
        let config = config(0.1, 5, usize::MAX);
        let assigned = OverlapCalculator::new(&config).apply(&text, &mut chunks, &boundaries);

        assert_eq!(assigned, 4);
        for pair in chunks.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            let end = prev.overlap_end.expect("forward region");
            assert!(end > prev.end_char && end <= curr.end_char, "end {end}");
            let start = curr.overlap_start.expect("backward region");
            assert!(start >= prev.start_char && start < curr.start_char, "start {start}");
        }
    }

    #[test]
    fn test_huge_min_overlap_disables_regions() {
        let (text, mut chunks, boundaries) = uniform_text(4);
        let config = config(0.1, usize::MAX, usize::MAX);
        let assigned = OverlapCalculator::new(&config).apply(&text, &mut chunks, &boundaries);
        assert_eq!(assigned, 0);
        assert!(chunks.iter().all(|c| !c.has_overlap()));
    }

    #[test]
    fn test_relationship_records() {
        let (text, mut chunks, boundaries) = uniform_text(6);
        let config = config(0.0, 10, 15);
        OverlapCalculator::new(&config).apply(&text, &mut chunks, &boundaries);

        let records = build_relationship_records(&chunks);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].adjacent_chunks, vec![ChunkId::new(0, 1)]);
        assert_eq!(
            records[1].adjacent_chunks,
            vec![ChunkId::new(0, 0), ChunkId::new(0, 2)]
        );
        assert_eq!(records[1].overlaps_with, records[1].adjacent_chunks);
        assert_eq!(records[1].overlapped_by, records[1].adjacent_chunks);
        assert_eq!(records[0].overlaps_with, vec![ChunkId::new(0, 1)]);

        let metrics = records[1].overlap_metrics;
        assert_eq!(metrics.backward_overlap_chars, 11);
        assert_eq!(metrics.forward_overlap_chars, 11);
        assert!((metrics.actual_overlap_ratio - 1.0).abs() < 1e-9);
        assert_eq!(records[2].overlap_metrics.forward_overlap_chars, 0);
    }
}
