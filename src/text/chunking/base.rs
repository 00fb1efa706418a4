//! Level-0 chunk construction: span normalisation and greedy sentence packing

use super::error::{ChunkingError, Result};
use super::types::{Chunk, ChunkOrigin, SentenceSpan};
use crate::text::WORD_PATTERN;
use tracing::{debug, warn};

/// Kind of boundary unit the base chunker packs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryUnit {
    Sentence,
    /// Single words, used when no sentence boundaries are available
    Word,
}

/// Detector output after repair
#[derive(Debug, Clone, Default)]
pub struct NormalizedSpans {
    /// Spans tiling the whole text, in order
    pub spans: Vec<SentenceSpan>,
    pub warnings: Vec<String>,
    /// Number of spans clamped or dropped
    pub repaired: usize,
}

/// Validate and repair raw detector spans so they tile `text`.
///
/// Spans outside the text or off a char boundary are a hard failure.
/// Out-of-order or overlapping spans are clamped to the previous end, empty or
/// whitespace-only spans are dropped, and gaps are absorbed into neighbors.
pub fn normalize_sentence_spans(text: &str, raw: &[(usize, usize)]) -> Result<NormalizedSpans> {
    let text_len = text.len();
    let mut out = NormalizedSpans::default();
    let mut prev_end = 0;

    for &(raw_start, end) in raw {
        if raw_start > text_len
            || end > text_len
            || !text.is_char_boundary(raw_start)
            || !text.is_char_boundary(end)
        {
            return Err(ChunkingError::invalid_sentence_span(raw_start, end, text_len));
        }

        let mut start = raw_start;
        if start < prev_end {
            start = prev_end;
            if start < end {
                let msg = format!(
                    "sentence span {raw_start}..{end} overlaps previous span ending at {prev_end}, clamped"
                );
                warn!("{}", msg);
                out.warnings.push(msg);
                out.repaired += 1;
            }
        }
        if start >= end {
            let msg = format!("sentence span {raw_start}..{end} is empty or out of order, skipped");
            warn!("{}", msg);
            out.warnings.push(msg);
            out.repaired += 1;
            continue;
        }
        if text[start..end].trim().is_empty() {
            debug!("whitespace-only span {}..{} folded into neighbors", start, end);
            continue;
        }

        out.spans.push(SentenceSpan::new(start, end));
        prev_end = end;
    }

    tile_spans(&mut out.spans, text_len);
    Ok(out)
}

/// Word units (`\S+` plus following whitespace) tiling `text`
pub fn word_unit_spans(text: &str) -> Vec<SentenceSpan> {
    let mut spans: Vec<SentenceSpan> = WORD_PATTERN
        .find_iter(text)
        .map(|m| SentenceSpan::new(m.start(), m.end()))
        .collect();
    tile_spans(&mut spans, text.len());
    spans
}

/// Stretch ordered, disjoint spans so they cover `[0, text_len)` without gaps
fn tile_spans(spans: &mut [SentenceSpan], text_len: usize) {
    if spans.is_empty() {
        return;
    }
    spans[0].start = 0;
    for i in 1..spans.len() {
        spans[i - 1].end = spans[i].start;
    }
    if let Some(last) = spans.last_mut() {
        last.end = text_len;
    }
}

/// Greedy packer producing level-0 chunks under a word budget
#[derive(Debug, Clone)]
pub struct BaseChunker {
    base_chunk_size: usize,
}

impl BaseChunker {
    pub fn new(base_chunk_size: usize) -> Self {
        Self {
            base_chunk_size: base_chunk_size.max(1),
        }
    }

    pub fn base_chunk_size(&self) -> usize {
        self.base_chunk_size
    }

    /// Pack `spans` into chunks. Never splits a span; a span larger than the
    /// budget becomes a chunk of its own.
    ///
    /// `word_counts[i]` is the word count of `spans[i]`.
    pub fn chunk(
        &self,
        text: &str,
        spans: &[SentenceSpan],
        word_counts: &[usize],
        unit: BoundaryUnit,
    ) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut current_words = 0;

        for (i, _) in spans.iter().enumerate() {
            let words = word_counts.get(i).copied().unwrap_or(0);
            if !current.is_empty() && current_words + words > self.base_chunk_size {
                chunks.push(self.seal(text, spans, &current, current_words, chunks.len(), unit));
                current.clear();
                current_words = 0;
            }
            current.push(i);
            current_words += words;
        }
        if !current.is_empty() {
            chunks.push(self.seal(text, spans, &current, current_words, chunks.len(), unit));
        }

        debug!(
            "Packed {} units into {} level-0 chunks (budget {} words)",
            spans.len(),
            chunks.len(),
            self.base_chunk_size
        );
        chunks
    }

    fn seal(
        &self,
        text: &str,
        spans: &[SentenceSpan],
        members: &[usize],
        words: usize,
        index: usize,
        unit: BoundaryUnit,
    ) -> Chunk {
        let first = members[0];
        let last = members[members.len() - 1];
        let start = spans[first].start;
        let end = spans[last].end;

        let origin = match unit {
            BoundaryUnit::Word => ChunkOrigin::WordWindow,
            BoundaryUnit::Sentence if members.len() == 1 && words > self.base_chunk_size => {
                debug!(
                    "Sentence {} has {} words, over budget {}; kept whole",
                    first, words, self.base_chunk_size
                );
                ChunkOrigin::OversizedSentence
            }
            BoundaryUnit::Sentence => ChunkOrigin::SentencePacked,
        };

        let mut chunk = Chunk::new(
            text[start..end].to_string(),
            0,
            index,
            start..end,
            members.to_vec(),
            origin,
        );
        chunk.add_metadata("word_count", words);
        chunk.add_metadata("sentence_count", members.len());
        chunk
    }
}
