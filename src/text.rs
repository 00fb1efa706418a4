use crate::text::chunking::config::{SentenceBoundaryDetector, WordCounter};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;

pub mod chunking;

/// A word is any run of non-whitespace characters
pub static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").unwrap());

/// Rule-based sentence splitter producing byte spans
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    /// Cut a sentence after this many chars even without a stop char
    max_length: Option<usize>,
    stop_chars: HashSet<char>,
    force: HashSet<char>,
    parentheses: HashMap<char, char>,
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

impl SentenceSplitter {
    // brackets that wrap quoted speech; never split inside them.
    // () and [] are left out, they show up in code and emoticons too often
    pub const PARENTHESES: [(char, char); 3] = [('「', '」'), ('『', '』'), ('【', '】')];

    pub const STOP_CHARS: [char; 7] = ['。', '．', '！', '？', '!', '?', '\n'];

    // ascii period only ends a sentence before whitespace or end of text (urls, decimals)
    pub const PERIOD: char = '.';

    pub fn new(
        max_length: Option<usize>,
        stop_chars: Option<HashSet<char>>,
        force: Option<HashSet<char>>,
        parentheses: Option<HashMap<char, char>>,
    ) -> Self {
        let mut stop_chars = stop_chars.unwrap_or(Self::STOP_CHARS.iter().cloned().collect());
        let force = force
            .map(|f| {
                stop_chars.extend(f.iter().cloned());
                f
            })
            .unwrap_or_default();
        let parentheses = parentheses.unwrap_or(Self::PARENTHESES.iter().cloned().collect());
        SentenceSplitter {
            max_length: max_length.filter(|m| *m > 0),
            stop_chars,
            force,
            parentheses,
        }
    }

    fn is_stop(&self, c: char, next: Option<char>) -> bool {
        if c == Self::PERIOD {
            next.is_none_or(char::is_whitespace)
        } else {
            self.stop_chars.contains(&c)
        }
    }

    /// Split into `(start, end)` byte spans that tile `text`.
    ///
    /// Trailing whitespace and runs of stop chars (`?!`, `。」`) stay with the
    /// sentence they follow.
    pub fn split_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = vec![];
        let mut start = 0;
        let mut buf_len = 0;
        let mut waiting_stack: Vec<char> = vec![];
        let mut iter = text.char_indices().peekable();

        while let Some((pos, c)) = iter.next() {
            buf_len += 1;
            let mut stop = false;
            let mut cut = false;

            if let Some(t) = self.parentheses.get(&c) {
                waiting_stack.push(*t);
            } else if let Some(d) = waiting_stack.last() {
                if c == *d {
                    waiting_stack.pop();
                } else if self.force.contains(&c) {
                    cut = true;
                    waiting_stack.clear();
                }
            } else if self.is_stop(c, iter.peek().map(|(_, n)| *n)) {
                stop = true;
                cut = true;
            }

            if !cut && self.max_length.is_some_and(|max| buf_len >= max) {
                cut = true;
                waiting_stack.clear();
            }

            if cut {
                let mut end = pos + c.len_utf8();
                while let Some(&(p, n)) = iter.peek() {
                    let absorb = n.is_whitespace()
                        || (stop && n != Self::PERIOD && self.stop_chars.contains(&n));
                    if !absorb {
                        break;
                    }
                    end = p + n.len_utf8();
                    iter.next();
                }
                spans.push((start, end));
                start = end;
                buf_len = 0;
            }
        }
        if start < text.len() {
            spans.push((start, text.len()));
        }
        spans
    }

    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.split_spans(text)
            .into_iter()
            .map(|(start, end)| &text[start..end])
            .collect()
    }
}

impl SentenceBoundaryDetector for SentenceSplitter {
    type Error = Infallible;

    fn detect_sentence_boundaries(&self, text: &str) -> Result<Vec<(usize, usize)>, Infallible> {
        Ok(self.split_spans(text))
    }
}

/// Counts `\S+` runs
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceWordCounter;

impl WordCounter for WhitespaceWordCounter {
    fn word_count(&self, text: &str) -> usize {
        WORD_PATTERN.find_iter(text).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split() {
        let splitter = SentenceSplitter::default();
        let text = "これはテストです。";
        let sentences = splitter.split(text);
        assert_eq!(sentences, vec!["これはテストです。"]);
    }

    #[test]
    fn test_split_english() {
        let splitter = SentenceSplitter::default();
        let sentences = splitter.split("Hello world. How are you? Fine!");
        assert_eq!(sentences, vec!["Hello world. ", "How are you? ", "Fine!"]);
    }

    #[test]
    fn test_period_inside_token_does_not_split() {
        let splitter = SentenceSplitter::default();
        let sentences = splitter.split("Version 2.5 is out. See example.com now.");
        assert_eq!(sentences, vec!["Version 2.5 is out. ", "See example.com now."]);
    }

    #[test]
    fn test_consecutive_stop_chars_stay_together() {
        let splitter = SentenceSplitter::default();
        let sentences = splitter.split("本当？！え。");
        assert_eq!(sentences, vec!["本当？！", "え。"]);
    }

    #[test]
    fn test_newline_is_a_boundary() {
        let splitter = SentenceSplitter::default();
        let sentences = splitter.split("line one\n\nline two");
        assert_eq!(sentences, vec!["line one\n\n", "line two"]);
    }

    #[test]
    fn test_split_with_stop_chars() {
        let mut stop_chars = HashSet::new();
        stop_chars.insert('。');
        let splitter = SentenceSplitter::new(None, Some(stop_chars), None, None);
        let sentences = splitter.split("これはテストです！あ。");
        assert_eq!(sentences, vec!["これはテストです！あ。"]);
    }

    #[test]
    fn test_split_with_force() {
        let mut force = HashSet::new();
        force.insert('テ');
        let splitter = SentenceSplitter::new(None, None, Some(force), None);
        let sentences = splitter.split("これはテストです。");
        assert_eq!(sentences, vec!["これはテ", "ストです。"]);
    }

    #[test]
    fn test_split_with_parentheses() {
        let mut parentheses = HashMap::new();
        parentheses.insert('(', ')');
        let splitter = SentenceSplitter::new(None, None, None, Some(parentheses));
        let sentences = splitter.split("これはテスト(です。ああ)です。");
        assert_eq!(sentences, vec!["これはテスト(です。ああ)です。"]);

        let splitter = SentenceSplitter::default();
        let sentences = splitter.split("彼は「はい。そうです。」と言った。次。");
        assert_eq!(sentences, vec!["彼は「はい。そうです。」と言った。", "次。"]);
    }

    #[test]
    fn test_split_with_max_length() {
        let splitter = SentenceSplitter::new(Some(2), None, None, None);
        let sentences = splitter.split("これはテストです。");
        assert_eq!(sentences, vec!["これ", "はテ", "スト", "です", "。"]);
    }

    #[test]
    fn test_spans_tile_text_on_char_boundaries() {
        let splitter = SentenceSplitter::default();
        let text = "  Émile a dit « oui ». Puis il est parti! Fin";
        let spans = splitter.split_spans(text);
        assert_eq!(spans.first().map(|s| s.0), Some(0));
        assert_eq!(spans.last().map(|s| s.1), Some(text.len()));
        for pair in spans.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        for (start, end) in spans {
            assert!(text.is_char_boundary(start) && text.is_char_boundary(end));
        }
        assert!(splitter.split_spans("").is_empty());
    }

    #[test]
    fn test_detector_impl() {
        let splitter = SentenceSplitter::default();
        let spans = splitter
            .detect_sentence_boundaries("One. Two.")
            .unwrap();
        assert_eq!(spans, vec![(0, 5), (5, 9)]);
    }

    #[test]
    fn test_whitespace_word_counter() {
        let counter = WhitespaceWordCounter;
        assert_eq!(counter.word_count("  a bb\tccc\n"), 3);
        assert_eq!(counter.word_count("   "), 0);
        assert_eq!(counter.word_count("日本語のテキスト"), 1);
        assert_eq!(counter.word_count_batch(&["a b", "", "c"]), vec![2, 0, 1]);
    }
}
