//! Text chunking for counseling transcripts.
//!
//! `RecursiveChunker` tries a hierarchy of separators (paragraphs, lines,
//! sentences, words, characters) and only falls to a finer separator when a
//! piece is still larger than `max_chunk_size`. Adjacent chunks share up to
//! `overlap` characters so a retrieved chunk keeps some surrounding context.
//!
//! Sizes are counted in `char`s, not bytes, so Hangul text is sized the same
//! way as ASCII.
//!
//! ```rust
//! use counsel_db::chunking::{Chunker, ChunkerConfig, RecursiveChunker};
//!
//! let chunker = RecursiveChunker::new(ChunkerConfig::default());
//! let chunks = chunker.chunk("First paragraph.\n\nSecond paragraph.");
//! assert_eq!(chunks.len(), 1);
//! ```

use std::collections::VecDeque;

/// Configuration for chunking strategies.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum size of a chunk in characters.
    pub max_chunk_size: usize,
    /// A trailing chunk shorter than this is folded into its predecessor when it fits.
    pub min_chunk_size: usize,
    /// Number of characters to overlap between chunks.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: counsel_core::defaults::CHUNK_SIZE,
            min_chunk_size: counsel_core::defaults::CHUNK_MIN_SIZE,
            overlap: counsel_core::defaults::CHUNK_OVERLAP,
        }
    }
}

/// A text chunk and its position in the chunk sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Common trait for chunking strategies.
pub trait Chunker: Send + Sync {
    /// Chunk the given text. Empty or whitespace-only input yields no chunks.
    fn chunk(&self, text: &str) -> Vec<Chunk>;

    fn config(&self) -> &ChunkerConfig;
}

const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Hierarchical splitter: paragraphs, then lines, sentences, words, characters.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    config: ChunkerConfig,
    separators: Vec<String>,
}

impl RecursiveChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the separator hierarchy. An empty string means "split into characters".
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    fn max_size(&self) -> usize {
        self.config.max_chunk_size.max(1)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let found = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep.as_str()));

        let (separator, finer): (&str, &[String]) = match found {
            Some(i) => (separators[i].as_str(), &separators[i + 1..]),
            None => ("", &[]),
        };

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|piece| !piece.trim().is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<String> = Vec::new();

        for piece in pieces {
            if char_len(&piece) <= self.max_size() {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece);
            } else {
                out.extend(self.split_recursive(&piece, finer));
            }
        }

        if !fitting.is_empty() {
            out.extend(self.merge(&fitting, separator));
        }
        out
    }

    /// Greedily pack pieces up to `max_chunk_size`, carrying `overlap` forward.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let max = self.max_size();
        let overlap = self.config.overlap;

        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        let joined_len = |total: usize, current: &VecDeque<&str>, len: usize| {
            total + len + if current.is_empty() { 0 } else { sep_len }
        };

        for piece in pieces {
            let len = char_len(piece);

            if !current.is_empty() && joined_len(total, &current, len) > max {
                push_joined(&mut docs, &current, separator);

                while !current.is_empty()
                    && (total > overlap || joined_len(total, &current, len) > max)
                {
                    if let Some(first) = current.pop_front() {
                        let removed = char_len(first) + if current.is_empty() { 0 } else { sep_len };
                        total = total.saturating_sub(removed);
                    }
                }
            }

            total = joined_len(total, &current, len);
            current.push_back(piece);
        }

        push_joined(&mut docs, &current, separator);
        docs
    }

    fn fold_short_tail(&self, mut chunks: Vec<String>) -> Vec<String> {
        if chunks.len() < 2 {
            return chunks;
        }
        let last_len = chunks.last().map(|c| char_len(c)).unwrap_or(0);
        let prev_len = char_len(&chunks[chunks.len() - 2]);
        if last_len < self.config.min_chunk_size && prev_len + 1 + last_len <= self.max_size() {
            if let Some(last) = chunks.pop() {
                if let Some(prev) = chunks.last_mut() {
                    prev.push(' ');
                    prev.push_str(&last);
                }
            }
        }
        chunks
    }
}

fn push_joined(docs: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let pieces = self.split_recursive(text, &self.separators);
        self.fold_short_tail(pieces)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk { text, index })
            .collect()
    }

    fn config(&self) -> &ChunkerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ChunkerConfig {
        ChunkerConfig {
            max_chunk_size: 100,
            min_chunk_size: 20,
            overlap: 10,
        }
    }

    #[test]
    fn test_empty_text() {
        let chunker = RecursiveChunker::new(small_config());
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = RecursiveChunker::new(small_config());
        let chunks = chunker.chunk("요즘 학교 가기가 너무 힘들어요.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "요즘 학교 가기가 너무 힘들어요.");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_paragraphs_kept_whole_when_they_fit() {
        let chunker = RecursiveChunker::new(small_config());
        let para_a = "a".repeat(60);
        let para_b = "b".repeat(60);
        let chunks = chunker.chunk(&format!("{para_a}\n\n{para_b}"));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, para_a);
        assert_eq!(chunks[1].text, para_b);
    }

    #[test]
    fn test_unbroken_hangul_uses_character_windows() {
        let config = ChunkerConfig {
            max_chunk_size: 1000,
            min_chunk_size: 100,
            overlap: 100,
        };
        let chunker = RecursiveChunker::new(config);
        let text = "가".repeat(2500);
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.char_len() <= 1000));
        assert_eq!(chunks[0].char_len(), 1000);
        assert_eq!(chunks[2].char_len(), 700);
    }

    #[test]
    fn test_words_overlap_between_chunks() {
        let chunker = RecursiveChunker::new(small_config());
        let words: Vec<String> = (0..60).map(|i| format!("w{i:02}")).collect();
        let chunks = chunker.chunk(&words.join(" "));

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].text.split(' ').last().unwrap();
            assert!(
                pair[1].text.contains(last_word),
                "expected overlap of {last_word} into next chunk"
            );
        }
        assert!(chunks.iter().all(|c| c.char_len() <= 100));
    }

    #[test]
    fn test_indices_are_sequential() {
        let chunker = RecursiveChunker::new(small_config());
        let text = "문장입니다. ".repeat(80);
        let chunks = chunker.chunk(&text);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_short_tail_is_folded() {
        let config = ChunkerConfig {
            max_chunk_size: 100,
            min_chunk_size: 30,
            overlap: 0,
        };
        let chunker = RecursiveChunker::new(config);
        // The long paragraph splits into 99 + 49 chars; "tail" would be a third chunk.
        let text = format!("{}\n\ntail", vec!["abcd"; 30].join(" "));
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].text.ends_with("abcd tail"));
    }

    #[test]
    fn test_custom_separators() {
        let chunker = RecursiveChunker::new(ChunkerConfig {
            max_chunk_size: 5,
            min_chunk_size: 0,
            overlap: 0,
        })
        .with_separators(vec!["|".to_string()]);
        let chunks = chunker.chunk("abc|defgh|ij");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abc", "defgh", "ij"]);
    }
}
