//! Line-based document splitting with trailing-edge overlap.
//!
//! Lines are the smallest unit: a line is never cut, so a single line longer
//! than `chunk_size` becomes a chunk of its own. When a chunk closes, the
//! next one is seeded with lines taken from the end of the closed chunk until
//! their combined length reaches `chunk_overlap`.

use serde_json::Value;
use strata_core::config::SplitterSettings;
use strata_core::types::{chunk_id, Chunk, DocumentSource};

/// Position of one chunk within the document's line sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// First line (inclusive).
    pub start_line: usize,
    /// Last line (exclusive).
    pub end_line: usize,
    /// Leading lines repeated from the previous chunk.
    pub overlap_lines: usize,
}

/// Splits text into overlapping chunks under a character budget.
///
/// Chunk size is measured in characters of the joined chunk text, newline
/// separators included. Overlap is measured as the sum of the repeated
/// lines' lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(
            strata_core::config::DEFAULT_CHUNK_SIZE,
            strata_core::config::DEFAULT_CHUNK_OVERLAP,
        )
    }
}

impl From<SplitterSettings> for TextSplitter {
    fn from(settings: SplitterSettings) -> Self {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }
}

impl TextSplitter {
    /// A `chunk_size` of zero is treated as one.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` and return the chunk texts in order.
    ///
    /// Lines are delimited by `\n` only, so carriage returns and trailing
    /// empty lines survive in the chunk text.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let lines: Vec<&str> = text.split('\n').collect();
        self.split_spans(&lines)
            .into_iter()
            .map(|span| lines[span.start_line..span.end_line].join("\n"))
            .collect()
    }

    /// Compute chunk boundaries over an already-split line sequence.
    pub fn split_spans(&self, lines: &[&str]) -> Vec<ChunkSpan> {
        let lens: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
        let mut spans = Vec::new();

        let mut start = 0;
        let mut overlap = 0;
        // Joined length of lines[start..i].
        let mut size = 0;

        for (i, &len) in lens.iter().enumerate() {
            let grown = if i > start { size + 1 + len } else { len };
            if i == start || grown <= self.chunk_size {
                size = grown;
                continue;
            }

            spans.push(ChunkSpan {
                start_line: start,
                end_line: i,
                overlap_lines: overlap,
            });

            let mut seed_start = i;
            let mut popped = 0;
            while seed_start > start && popped < self.chunk_overlap {
                seed_start -= 1;
                popped += lens[seed_start];
            }

            // The seed must leave room for line i.
            let mut seed_size = joined_len(&lens[seed_start..i]);
            while seed_start < i && seed_size + 1 + len > self.chunk_size {
                seed_size = if i - seed_start > 1 {
                    seed_size - lens[seed_start] - 1
                } else {
                    0
                };
                seed_start += 1;
            }

            start = seed_start;
            overlap = i - seed_start;
            size = if i > start { seed_size + 1 + len } else { len };
        }

        if start < lines.len() {
            spans.push(ChunkSpan {
                start_line: start,
                end_line: lines.len(),
                overlap_lines: overlap,
            });
        }

        spans
    }
}

fn joined_len(lens: &[usize]) -> usize {
    if lens.is_empty() {
        0
    } else {
        lens.iter().sum::<usize>() + lens.len() - 1
    }
}

/// Turn one document into chunks carrying its metadata.
///
/// Empty documents yield no chunks; whitespace-only text is kept. Without a splitter the whole text is a
/// single chunk whose id is the bare document hash.
pub fn chunk_document(
    source: &DocumentSource,
    text: &str,
    splitter: Option<&TextSplitter>,
) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let hash = source.document_hash();
    let base = source.metadata();

    let Some(splitter) = splitter else {
        return vec![Chunk::new(chunk_id(&hash, None), text, base)];
    };

    let pieces = splitter.split(text);
    let count = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| {
            let mut metadata = base.clone();
            metadata.insert("chunk_index".to_string(), Value::from(index));
            metadata.insert("chunk_count".to_string(), Value::from(count));
            Chunk::new(chunk_id(&hash, Some(index)), content, metadata)
        })
        .collect()
}
