//! Fixed-size overlapping chunking of page text.
//!
//! Text is first normalized (runs of spaces and tabs collapse to one space,
//! three or more newlines collapse to a blank line), then a window of `size`
//! characters slides across it, stepping by `size - overlap`. The last window
//! always ends exactly at the end of the text.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[allow(clippy::expect_used)]
static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));

#[allow(clippy::expect_used)]
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// A chunk of one page, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id, `p{page}-c{seq}`.
    pub id: String,

    /// 1-based page number.
    pub page: usize,

    /// Normalized, trimmed, non-empty text.
    pub text: String,
}

impl Chunk {
    /// Create a chunk for the `seq`-th window (1-based) of `page`.
    pub fn new(page: usize, seq: usize, text: impl Into<String>) -> Self {
        Self {
            id: format!("p{page}-c{seq}"),
            page,
            text: text.into(),
        }
    }
}

/// Sliding-window chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker. Requires `size > 0` and `overlap < size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, ConfigError> {
        if size == 0 {
            return Err(ConfigError::Invalid(
                "chunk size must be positive".to_string(),
            ));
        }
        if overlap >= size {
            return Err(ConfigError::Invalid(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into overlapping windows. Empty or whitespace-only input
    /// yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let cleaned = normalize_whitespace(text);
        if cleaned.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, so windows count characters.
        let bounds: Vec<usize> = cleaned
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(cleaned.len()))
            .collect();
        let n = bounds.len() - 1;

        let mut out = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.size).min(n);
            let window = cleaned[bounds[start]..bounds[end]].trim();
            if !window.is_empty() {
                out.push(window.to_string());
            }
            if end == n {
                break;
            }
            // end == start + size here, so this always moves forward.
            start = end - self.overlap;
        }
        out
    }

    /// Chunk every page, numbering pages from 1 and chunks from 1 per page.
    pub fn chunk_pages(&self, pages: &[String]) -> Vec<Chunk> {
        pages
            .iter()
            .enumerate()
            .flat_map(|(p, text)| {
                self.chunk(text)
                    .into_iter()
                    .enumerate()
                    .map(move |(ci, piece)| Chunk::new(p + 1, ci + 1, piece))
            })
            .collect()
    }
}

/// Collapse horizontal whitespace runs and excess blank lines, then trim.
pub fn normalize_whitespace(text: &str) -> String {
    let collapsed = HORIZONTAL_WS.replace_all(text, " ");
    BLANK_LINES
        .replace_all(&collapsed, "\n\n")
        .trim()
        .to_string()
}
