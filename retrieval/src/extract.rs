//! Page text extraction.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, RetrievalError};

/// Turns raw document bytes into ordered page texts.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Extract the text of every page, in page order.
    ///
    /// A page without text is an empty string, not a missing entry.
    async fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>>;
}

/// Extracts PDF text with poppler's `pdftotext` binary.
///
/// `pdftotext` separates pages with form feeds, which is what the output is
/// split on.
#[derive(Debug, Clone)]
pub struct PdftotextExtractor {
    binary: PathBuf,
}

impl PdftotextExtractor {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("pdftotext"),
        }
    }

    /// Use a specific `pdftotext` executable.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageExtractor for PdftotextExtractor {
    async fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let scratch = tempfile::Builder::new()
            .prefix("ragdoc-")
            .suffix(".pdf")
            .tempfile()?;
        tokio::fs::write(scratch.path(), bytes).await?;

        let output = Command::new(&self.binary)
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(scratch.path())
            .arg("-")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                warn!("Failed to run {}: {e}", self.binary.display());
                RetrievalError::InvalidDocument(format!(
                    "Failed to read PDF: {e} (is poppler installed?)"
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RetrievalError::InvalidDocument(format!(
                "Failed to read PDF: {}",
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let pages = split_pages(&text);
        debug!(
            "pdftotext extracted {} characters over {} pages",
            text.chars().count(),
            pages.len()
        );
        Ok(pages)
    }
}

/// Split `pdftotext` output into pages on form feeds.
///
/// `pdftotext` terminates every page with a form feed, so the segment after
/// the last one is dropped when it holds only whitespace.
pub fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\u{c}').map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}
