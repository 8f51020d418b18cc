//! Page-text extraction from PDF bytes.
//!
//! The production extractor shells out to `pdftotext`, first with the
//! structured `-layout` mode and then plain `-raw` when that fails. The
//! trait boundary exists so tests can feed fixed page strings; slide
//! segmentation is deterministic on whatever pages come back.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PdfExtractError {
    #[error("could not stage PDF for extraction: {0}")]
    Stage(std::io::Error),
    #[error("could not run pdftotext: {0}")]
    Spawn(std::io::Error),
    #[error("pdftotext failed: {0}")]
    Tool(String),
    #[error("PDF extraction timed out")]
    Timeout,
    #[error("no extractable text in document")]
    Empty,
}

#[async_trait]
pub trait PdfTextExtractor: Send + Sync {
    /// Per-page raw text, in document order.
    async fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, PdfExtractError>;
}

pub struct PdftotextExtractor {
    timeout: Duration,
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30) }
    }
}

impl PdftotextExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_tool(&self, path: &std::path::Path, mode: &str) -> Result<String, PdfExtractError> {
        let child = Command::new("pdftotext")
            .arg(mode)
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| PdfExtractError::Timeout)?
            .map_err(PdfExtractError::Spawn)?;

        if !output.status.success() {
            return Err(PdfExtractError::Tool(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl PdfTextExtractor for PdftotextExtractor {
    async fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, PdfExtractError> {
        let mut staged = tempfile::NamedTempFile::new().map_err(PdfExtractError::Stage)?;
        staged.write_all(pdf).map_err(PdfExtractError::Stage)?;

        let text = match self.run_tool(staged.path(), "-layout").await {
            Ok(text) => text,
            Err(PdfExtractError::Timeout) => return Err(PdfExtractError::Timeout),
            Err(error) => {
                warn!(error = %error, "layout extraction failed, retrying raw mode");
                self.run_tool(staged.path(), "-raw").await?
            }
        };

        let pages = split_pages(&text);
        if pages.is_empty() {
            return Err(PdfExtractError::Empty);
        }
        Ok(pages)
    }
}

/// `pdftotext` separates pages with form feeds.
pub fn split_pages(text: &str) -> Vec<String> {
    text.split('\u{c}')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .map(str::to_string)
        .collect()
}

/// Test extractor yielding fixed page strings.
pub struct FixedPagesExtractor {
    pages: Vec<String>,
}

impl FixedPagesExtractor {
    pub fn new(pages: Vec<impl Into<String>>) -> Self {
        Self { pages: pages.into_iter().map(Into::into).collect() }
    }
}

#[async_trait]
impl PdfTextExtractor for FixedPagesExtractor {
    async fn extract_pages(&self, _pdf: &[u8]) -> Result<Vec<String>, PdfExtractError> {
        if self.pages.iter().all(|page| page.trim().is_empty()) {
            return Err(PdfExtractError::Empty);
        }
        Ok(self.pages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{split_pages, FixedPagesExtractor, PdfExtractError, PdfTextExtractor};

    #[test]
    fn pages_split_on_form_feed_and_drop_blanks() {
        let pages = split_pages("page one\u{c}page two\u{c}\u{c}  \u{c}page three");
        assert_eq!(pages, vec!["page one", "page two", "page three"]);
    }

    #[test]
    fn text_without_form_feeds_is_one_page() {
        assert_eq!(split_pages("single body of text"), vec!["single body of text"]);
    }

    #[tokio::test]
    async fn fixed_extractor_reports_empty_documents() {
        let extractor = FixedPagesExtractor::new(vec!["", "  "]);
        let result = extractor.extract_pages(b"%PDF-1.4").await;
        assert!(matches!(result, Err(PdfExtractError::Empty)));
    }
}
