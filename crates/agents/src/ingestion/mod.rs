//! Ingestion agent: one of PDF bytes, a URL, or structured fields in;
//! normalized `StartupFacts` out. The only agent whose failure aborts an
//! evaluation.

pub mod extract;
pub mod pdf;
pub mod slides;
pub mod url;

use std::sync::Arc;

use tracing::info;

use dealscope_core::domain::facts::{
    IngestionMeta, SourceType, StartupFacts, StructuredInput,
};
use dealscope_core::errors::IngestionError;

use crate::gateway::LlmGateway;

pub use pdf::{FixedPagesExtractor, PdfExtractError, PdfTextExtractor, PdftotextExtractor};

/// Exactly one source kind per ingestion; the enum makes presenting two a
/// type error at the boundary.
pub enum IngestionSource {
    Pdf { bytes: Vec<u8>, filename: Option<String> },
    Url(String),
    Structured(StructuredInput),
}

pub struct IngestionAgent {
    gateway: Arc<dyn LlmGateway>,
    extractor: Arc<dyn PdfTextExtractor>,
    http: reqwest::Client,
}

impl IngestionAgent {
    pub fn new(gateway: Arc<dyn LlmGateway>, extractor: Arc<dyn PdfTextExtractor>) -> Self {
        Self { gateway, extractor, http: url::http_client() }
    }

    pub async fn ingest(&self, source: IngestionSource) -> Result<StartupFacts, IngestionError> {
        match source {
            IngestionSource::Pdf { bytes, filename } => self.ingest_pdf(&bytes, filename).await,
            IngestionSource::Url(url) => self.ingest_url(&url).await,
            IngestionSource::Structured(input) => Ok(self.ingest_structured(input)),
        }
    }

    async fn ingest_pdf(
        &self,
        bytes: &[u8],
        filename: Option<String>,
    ) -> Result<StartupFacts, IngestionError> {
        let pages = self.extractor.extract_pages(bytes).await.map_err(|error| match error {
            PdfExtractError::Empty => IngestionError::EmptyDocument,
            other => IngestionError::PdfExtraction(other.to_string()),
        })?;

        let slide_candidates = slides::segment_slides(&pages);
        let classified =
            slides::classify_slides(Some(self.gateway.as_ref()), &slide_candidates).await;
        let audit = slides::audit_slides(&classified);

        let corpus = slide_candidates
            .iter()
            .map(|slide| slide.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        if corpus.trim().is_empty() {
            return Err(IngestionError::EmptyDocument);
        }

        info!(
            slides = slide_candidates.len(),
            identified = audit.identified.len(),
            completeness = audit.completeness_score,
            "pdf segmented and classified"
        );

        let meta = IngestionMeta {
            source_type: SourceType::Pdf,
            source_ref: filename.unwrap_or_else(|| "upload.pdf".to_string()),
            slide_count: Some(slide_candidates.len()),
            raw_content_length: corpus.len(),
            identified_sections: audit.identified,
            missing_sections: audit.missing,
            completeness_score: Some(audit.completeness_score),
        };

        Ok(extract::extract_facts(self.gateway.as_ref(), &corpus, meta).await)
    }

    async fn ingest_url(&self, url: &str) -> Result<StartupFacts, IngestionError> {
        let html = url::fetch_url(&self.http, url).await?;
        let corpus = url::extract_page_text(&html);
        if corpus.trim().is_empty() {
            return Err(IngestionError::EmptyCorpus);
        }

        let meta = IngestionMeta {
            source_type: SourceType::Url,
            source_ref: url.to_string(),
            slide_count: None,
            raw_content_length: corpus.len(),
            identified_sections: Vec::new(),
            missing_sections: Vec::new(),
            completeness_score: None,
        };

        Ok(extract::extract_facts(self.gateway.as_ref(), &corpus, meta).await)
    }

    fn ingest_structured(&self, input: StructuredInput) -> StartupFacts {
        let raw_content_length = [
            &input.description,
            &input.problem,
            &input.solution,
            &input.traction,
            &input.team,
            &input.market,
        ]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .map(str::len)
        .sum();

        let meta = IngestionMeta {
            source_type: SourceType::Structured,
            source_ref: "inline".to_string(),
            slide_count: None,
            raw_content_length,
            identified_sections: Vec::new(),
            missing_sections: Vec::new(),
            completeness_score: None,
        };

        let mut facts = StartupFacts::empty(meta);
        facts.merge_blanks_from(&input);
        facts
    }
}
