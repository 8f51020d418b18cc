use thiserror::Error;

/// Request-shape problems caught at the invoking boundary. Never recovered;
/// surfaced as 400 with the offending field named.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("field `{field}` must be at least {minimum} characters")]
    TooShort { field: &'static str, minimum: usize },
    #[error("exactly one of file, url, or json_data must be provided")]
    MissingSource,
    #[error("provide a single primary source, not several")]
    ConflictingSources,
    #[error("url must start with http:// or https://")]
    InvalidUrl,
    #[error("uploaded file must be a PDF")]
    NotAPdf,
    #[error("field `{field}` is not valid JSON: {detail}")]
    MalformedJson { field: &'static str, detail: String },
}

/// Failures producing a usable corpus from the primary source. The only
/// agent failure that aborts an evaluation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IngestionError {
    #[error("PDF text extraction failed: {0}")]
    PdfExtraction(String),
    #[error("PDF appears to be empty or unreadable")]
    EmptyDocument,
    #[error("could not fetch url `{url}`: {detail}")]
    UnreachableUrl { url: String, detail: String },
    #[error("fetched document contained no extractable text")]
    EmptyCorpus,
}

/// Top-level failure of one evaluation run. LLM and cache/log failures never
/// appear here; agents convert those to degraded outputs internally.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error("report could not be persisted: {0}")]
    ReportStore(String),
}
