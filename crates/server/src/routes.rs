//! HTTP surface: the route table the UI consumes.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use dealscope_agents::critique::CritiqueAgent;
use dealscope_agents::ingestion::{IngestionAgent, IngestionSource};
use dealscope_agents::narrative::NarrativeAgent;
use dealscope_agents::orchestrator::Orchestrator;
use dealscope_agents::report::ReportStore;
use dealscope_agents::scoring::{ScoringAgent, ScoringInput};

use dealscope_core::domain::critique::CritiqueReport;
use dealscope_core::domain::facts::{
    IngestionMeta, SourceType, StartupFacts, StructuredInput, UNKNOWN_STARTUP_NAME,
};
use dealscope_core::domain::narrative::Narrative;
use dealscope_core::domain::score::ScoreReport;
use dealscope_core::errors::InputError;

use crate::error::ApiError;
use crate::health;
use crate::ratelimit::{self, RateLimiter};

const MIN_FIELD_CHARS: usize = 10;
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub ingestion: Arc<IngestionAgent>,
    pub scoring: Arc<ScoringAgent>,
    pub critique: Arc<CritiqueAgent>,
    pub narrative: Arc<NarrativeAgent>,
    pub report_store: Arc<ReportStore>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub runtime_summary: RuntimeSummary,
}

/// Configuration summary surfaced by `/health`.
#[derive(Clone, Debug, Serialize)]
pub struct RuntimeSummary {
    pub provider: &'static str,
    pub cache_configured: bool,
    pub critique_log_configured: bool,
    pub pdf_converter: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/score", post(score))
        .route("/critique", post(critique))
        .route("/narrative", post(narrative))
        .route("/narrative/cache/:startup_id", get(cached_narrative).delete(clear_narrative))
        .route("/evaluate", post(evaluate))
        .route("/evaluate/reports/:report_id", get(fetch_report))
        .route("/health", get(health::health))
        .layer(axum::middleware::from_fn_with_state(state.clone(), ratelimit::enforce))
        .with_state(state)
}

async fn ingest(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<StartupFacts>, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    let source = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|error| ApiError::BadRequest(error.to_string()))?;
        let form = collect_form(multipart).await?;
        form.into_single_source()?
    } else if content_type.starts_with("application/json") {
        let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|error| ApiError::BadRequest(error.to_string()))?;
        let input: StructuredInput = serde_json::from_slice(&bytes).map_err(|error| {
            ApiError::from(InputError::MalformedJson {
                field: "body",
                detail: error.to_string(),
            })
        })?;
        IngestionSource::Structured(input)
    } else {
        return Err(InputError::MissingSource.into());
    };

    let facts = state.ingestion.ingest(source).await?;
    Ok(Json(facts))
}

#[derive(Debug, Deserialize)]
struct ScoreRequest {
    idea: String,
    team: String,
    traction: String,
    market: String,
    startup_name: Option<String>,
}

async fn score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreReport>, ApiError> {
    validate_min_chars("idea", &request.idea)?;
    validate_min_chars("team", &request.team)?;
    validate_min_chars("traction", &request.traction)?;
    validate_min_chars("market", &request.market)?;

    let input = ScoringInput {
        startup_name: request
            .startup_name
            .unwrap_or_else(|| UNKNOWN_STARTUP_NAME.to_string()),
        idea: request.idea,
        team: request.team,
        traction: request.traction,
        market: request.market,
    };

    Ok(Json(state.scoring.score(&input).await))
}

fn validate_min_chars(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().chars().count() < MIN_FIELD_CHARS {
        return Err(InputError::TooShort { field, minimum: MIN_FIELD_CHARS }.into());
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CritiqueRequest {
    score_report: ScoreReport,
    pitchdeck_summary: StructuredInput,
    startup_name: Option<String>,
}

async fn critique(
    State(state): State<AppState>,
    Json(request): Json<CritiqueRequest>,
) -> Result<Json<CritiqueReport>, ApiError> {
    let mut facts = structured_facts(&request.pitchdeck_summary);
    if let Some(name) = request.startup_name {
        facts.name = name;
    }

    Ok(Json(state.critique.critique(&request.score_report, &facts).await))
}

#[derive(Debug, Deserialize)]
struct NarrativeRequest {
    startup_data: StructuredInput,
    startup_id: Option<String>,
    use_cache: Option<bool>,
}

async fn narrative(
    State(state): State<AppState>,
    Json(request): Json<NarrativeRequest>,
) -> Result<Json<Narrative>, ApiError> {
    let facts = structured_facts(&request.startup_data);
    let narrative = state
        .narrative
        .narrative(&facts, request.startup_id.as_deref(), request.use_cache.unwrap_or(true))
        .await;
    Ok(Json(narrative))
}

async fn cached_narrative(
    State(state): State<AppState>,
    Path(startup_id): Path<String>,
) -> Result<Json<Narrative>, ApiError> {
    state
        .narrative
        .cached(&startup_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no cached narrative for `{startup_id}`")))
}

async fn clear_narrative(
    State(state): State<AppState>,
    Path(startup_id): Path<String>,
) -> Json<serde_json::Value> {
    let cleared = state.narrative.clear_cached(&startup_id).await;
    Json(serde_json::json!({ "startup_id": startup_id, "cleared": cleared }))
}

async fn evaluate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = collect_form(multipart).await?;
    let (source, supplements) = form.into_evaluation_inputs()?;

    let result = state.orchestrator.evaluate(source, supplements).await?;
    let report_url = result.report_url();

    info!(report_url = %report_url, startup = %result.startup_name, "evaluation served");

    let mut payload =
        serde_json::to_value(&result).map_err(|error| ApiError::Internal(error.to_string()))?;
    payload["report_url"] = serde_json::Value::String(report_url);
    Ok(Json(payload))
}

async fn fetch_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Response, ApiError> {
    let key = report_id.strip_suffix(".pdf").unwrap_or(&report_id);
    let stored = state
        .report_store
        .fetch(key)
        .ok_or_else(|| ApiError::NotFound(format!("no report for `{key}`")))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, stored.content_type)
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", stored.filename),
        )
        .body(Body::from(stored.bytes))
        .map_err(|error| ApiError::Internal(error.to_string()))
}

/// Fields accepted by the multipart surface of `/ingest` and `/evaluate`.
#[derive(Debug, Default)]
struct FormFields {
    file: Option<(Vec<u8>, Option<String>)>,
    url: Option<String>,
    json_data: Option<String>,
    startup_name: Option<String>,
    description: Option<String>,
    market: Option<String>,
    team: Option<String>,
    traction: Option<String>,
}

async fn collect_form(mut multipart: Multipart) -> Result<FormFields, ApiError> {
    let mut form = FormFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::BadRequest(error.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|error| ApiError::BadRequest(error.to_string()))?;
                form.file = Some((bytes.to_vec(), filename));
            }
            "url" => form.url = read_text_field(field).await?,
            "json_data" => form.json_data = read_text_field(field).await?,
            "startup_name" => form.startup_name = read_text_field(field).await?,
            "description" => form.description = read_text_field(field).await?,
            "market" => form.market = read_text_field(field).await?,
            "team" => form.team = read_text_field(field).await?,
            "traction" => form.traction = read_text_field(field).await?,
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text_field(
    field: axum::extract::multipart::Field<'_>,
) -> Result<Option<String>, ApiError> {
    let text =
        field.text().await.map_err(|error| ApiError::BadRequest(error.to_string()))?;
    let trimmed = text.trim().to_string();
    Ok((!trimmed.is_empty()).then_some(trimmed))
}

impl FormFields {
    fn primary_source_count(&self) -> usize {
        usize::from(self.file.is_some())
            + usize::from(self.url.is_some())
            + usize::from(self.json_data.is_some())
    }

    fn text_fields(&self) -> StructuredInput {
        StructuredInput {
            name: self.startup_name.clone(),
            description: self.description.clone(),
            market: self.market.clone(),
            team: self.team.clone(),
            traction: self.traction.clone(),
            ..StructuredInput::default()
        }
    }

    fn has_text_fields(&self) -> bool {
        self.description.is_some()
            || self.market.is_some()
            || self.team.is_some()
            || self.traction.is_some()
    }

    /// `/ingest` accepts exactly one of file or url.
    fn into_single_source(self) -> Result<IngestionSource, ApiError> {
        if self.primary_source_count() > 1 {
            return Err(InputError::ConflictingSources.into());
        }
        if let Some((bytes, filename)) = self.file {
            validate_pdf_filename(filename.as_deref())?;
            return Ok(IngestionSource::Pdf { bytes, filename });
        }
        if let Some(url) = self.url {
            validate_url(&url)?;
            return Ok(IngestionSource::Url(url));
        }
        Err(InputError::MissingSource.into())
    }

    /// `/evaluate` takes one primary source, with text fields either as the
    /// source itself or as blanks-filling supplements.
    fn into_evaluation_inputs(
        self,
    ) -> Result<(IngestionSource, Option<StructuredInput>), ApiError> {
        if self.primary_source_count() > 1 {
            return Err(InputError::ConflictingSources.into());
        }

        let supplements = self.text_fields();

        if let Some((bytes, filename)) = self.file {
            validate_pdf_filename(filename.as_deref())?;
            return Ok((IngestionSource::Pdf { bytes, filename }, Some(supplements)));
        }
        if let Some(url) = self.url {
            validate_url(&url)?;
            return Ok((IngestionSource::Url(url), Some(supplements)));
        }
        if let Some(json_data) = self.json_data {
            let input: StructuredInput = serde_json::from_str(&json_data).map_err(|error| {
                ApiError::from(InputError::MalformedJson {
                    field: "json_data",
                    detail: error.to_string(),
                })
            })?;
            return Ok((IngestionSource::Structured(input), Some(supplements)));
        }
        if self.has_text_fields() {
            return Ok((IngestionSource::Structured(supplements), None));
        }

        Err(InputError::MissingSource.into())
    }
}

fn validate_pdf_filename(filename: Option<&str>) -> Result<(), ApiError> {
    match filename {
        Some(name) if name.to_ascii_lowercase().ends_with(".pdf") => Ok(()),
        _ => Err(InputError::NotAPdf.into()),
    }
}

fn validate_url(url: &str) -> Result<(), ApiError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(InputError::InvalidUrl.into())
    }
}

fn structured_facts(input: &StructuredInput) -> StartupFacts {
    let mut facts = StartupFacts::empty(IngestionMeta {
        source_type: SourceType::Structured,
        source_ref: "inline".to_string(),
        slide_count: None,
        raw_content_length: 0,
        identified_sections: Vec::new(),
        missing_sections: Vec::new(),
        completeness_score: None,
    });
    facts.merge_blanks_from(input);
    facts
}
