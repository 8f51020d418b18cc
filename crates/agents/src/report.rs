//! Report agent: renders one evaluation to a PDF blob and persists it.
//!
//! The document is rendered from an HTML template and converted with
//! `wkhtmltopdf` when the binary is present. Without it, a built-in
//! single-font PDF serializer produces the same sections as plain text, so
//! the `%PDF` contract holds in every environment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tera::{Context, Tera};
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

use dealscope_core::domain::benchmark::BenchmarkReport;
use dealscope_core::domain::critique::CritiqueReport;
use dealscope_core::domain::facts::StartupFacts;
use dealscope_core::domain::narrative::Narrative;
use dealscope_core::domain::score::{ScoreReport, DIMENSIONS};

pub const REPORT_CONTENT_TYPE: &str = "application/pdf";
const REPORT_TEMPLATE: &str = "evaluation.html.tera";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report template error: {0}")]
    Template(String),
    #[error("report store write failed: {0}")]
    Store(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredReport {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Keyed blob map for rendered reports. Writes take the write lock; reads
/// are unrestricted concurrent. Blobs live until the process is torn down.
#[derive(Default)]
pub struct ReportStore {
    reports: RwLock<HashMap<String, StoredReport>>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, report_id: &str, report: StoredReport) -> Result<(), ReportError> {
        let mut reports =
            self.reports.write().map_err(|_| ReportError::Store("store lock poisoned".into()))?;
        reports.insert(report_id.to_string(), report);
        Ok(())
    }

    pub fn fetch(&self, report_id: &str) -> Option<StoredReport> {
        self.reports.read().ok()?.get(report_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.reports.read().map(|reports| reports.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the report renders, borrowed from the orchestrator before it
/// assembles the final result.
pub struct EvaluationArtifacts<'a> {
    pub facts: &'a StartupFacts,
    pub scores: &'a ScoreReport,
    pub critique: &'a CritiqueReport,
    pub narrative: &'a Narrative,
    pub benchmarks: &'a BenchmarkReport,
}

pub struct ReportAgent {
    tera: Tera,
    wkhtmltopdf: Option<PathBuf>,
    store: Arc<ReportStore>,
}

impl ReportAgent {
    /// Embedded template; `wkhtmltopdf` discovered from PATH.
    pub fn new(store: Arc<ReportStore>) -> Self {
        let wkhtmltopdf = which::which("wkhtmltopdf").ok();
        if wkhtmltopdf.is_none() {
            warn!("wkhtmltopdf not found in PATH, reports use the built-in PDF serializer");
        }
        Self { tera: embedded_templates(), wkhtmltopdf, store }
    }

    /// Deterministic construction for tests and converter-less deployments.
    pub fn without_converter(store: Arc<ReportStore>) -> Self {
        Self { tera: embedded_templates(), wkhtmltopdf: None, store }
    }

    pub fn store(&self) -> Arc<ReportStore> {
        Arc::clone(&self.store)
    }

    /// Render, convert, and persist. Returns the report id; store failure is
    /// the one agent error the pipeline surfaces.
    pub async fn render(&self, artifacts: &EvaluationArtifacts<'_>) -> Result<String, ReportError> {
        let html = self
            .tera
            .render(REPORT_TEMPLATE, &template_context(artifacts))
            .map_err(|error| ReportError::Template(error.to_string()))?;

        let bytes = match &self.wkhtmltopdf {
            Some(converter) => match convert_html_to_pdf(converter, &html).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!(error = %error, "wkhtmltopdf failed, using built-in serializer");
                    minimal_pdf(&text_lines(artifacts))
                }
            },
            None => minimal_pdf(&text_lines(artifacts)),
        };

        let report_id = Uuid::new_v4().to_string();
        let filename = format!("{}_evaluation.pdf", slug(&artifacts.facts.name));
        self.store.put(
            &report_id,
            StoredReport { bytes, content_type: REPORT_CONTENT_TYPE, filename },
        )?;

        info!(report_id = %report_id, startup = %artifacts.facts.name, "report persisted");
        Ok(report_id)
    }
}

fn embedded_templates() -> Tera {
    let mut tera = Tera::default();
    tera.add_raw_template(
        REPORT_TEMPLATE,
        include_str!("../../../templates/report/evaluation.html.tera"),
    )
    .expect("embedded report template must parse");
    tera
}

fn template_context(artifacts: &EvaluationArtifacts<'_>) -> Context {
    let mut context = Context::new();
    context.insert("startup_name", &artifacts.facts.name);
    context.insert("generated_at", &Utc::now().format("%Y-%m-%d %H:%M UTC").to_string());
    context.insert("overall_score", &artifacts.scores.overall_score);
    context.insert("recommendation", &artifacts.scores.recommendation);
    context.insert("confidence_pct", &((artifacts.scores.confidence * 100.0).round() as i64));
    context.insert("risk_label", artifacts.critique.overall_risk_label.as_str());
    context.insert("critique_summary", &artifacts.critique.summary);
    context.insert("red_flags", &artifacts.critique.red_flags);
    context.insert("narrative", artifacts.narrative);
    context.insert("industry", &artifacts.benchmarks.industry);
    context.insert("overall_position", artifacts.benchmarks.overall_position.as_str());
    context.insert("benchmark_summary", &artifacts.benchmarks.summary);
    context.insert("comparisons", &artifacts.benchmarks.comparisons);

    let dimensions: Vec<serde_json::Value> = DIMENSIONS
        .iter()
        .map(|&dimension| {
            let assessment = artifacts.scores.dimension(dimension);
            serde_json::json!({
                "name": dimension.as_str(),
                "score": assessment.score,
                "width_pct": (assessment.score * 10.0).round() as i64,
                "assessment": assessment.assessment,
                "strengths": assessment.strengths,
                "concerns": assessment.concerns,
            })
        })
        .collect();
    context.insert("dimensions", &dimensions);

    context
}

async fn convert_html_to_pdf(
    converter: &PathBuf,
    html: &str,
) -> Result<Vec<u8>, std::io::Error> {
    let staging = std::env::temp_dir();
    let html_path = staging.join(format!("evaluation_{}.html", Uuid::new_v4()));
    let pdf_path = staging.join(format!("evaluation_{}.pdf", Uuid::new_v4()));

    tokio::fs::write(&html_path, html).await?;

    let output = Command::new(converter)
        .arg("--page-size")
        .arg("A4")
        .arg("--margin-top")
        .arg("10mm")
        .arg("--margin-bottom")
        .arg("10mm")
        .arg("--margin-left")
        .arg("10mm")
        .arg("--margin-right")
        .arg("10mm")
        .arg("--encoding")
        .arg("utf-8")
        .arg(&html_path)
        .arg(&pdf_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let _ = tokio::fs::remove_file(&html_path).await;
        return Err(std::io::Error::other(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let bytes = tokio::fs::read(&pdf_path).await?;
    let _ = tokio::fs::remove_file(&html_path).await;
    let _ = tokio::fs::remove_file(&pdf_path).await;

    Ok(bytes)
}

pub fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "startup".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Plain-text rendition of the report sections for the built-in serializer.
fn text_lines(artifacts: &EvaluationArtifacts<'_>) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!("Evaluation Report - {}", artifacts.facts.name));
    lines.push(format!("Generated {}", Utc::now().format("%Y-%m-%d %H:%M UTC")));
    lines.push(String::new());

    lines.push("EXECUTIVE SUMMARY".to_string());
    lines.push(format!("Overall score: {}/10", artifacts.scores.overall_score));
    lines.push(format!("Recommendation: {}", artifacts.scores.recommendation));
    lines.push(format!("Risk level: {}", artifacts.critique.overall_risk_label.as_str()));
    lines.push(format!(
        "Benchmark position: {} ({})",
        artifacts.benchmarks.overall_position.as_str(),
        artifacts.benchmarks.industry
    ));
    lines.push(String::new());

    lines.push("SCORES".to_string());
    for &dimension in &DIMENSIONS {
        let assessment = artifacts.scores.dimension(dimension);
        let filled = (assessment.score.clamp(0.0, 10.0).round()) as usize;
        lines.push(format!(
            "{:<9} {:>4.1}  [{}{}]",
            dimension.as_str(),
            assessment.score,
            "#".repeat(filled),
            "-".repeat(10 - filled)
        ));
    }
    lines.push(String::new());

    lines.push("NARRATIVE".to_string());
    lines.push(format!("Vision: {}", artifacts.narrative.vision));
    lines.push(format!("Differentiation: {}", artifacts.narrative.differentiation));
    lines.push(format!("Timing: {}", artifacts.narrative.timing));
    lines.push(format!("Tagline: {}", artifacts.narrative.tagline));
    lines.push(String::new());

    lines.push("RED FLAGS".to_string());
    if artifacts.critique.red_flags.is_empty() {
        lines.push("None identified.".to_string());
    }
    for flag in &artifacts.critique.red_flags {
        lines.push(format!(
            "[{}] {} ({}): {}",
            flag.severity.as_str(),
            flag.flag,
            flag.category.as_str(),
            flag.explanation
        ));
    }
    lines.push(String::new());

    lines.push(format!("BENCHMARKS ({})", artifacts.benchmarks.industry));
    for comparison in &artifacts.benchmarks.comparisons {
        lines.push(format!(
            "{:<16} {:>8.1} vs {:>8.1}  p{}",
            comparison.metric, comparison.startup_value, comparison.sector_avg,
            comparison.percentile
        ));
    }
    lines.push(artifacts.benchmarks.summary.clone());

    lines
}

const LINES_PER_PAGE: usize = 45;

/// Serialize text lines into a minimal but valid single-font PDF.
fn minimal_pdf(lines: &[String]) -> Vec<u8> {
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&[]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };
    let page_count = chunks.len();

    let first_page_id = 4;
    let kids: Vec<String> =
        (0..page_count).map(|i| format!("{} 0 R", first_page_id + 2 * i)).collect();

    let mut objects: Vec<(usize, Vec<u8>)> = vec![
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (
            2,
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), page_count)
                .into_bytes(),
        ),
        (3, b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec()),
    ];

    for (i, chunk) in chunks.iter().enumerate() {
        let page_id = first_page_id + 2 * i;
        let content_id = page_id + 1;

        objects.push((
            page_id,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
            )
            .into_bytes(),
        ));

        let mut stream = String::from("BT /F1 10 Tf 14 TL 50 742 Td\n");
        for (j, line) in chunk.iter().enumerate() {
            if j > 0 {
                stream.push_str("T*\n");
            }
            stream.push('(');
            stream.push_str(&escape_pdf_text(line));
            stream.push_str(") Tj\n");
        }
        stream.push_str("ET");

        objects.push((
            content_id,
            format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()).into_bytes(),
        ));
    }

    let max_id = 3 + 2 * page_count;
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let mut offsets = vec![0usize; max_id + 1];
    objects.sort_by_key(|(id, _)| *id);
    for (id, body) in &objects {
        offsets[*id] = out.len();
        out.extend(format!("{id} 0 obj\n").bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    out.extend(format!("xref\n0 {}\n", max_id + 1).bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for id in 1..=max_id {
        out.extend(format!("{:010} 00000 n \n", offsets[id]).bytes());
    }
    out.extend(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            max_id + 1
        )
        .bytes(),
    );

    out
}

/// PDF string literals reserve backslash and parentheses; anything outside
/// Latin-1 becomes a placeholder.
fn escape_pdf_text(line: &str) -> String {
    let mut escaped = String::with_capacity(line.len());
    for c in line.chars().take(110) {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '(' => escaped.push_str("\\("),
            ')' => escaped.push_str("\\)"),
            c if (c as u32) < 256 => escaped.push(c),
            _ => escaped.push('?'),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use dealscope_core::domain::benchmark::{BenchmarkReport, MetricComparison, OverallPosition};
    use dealscope_core::domain::critique::{
        CritiqueReport, FlagCategory, RedFlag, RiskLabel, Severity,
    };
    use dealscope_core::domain::facts::{IngestionMeta, SourceType, StartupFacts};
    use dealscope_core::domain::narrative::Narrative;
    use dealscope_core::domain::score::{DimensionAssessment, ScoreReport, Weights};

    use super::{
        minimal_pdf, slug, EvaluationArtifacts, ReportAgent, ReportStore, StoredReport,
    };

    fn artifacts_fixture() -> (StartupFacts, ScoreReport, CritiqueReport, Narrative, BenchmarkReport)
    {
        let mut facts = StartupFacts::empty(IngestionMeta {
            source_type: SourceType::Structured,
            source_ref: "inline".to_string(),
            slide_count: None,
            raw_content_length: 100,
            identified_sections: Vec::new(),
            missing_sections: Vec::new(),
            completeness_score: None,
        });
        facts.name = "Gridline (Freight)".to_string();

        let assessment = DimensionAssessment {
            score: 7.0,
            assessment: "solid".to_string(),
            strengths: vec!["focused".to_string()],
            concerns: Vec::new(),
        };
        let scores = ScoreReport {
            startup_name: facts.name.clone(),
            idea: assessment.clone(),
            team: assessment.clone(),
            traction: assessment.clone(),
            market: assessment,
            weights: Weights::default(),
            overall_score: 7.0,
            recommendation: "Good Investment Opportunity - Worth exploring with additional research"
                .to_string(),
            confidence: 0.7,
            degraded: false,
        };
        let critique = CritiqueReport {
            red_flags: vec![RedFlag {
                flag: "Single-region concentration".to_string(),
                severity: Severity::Medium,
                explanation: "All revenue in one corridor (so far)".to_string(),
                category: FlagCategory::Market,
            }],
            overall_risk_label: RiskLabel::LowRisk,
            summary: "One moderate concern".to_string(),
            analysis_timestamp: Utc::now(),
            degraded: false,
        };
        let narrative = Narrative {
            vision: "v".to_string(),
            differentiation: "d".to_string(),
            timing: "t".to_string(),
            tagline: "full trucks only".to_string(),
            generated_at: Utc::now(),
            degraded: false,
        };
        let benchmarks = BenchmarkReport {
            industry: "technology".to_string(),
            comparisons: vec![MetricComparison {
                metric: "revenue_growth".to_string(),
                startup_value: 40.0,
                sector_avg: 45.0,
                percentile: 44,
                insight: "slightly below".to_string(),
            }],
            overall_position: OverallPosition::Average,
            summary: "about average".to_string(),
            degraded: false,
        };

        (facts, scores, critique, narrative, benchmarks)
    }

    #[tokio::test]
    async fn rendered_report_is_a_pdf_retrievable_by_id() {
        let store = Arc::new(ReportStore::new());
        let agent = ReportAgent::without_converter(store.clone());
        let (facts, scores, critique, narrative, benchmarks) = artifacts_fixture();

        let report_id = agent
            .render(&EvaluationArtifacts {
                facts: &facts,
                scores: &scores,
                critique: &critique,
                narrative: &narrative,
                benchmarks: &benchmarks,
            })
            .await
            .expect("render");

        let stored = store.fetch(&report_id).expect("stored report");
        assert!(stored.bytes.starts_with(b"%PDF"), "missing PDF magic bytes");
        assert!(!stored.bytes.is_empty());
        assert_eq!(stored.content_type, "application/pdf");
        assert_eq!(stored.filename, "gridline-freight_evaluation.pdf");
    }

    #[tokio::test]
    async fn each_render_gets_a_fresh_id() {
        let store = Arc::new(ReportStore::new());
        let agent = ReportAgent::without_converter(store.clone());
        let (facts, scores, critique, narrative, benchmarks) = artifacts_fixture();
        let artifacts = EvaluationArtifacts {
            facts: &facts,
            scores: &scores,
            critique: &critique,
            narrative: &narrative,
            benchmarks: &benchmarks,
        };

        let first = agent.render(&artifacts).await.expect("first render");
        let second = agent.render(&artifacts).await.expect("second render");

        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unknown_report_ids_are_not_found() {
        let store = ReportStore::new();
        assert!(store.fetch("missing").is_none());

        store
            .put(
                "known",
                StoredReport {
                    bytes: b"%PDF-1.4 stub".to_vec(),
                    content_type: "application/pdf",
                    filename: "x.pdf".to_string(),
                },
            )
            .expect("put");
        assert!(store.fetch("known").is_some());
    }

    #[test]
    fn minimal_pdf_paginates_long_reports() {
        let lines: Vec<String> = (0..100).map(|i| format!("line {i}")).collect();
        let bytes = minimal_pdf(&lines);
        let text = String::from_utf8_lossy(&bytes);

        assert!(bytes.starts_with(b"%PDF"));
        assert!(text.contains("/Count 3"));
        assert!(text.ends_with("%%EOF\n"));
    }

    #[test]
    fn minimal_pdf_escapes_reserved_characters() {
        let bytes = minimal_pdf(&["has (parens) and \\ backslash".to_string()]);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains(r"has \(parens\) and \\ backslash"));
    }

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slug("Gridline (Freight)"), "gridline-freight");
        assert_eq!(slug("  Acme  Corp  "), "acme-corp");
        assert_eq!(slug("***"), "startup");
    }
}
