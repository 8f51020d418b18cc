//! Critique agent: skeptical VC pass producing ranked red flags.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use dealscope_core::domain::critique::{
    risk_label_for, truncate_ranked, CritiqueReport, FlagCategory, RedFlag, Severity,
};
use dealscope_core::domain::facts::StartupFacts;
use dealscope_core::domain::score::{Dimension, ScoreReport, DIMENSIONS};
use dealscope_core::json;

use dealscope_db::{CritiqueLogRow, CritiqueLogStore};

use crate::gateway::{GenerationOptions, InvocationResult, LlmGateway};

pub const CRITIQUE_MODEL: &str = "gemini-1.5-pro";
const SYSTEM_PROMPT: &str = "You are an experienced venture capitalist with 15+ years of \
                             investment experience. You are thorough, critical, and \
                             detail-oriented.";

pub struct CritiqueAgent {
    gateway: Arc<dyn LlmGateway>,
    log: Option<Arc<dyn CritiqueLogStore>>,
}

impl CritiqueAgent {
    pub fn new(gateway: Arc<dyn LlmGateway>, log: Option<Arc<dyn CritiqueLogStore>>) -> Self {
        Self { gateway, log }
    }

    /// Never fails. The risk label is always recomputed from the normalized
    /// flag list; a label offered by the model is discarded. Log persistence
    /// is best-effort.
    pub async fn critique(&self, scores: &ScoreReport, facts: &StartupFacts) -> CritiqueReport {
        let options = GenerationOptions::new(0.5, 2048).with_system_prompt(SYSTEM_PROMPT);
        let response =
            self.gateway.invoke(CRITIQUE_MODEL, &critique_prompt(scores, facts), &options).await;

        let report = match &response {
            InvocationResult::Ok { text } => match json::extract_object(text) {
                Some(object) => normalize_model_critique(&object),
                None => {
                    warn!("critique completion was not parseable JSON, using rule-based flags");
                    rule_based_critique(scores, facts)
                }
            },
            InvocationResult::Fallback { reason } => {
                warn!(reason = %reason, "critique gateway fell back, using rule-based flags");
                rule_based_critique(scores, facts)
            }
        };

        info!(
            startup = %facts.name,
            red_flags = report.red_flags.len(),
            risk = report.overall_risk_label.as_str(),
            "critique complete"
        );

        self.persist(&facts.name, &report).await;
        report
    }

    async fn persist(&self, startup_name: &str, report: &CritiqueReport) {
        let Some(log) = &self.log else {
            return;
        };

        let rows: Vec<CritiqueLogRow> = report
            .red_flags
            .iter()
            .map(|flag| CritiqueLogRow {
                startup_name: startup_name.to_string(),
                red_flag: flag.flag.clone(),
                severity: flag.severity.as_str().to_string(),
                explanation: flag.explanation.clone(),
                category: flag.category.as_str().to_string(),
                overall_risk_label: report.overall_risk_label.as_str().to_string(),
                summary: report.summary.clone(),
            })
            .collect();

        if let Err(error) = log.append(&rows).await {
            warn!(error = %error, "critique log append failed, continuing without persistence");
        }
    }
}

fn critique_prompt(scores: &ScoreReport, facts: &StartupFacts) -> String {
    let score_context = serde_json::json!({
        "overall_score": scores.overall_score,
        "idea": { "score": scores.idea.score, "concerns": scores.idea.concerns },
        "team": { "score": scores.team.score, "concerns": scores.team.concerns },
        "traction": { "score": scores.traction.score, "concerns": scores.traction.concerns },
        "market": { "score": scores.market.score, "concerns": scores.market.concerns },
    });
    let facts_context = serde_json::json!({
        "startup_name": facts.name,
        "description": facts.description,
        "problem": facts.problem,
        "solution": facts.solution,
        "missing_sections": facts.meta.missing_sections,
    });

    format!(
        r#"Analyze this startup critically and identify up to 5 red flags that would concern an investor.

SCORING REPORT:
{scores}

SUBMISSION SUMMARY:
{facts}

Your task:
1. Identify up to 5 red flags, each naming the dimension it concerns
2. Assign each a severity: "low", "medium", "high", or "critical"
3. Provide a brief explanation for each

Respond ONLY with valid JSON in this exact format:
{{
  "red_flags": [
    {{"flag": "...", "severity": "low|medium|high|critical", "explanation": "...",
      "category": "idea|team|traction|market|financial|technical|other"}}
  ],
  "summary": "Brief overall assessment (2-3 sentences)"
}}

Be critical but fair. Only flag genuine concerns, not minor issues."#,
        scores = serde_json::to_string_pretty(&score_context).unwrap_or_default(),
        facts = serde_json::to_string_pretty(&facts_context).unwrap_or_default(),
    )
}

fn normalize_model_critique(object: &Value) -> CritiqueReport {
    let mut flags = Vec::new();

    if let Some(raw_flags) = object.get("red_flags").and_then(Value::as_array) {
        for raw in raw_flags {
            let severity = json::string_field(raw, "severity")
                .map(|value| Severity::parse_lenient(&value))
                .unwrap_or(Severity::Medium);
            let category = json::string_field(raw, "category")
                .map(|value| FlagCategory::parse_lenient(&value))
                .unwrap_or(FlagCategory::Other);

            flags.push(RedFlag {
                flag: json::string_field(raw, "flag")
                    .unwrap_or_else(|| "Unspecified concern".to_string()),
                severity,
                explanation: json::string_field(raw, "explanation").unwrap_or_default(),
                category,
            });
        }
    }

    let flags = truncate_ranked(flags);
    let overall_risk_label = risk_label_for(&flags);

    CritiqueReport {
        summary: json::string_field(object, "summary")
            .unwrap_or_else(|| "No summary provided".to_string()),
        overall_risk_label,
        red_flags: flags,
        analysis_timestamp: Utc::now(),
        degraded: false,
    }
}

/// Deterministic critique from scores and facts alone: one flag per weak
/// dimension, one for missing core fields, one for a visibly incomplete
/// deck, and a floor flag when nothing else fires.
fn rule_based_critique(scores: &ScoreReport, facts: &StartupFacts) -> CritiqueReport {
    let mut flags = Vec::new();

    for dimension in DIMENSIONS {
        let assessment = scores.dimension(dimension);
        if assessment.score < 5.0 {
            let severity = if assessment.score < 3.0 { Severity::High } else { Severity::Medium };
            flags.push(RedFlag {
                flag: format!("Weak {} score", dimension.as_str()),
                severity,
                explanation: format!(
                    "{} scored {:.1}/10, below the investable threshold.",
                    dimension.as_str(),
                    assessment.score
                ),
                category: dimension_category(dimension),
            });
        }
    }

    let missing = facts.missing_core_fields();
    if !missing.is_empty() {
        flags.push(RedFlag {
            flag: "Missing submission details".to_string(),
            severity: Severity::Medium,
            explanation: format!("No usable content for: {}.", missing.join(", ")),
            category: FlagCategory::Other,
        });
    }

    if let Some(completeness) = facts.meta.completeness_score {
        if completeness < 0.5 {
            flags.push(RedFlag {
                flag: "Incomplete pitch deck".to_string(),
                severity: Severity::Medium,
                explanation: format!(
                    "Only {:.0}% of the standard pitch deck sections were identified.",
                    completeness * 100.0
                ),
                category: FlagCategory::Other,
            });
        }
    }

    if flags.is_empty() {
        flags.push(RedFlag {
            flag: "Insufficient data for deep critique".to_string(),
            severity: Severity::Low,
            explanation: "Automated review found no glaring weaknesses, but the rule-based \
                          pass is shallower than a model review."
                .to_string(),
            category: FlagCategory::Other,
        });
    }

    let flags = truncate_ranked(flags);
    let overall_risk_label = risk_label_for(&flags);

    CritiqueReport {
        summary: format!(
            "Identified {} area(s) of concern requiring further investigation.",
            flags.len()
        ),
        overall_risk_label,
        red_flags: flags,
        analysis_timestamp: Utc::now(),
        degraded: true,
    }
}

fn dimension_category(dimension: Dimension) -> FlagCategory {
    match dimension {
        Dimension::Idea => FlagCategory::Idea,
        Dimension::Team => FlagCategory::Team,
        Dimension::Traction => FlagCategory::Traction,
        Dimension::Market => FlagCategory::Market,
    }
}
