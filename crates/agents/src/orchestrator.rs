//! Pipeline orchestrator: ingestion, the concurrent scoring/narrative/
//! benchmark fan-out, critique, report.
//!
//! Within one evaluation, critique always observes the score report of that
//! evaluation (sequenced by await); across evaluations there is no ordering.
//! Cancelling the evaluation future cancels every inner agent call and no
//! report is written.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use dealscope_core::domain::evaluation::{DegradedComponents, EvaluationResult};
use dealscope_core::domain::facts::StructuredInput;
use dealscope_core::errors::EvaluationError;

use crate::benchmark::BenchmarkAgent;
use crate::critique::CritiqueAgent;
use crate::ingestion::{IngestionAgent, IngestionSource};
use crate::narrative::NarrativeAgent;
use crate::report::{EvaluationArtifacts, ReportAgent, ReportStore};
use crate::scoring::{ScoringAgent, ScoringInput};

pub struct Orchestrator {
    ingestion: IngestionAgent,
    scoring: ScoringAgent,
    critique: CritiqueAgent,
    narrative: NarrativeAgent,
    benchmark: BenchmarkAgent,
    report: ReportAgent,
}

impl Orchestrator {
    pub fn new(
        ingestion: IngestionAgent,
        scoring: ScoringAgent,
        critique: CritiqueAgent,
        narrative: NarrativeAgent,
        benchmark: BenchmarkAgent,
        report: ReportAgent,
    ) -> Self {
        Self { ingestion, scoring, critique, narrative, benchmark, report }
    }

    pub fn report_store(&self) -> Arc<ReportStore> {
        self.report.store()
    }

    /// Run one full evaluation. Only ingestion failure and report
    /// persistence failure abort; every other agent degrades in place and
    /// the result carries per-component degradation flags.
    pub async fn evaluate(
        &self,
        source: IngestionSource,
        supplements: Option<StructuredInput>,
    ) -> Result<EvaluationResult, EvaluationError> {
        let evaluation_id = Uuid::new_v4();
        info!(evaluation_id = %evaluation_id, "evaluation started");

        let mut facts = self.ingestion.ingest(source).await?;
        if let Some(supplements) = &supplements {
            facts.merge_blanks_from(supplements);
        }

        let scoring_input = ScoringInput::from_facts(&facts);
        let (scores, narrative, benchmarks) = tokio::join!(
            self.scoring.score(&scoring_input),
            self.narrative.narrative(&facts, None, true),
            self.benchmark.benchmark(&facts),
        );

        let critique = self.critique.critique(&scores, &facts).await;

        let report_id = self
            .report
            .render(&EvaluationArtifacts {
                facts: &facts,
                scores: &scores,
                critique: &critique,
                narrative: &narrative,
                benchmarks: &benchmarks,
            })
            .await
            .map_err(|error| EvaluationError::ReportStore(error.to_string()))?;

        let degraded = DegradedComponents {
            scoring: scores.degraded,
            critique: critique.degraded,
            narrative: narrative.degraded,
            benchmark: benchmarks.degraded,
        };

        info!(
            evaluation_id = %evaluation_id,
            startup = %facts.name,
            overall_score = scores.overall_score,
            risk = critique.overall_risk_label.as_str(),
            degraded = degraded.any(),
            report_id = %report_id,
            "evaluation complete"
        );

        Ok(EvaluationResult {
            evaluation_id,
            startup_name: facts.name.clone(),
            facts,
            scores,
            critique,
            narrative,
            benchmarks,
            report_id,
            created_at: Utc::now(),
            degraded,
        })
    }
}
