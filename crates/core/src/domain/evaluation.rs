use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::benchmark::BenchmarkReport;
use crate::domain::critique::CritiqueReport;
use crate::domain::facts::StartupFacts;
use crate::domain::narrative::Narrative;
use crate::domain::score::ScoreReport;

/// Which agents took their rule-based path during an evaluation. A degraded
/// output is well-typed and indistinguishable in shape from a full one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedComponents {
    pub scoring: bool,
    pub critique: bool,
    pub narrative: bool,
    pub benchmark: bool,
}

impl DegradedComponents {
    pub fn any(self) -> bool {
        self.scoring || self.critique || self.narrative || self.benchmark
    }
}

/// One end-to-end run through the orchestrator: every agent output plus the
/// handle of the persisted report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub evaluation_id: Uuid,
    pub startup_name: String,
    pub facts: StartupFacts,
    pub scores: ScoreReport,
    pub critique: CritiqueReport,
    pub narrative: Narrative,
    pub benchmarks: BenchmarkReport,
    pub report_id: String,
    pub created_at: DateTime<Utc>,
    pub degraded: DegradedComponents,
}

impl EvaluationResult {
    /// Path the HTTP surface serves the PDF under.
    pub fn report_url(&self) -> String {
        format!("/evaluate/reports/{}.pdf", self.report_id)
    }
}
