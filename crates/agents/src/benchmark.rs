//! Benchmark agent: extracted metrics against per-industry priors.
//!
//! The numbers are fully deterministic; the model, when reachable, may only
//! rewrite the per-metric insight prose.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{info, warn};

use dealscope_core::domain::benchmark::{
    percentile_higher_better, percentile_lower_better, position_for, BenchmarkReport, Industry,
    MetricComparison,
};
use dealscope_core::domain::facts::StartupFacts;
use dealscope_core::json;

use crate::gateway::{GenerationOptions, InvocationResult, LlmGateway};

pub const BENCHMARK_MODEL: &str = "gemini-1.5-pro";

pub struct BenchmarkAgent {
    gateway: Option<Arc<dyn LlmGateway>>,
}

impl BenchmarkAgent {
    pub fn new(gateway: Option<Arc<dyn LlmGateway>>) -> Self {
        Self { gateway }
    }

    pub async fn benchmark(&self, facts: &StartupFacts) -> BenchmarkReport {
        let industry = Industry::resolve(facts.sector.as_deref());
        let priors = industry.priors();
        let metrics = extract_metrics(&merged_text(facts));
        let tier = RevenueTier::from_annual_revenue(metrics.annual_revenue);

        let revenue_growth =
            metrics.growth_pct.unwrap_or(priors.revenue_growth_pct * tier.growth_factor());
        let gross_margin = priors.gross_margin_pct * tier.margin_factor();
        let cac_payback = priors.cac_payback_months * tier.payback_factor();
        let net_retention =
            metrics.retention_pct.unwrap_or(priors.net_retention_pct * tier.retention_factor());

        let mut comparisons = vec![
            comparison(
                "revenue_growth",
                revenue_growth,
                priors.revenue_growth_pct,
                percentile_higher_better(revenue_growth, priors.revenue_growth_pct),
                industry,
                "% annual growth",
            ),
            comparison(
                "gross_margin",
                gross_margin,
                priors.gross_margin_pct,
                percentile_higher_better(gross_margin, priors.gross_margin_pct),
                industry,
                "% gross margin",
            ),
            comparison(
                "cac_payback",
                cac_payback,
                priors.cac_payback_months,
                percentile_lower_better(cac_payback, priors.cac_payback_months),
                industry,
                " months CAC payback",
            ),
            comparison(
                "net_retention",
                net_retention,
                priors.net_retention_pct,
                percentile_higher_better(net_retention, priors.net_retention_pct),
                industry,
                "% net retention",
            ),
        ];

        if let Some(gateway) = &self.gateway {
            rewrite_insights(gateway.as_ref(), industry, &mut comparisons).await;
        }

        let average_percentile = comparisons
            .iter()
            .map(|comparison| comparison.percentile as f64)
            .sum::<f64>()
            / comparisons.len() as f64;
        let overall_position = position_for(average_percentile);

        let at_or_above =
            comparisons.iter().filter(|comparison| comparison.percentile >= 50).count();

        info!(
            industry = industry.label(),
            average_percentile,
            position = overall_position.as_str(),
            "benchmark complete"
        );

        BenchmarkReport {
            industry: industry.label().to_string(),
            summary: format!(
                "Against {} sector averages, {} of {} metrics sit at or above the midpoint; \
                 overall position: {}.",
                industry.label(),
                at_or_above,
                comparisons.len(),
                overall_position.as_str()
            ),
            comparisons,
            overall_position,
            degraded: false,
        }
    }
}

fn comparison(
    metric: &str,
    startup_value: f64,
    sector_avg: f64,
    percentile: u8,
    industry: Industry,
    unit: &str,
) -> MetricComparison {
    let startup_value = round_tenth(startup_value);
    let sector_avg = round_tenth(sector_avg);
    MetricComparison {
        metric: metric.to_string(),
        startup_value,
        sector_avg,
        percentile,
        insight: format!(
            "{startup_value}{unit} vs a {} average of {sector_avg}{unit} places this startup \
             near the {percentile}th percentile.",
            industry.label()
        ),
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Ask the model for friendlier insight prose. Numeric fields never change;
/// a malformed response leaves the deterministic prose in place.
async fn rewrite_insights(
    gateway: &dyn LlmGateway,
    industry: Industry,
    comparisons: &mut [MetricComparison],
) {
    let table = serde_json::to_string_pretty(&comparisons).unwrap_or_default();
    let prompt = format!(
        r#"You are a financial analyst. Rewrite the benchmark insight sentences below for an
investor audience. Do not change any numbers.

Industry: {}
Comparisons:
{table}

Respond ONLY with valid JSON: {{"insights": ["...", "...", "...", "..."]}} with one
rewritten sentence per comparison, in order."#,
        industry.label()
    );

    let response =
        gateway.invoke(BENCHMARK_MODEL, &prompt, &GenerationOptions::new(0.3, 1024)).await;

    let text = match &response {
        InvocationResult::Ok { text } => text,
        InvocationResult::Fallback { reason } => {
            warn!(reason = %reason, "insight rewrite unavailable, keeping deterministic prose");
            return;
        }
    };

    let Some(object) = json::extract_object(text) else {
        return;
    };
    let insights = json::string_list_field(&object, "insights");
    if insights.len() != comparisons.len() {
        return;
    }

    for (comparison, insight) in comparisons.iter_mut().zip(insights) {
        comparison.insight = insight;
    }
}

fn merged_text(facts: &StartupFacts) -> String {
    [&facts.description, &facts.traction, &facts.market]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct ExtractedMetrics {
    annual_revenue: Option<f64>,
    user_count: Option<f64>,
    team_size: Option<f64>,
    growth_pct: Option<f64>,
    retention_pct: Option<f64>,
}

fn money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\$\s*(\d+(?:\.\d+)?)\s*([kmb])?").expect("money regex"))
}

fn users_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d[\d,]*)\s*\+?\s*(?:[a-z]+\s+)?(users|customers|subscribers)")
            .expect("users regex")
    })
}

fn team_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(people|employees|team members)").expect("team regex")
    })
}

fn growth_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*(growth|yoy|mom)").expect("growth regex")
    })
}

fn retention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*retention").expect("retention regex")
    })
}

fn extract_metrics(text: &str) -> ExtractedMetrics {
    let mut metrics = ExtractedMetrics::default();

    if let Some(captures) = money_re().captures(text) {
        let amount: f64 = captures[1].parse().unwrap_or(0.0);
        let multiplier = match captures.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(suffix) if suffix == "k" => 1_000.0,
            Some(suffix) if suffix == "m" => 1_000_000.0,
            Some(suffix) if suffix == "b" => 1_000_000_000.0,
            _ => 1.0,
        };
        let mut revenue = amount * multiplier;
        if is_monthly_context(text, captures.get(0).expect("whole match").end()) {
            revenue *= 12.0;
        }
        metrics.annual_revenue = Some(revenue);
    }

    if let Some(captures) = users_re().captures(text) {
        metrics.user_count = captures[1].replace(',', "").parse().ok();
    }
    if let Some(captures) = team_re().captures(text) {
        metrics.team_size = captures[1].parse().ok();
    }
    if let Some(captures) = growth_re().captures(text) {
        metrics.growth_pct = captures[1].parse().ok();
    }
    if let Some(captures) = retention_re().captures(text) {
        metrics.retention_pct = captures[1].parse().ok();
    }

    metrics
}

/// A money figure counts as monthly when MRR-style wording follows it.
fn is_monthly_context(text: &str, match_end: usize) -> bool {
    let window_end = (match_end + 24).min(text.len());
    let window = text[match_end..window_end].to_ascii_lowercase();
    ["mrr", "/mo", "per month", "monthly", "a month"]
        .iter()
        .any(|marker| window.contains(marker))
}

/// Coarse revenue tier driving the heuristic metric estimates when direct
/// extraction finds nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RevenueTier {
    Unknown,
    Small,
    Mid,
    Large,
}

impl RevenueTier {
    fn from_annual_revenue(annual_revenue: Option<f64>) -> Self {
        match annual_revenue {
            None => Self::Unknown,
            Some(revenue) if revenue < 100_000.0 => Self::Small,
            Some(revenue) if revenue < 1_000_000.0 => Self::Mid,
            Some(_) => Self::Large,
        }
    }

    fn growth_factor(self) -> f64 {
        match self {
            Self::Unknown => 0.6,
            Self::Small => 0.8,
            Self::Mid => 1.0,
            Self::Large => 1.2,
        }
    }

    fn margin_factor(self) -> f64 {
        match self {
            Self::Unknown => 0.85,
            Self::Small => 0.95,
            Self::Mid => 1.0,
            Self::Large => 1.05,
        }
    }

    fn payback_factor(self) -> f64 {
        match self {
            Self::Unknown => 1.4,
            Self::Small => 1.15,
            Self::Mid => 1.0,
            Self::Large => 0.85,
        }
    }

    fn retention_factor(self) -> f64 {
        match self {
            Self::Unknown => 0.92,
            Self::Small => 0.97,
            Self::Mid => 1.0,
            Self::Large => 1.03,
        }
    }
}
