use serde::{Deserialize, Serialize};

pub const PERCENTILE_FLOOR: u8 = 10;
pub const PERCENTILE_CEILING: u8 = 95;

/// Industries with maintained priors. Free-form sector labels resolve here
/// case-insensitively; anything unrecognized lands on `Technology`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Industry {
    Technology,
    Fintech,
    Healthcare,
    ECommerce,
    Saas,
    FoodDelivery,
}

impl Industry {
    pub const ALL: [Industry; 6] = [
        Industry::Technology,
        Industry::Fintech,
        Industry::Healthcare,
        Industry::ECommerce,
        Industry::Saas,
        Industry::FoodDelivery,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Technology => "technology",
            Self::Fintech => "fintech",
            Self::Healthcare => "healthcare",
            Self::ECommerce => "e-commerce",
            Self::Saas => "saas",
            Self::FoodDelivery => "food-delivery",
        }
    }

    pub fn resolve(sector: Option<&str>) -> Self {
        let Some(sector) = sector else {
            return Self::Technology;
        };
        let normalized = sector.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|industry| industry.label() == normalized)
            .unwrap_or(Self::Technology)
    }

    /// Per-industry priors: typical revenue growth, gross margin, CAC
    /// payback, and net retention for an early-stage company.
    pub fn priors(self) -> IndustryPriors {
        match self {
            Self::Technology => IndustryPriors::new(45.0, 75.0, 12.0, 110.0),
            Self::Fintech => IndustryPriors::new(60.0, 80.0, 8.0, 115.0),
            Self::Healthcare => IndustryPriors::new(35.0, 70.0, 18.0, 105.0),
            Self::ECommerce => IndustryPriors::new(40.0, 60.0, 15.0, 108.0),
            Self::Saas => IndustryPriors::new(50.0, 85.0, 10.0, 120.0),
            Self::FoodDelivery => IndustryPriors::new(30.0, 45.0, 20.0, 95.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndustryPriors {
    pub revenue_growth_pct: f64,
    pub gross_margin_pct: f64,
    pub cac_payback_months: f64,
    pub net_retention_pct: f64,
}

impl IndustryPriors {
    const fn new(
        revenue_growth_pct: f64,
        gross_margin_pct: f64,
        cac_payback_months: f64,
        net_retention_pct: f64,
    ) -> Self {
        Self { revenue_growth_pct, gross_margin_pct, cac_payback_months, net_retention_pct }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: String,
    pub startup_value: f64,
    pub sector_avg: f64,
    pub percentile: u8,
    pub insight: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallPosition {
    TopDecile,
    TopQuartile,
    AboveAverage,
    Average,
    BelowAverage,
}

impl OverallPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopDecile => "top_decile",
            Self::TopQuartile => "top_quartile",
            Self::AboveAverage => "above_average",
            Self::Average => "average",
            Self::BelowAverage => "below_average",
        }
    }
}

/// Position from the mean percentile across compared metrics.
pub fn position_for(average_percentile: f64) -> OverallPosition {
    if average_percentile >= 90.0 {
        OverallPosition::TopDecile
    } else if average_percentile >= 75.0 {
        OverallPosition::TopQuartile
    } else if average_percentile >= 55.0 {
        OverallPosition::AboveAverage
    } else if average_percentile >= 40.0 {
        OverallPosition::Average
    } else {
        OverallPosition::BelowAverage
    }
}

/// Percentile for a metric where more is better: the prior marks the 50th
/// percentile, clamped into `[10, 95]`.
pub fn percentile_higher_better(startup_value: f64, prior: f64) -> u8 {
    if prior <= 0.0 {
        return 50;
    }
    clamp_percentile(startup_value / prior * 50.0)
}

/// Percentile for a metric where less is better (CAC payback).
pub fn percentile_lower_better(startup_value: f64, prior: f64) -> u8 {
    if startup_value <= 0.0 {
        return PERCENTILE_CEILING;
    }
    clamp_percentile(prior / startup_value * 50.0)
}

fn clamp_percentile(raw: f64) -> u8 {
    (raw.round() as i64).clamp(PERCENTILE_FLOOR as i64, PERCENTILE_CEILING as i64) as u8
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub industry: String,
    pub comparisons: Vec<MetricComparison>,
    pub overall_position: OverallPosition,
    pub summary: String,
    pub degraded: bool,
}
