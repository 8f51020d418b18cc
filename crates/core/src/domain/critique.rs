use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MAX_RED_FLAGS: usize = 5;

/// Red flag severity, ordered so that `Critical` sorts highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] =
        [Severity::Low, Severity::Medium, Severity::High, Severity::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse a model-provided severity, coercing unknown values to the
    /// nearest member by edit distance. The coercion is logged; ties and
    /// hopeless inputs land on `Medium`.
    pub fn parse_lenient(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        if let Some(exact) =
            Self::ALL.into_iter().find(|severity| severity.as_str() == normalized)
        {
            return exact;
        }

        let coerced = Self::ALL
            .into_iter()
            .map(|severity| (levenshtein(&normalized, severity.as_str()), severity))
            .min_by_key(|(distance, _)| *distance)
            .filter(|(distance, _)| *distance <= 3)
            .map(|(_, severity)| severity)
            .unwrap_or(Self::Medium);

        warn!(raw = %raw, coerced = coerced.as_str(), "coerced unknown red flag severity");
        coerced
    }
}

/// Which part of the evaluation a red flag belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagCategory {
    Idea,
    Team,
    Traction,
    Market,
    Financial,
    Technical,
    Other,
}

impl FlagCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::Team => "team",
            Self::Traction => "traction",
            Self::Market => "market",
            Self::Financial => "financial",
            Self::Technical => "technical",
            Self::Other => "other",
        }
    }

    /// Unknown categories collapse to `Other`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "idea" => Self::Idea,
            "team" => Self::Team,
            "traction" => Self::Traction,
            "market" => Self::Market,
            "financial" => Self::Financial,
            "technical" => Self::Technical,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RedFlag {
    pub flag: String,
    pub severity: Severity,
    pub explanation: String,
    pub category: FlagCategory,
}

/// Overall risk label, a deterministic function of the red flag list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLabel {
    LowRisk,
    ModerateRisk,
    HighRisk,
    VeryHighRisk,
}

impl RiskLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LowRisk => "low_risk",
            Self::ModerateRisk => "moderate_risk",
            Self::HighRisk => "high_risk",
            Self::VeryHighRisk => "very_high_risk",
        }
    }
}

/// Any critical flag dominates; otherwise the high and medium counts decide.
pub fn risk_label_for(flags: &[RedFlag]) -> RiskLabel {
    let critical = count(flags, Severity::Critical);
    let high = count(flags, Severity::High);
    let medium = count(flags, Severity::Medium);

    if critical >= 1 {
        RiskLabel::VeryHighRisk
    } else if high >= 2 {
        RiskLabel::HighRisk
    } else if high == 1 || medium >= 2 {
        RiskLabel::ModerateRisk
    } else {
        RiskLabel::LowRisk
    }
}

fn count(flags: &[RedFlag], severity: Severity) -> usize {
    flags.iter().filter(|flag| flag.severity == severity).count()
}

/// Keep at most [`MAX_RED_FLAGS`] flags, highest severity first. The sort is
/// stable, so ties preserve model order.
pub fn truncate_ranked(mut flags: Vec<RedFlag>) -> Vec<RedFlag> {
    flags.sort_by(|a, b| b.severity.cmp(&a.severity));
    flags.truncate(MAX_RED_FLAGS);
    flags
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CritiqueReport {
    pub red_flags: Vec<RedFlag>,
    pub overall_risk_label: RiskLabel,
    pub summary: String,
    pub analysis_timestamp: DateTime<Utc>,
    pub degraded: bool,
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
