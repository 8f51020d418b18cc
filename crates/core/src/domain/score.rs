use serde::{Deserialize, Serialize};

/// The four axes every startup is scored on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Idea,
    Team,
    Traction,
    Market,
}

pub const DIMENSIONS: [Dimension; 4] =
    [Dimension::Idea, Dimension::Team, Dimension::Traction, Dimension::Market];

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::Team => "team",
            Self::Traction => "traction",
            Self::Market => "market",
        }
    }

    /// Fixed weight vector; team carries the most weight.
    pub fn weight(self) -> f64 {
        match self {
            Self::Idea => 0.25,
            Self::Team => 0.30,
            Self::Traction => 0.25,
            Self::Market => 0.20,
        }
    }
}

/// Assessment of one dimension: a clamped score with short supporting prose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensionAssessment {
    pub score: f64,
    pub assessment: String,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
}

/// Fixed weights, serialized alongside every report so readers can verify
/// the composite.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub idea: f64,
    pub team: f64,
    pub traction: f64,
    pub market: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            idea: Dimension::Idea.weight(),
            team: Dimension::Team.weight(),
            traction: Dimension::Traction.weight(),
            market: Dimension::Market.weight(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub startup_name: String,
    pub idea: DimensionAssessment,
    pub team: DimensionAssessment,
    pub traction: DimensionAssessment,
    pub market: DimensionAssessment,
    pub weights: Weights,
    pub overall_score: f64,
    pub recommendation: String,
    pub confidence: f64,
    pub degraded: bool,
}

impl ScoreReport {
    pub fn dimension(&self, dimension: Dimension) -> &DimensionAssessment {
        match dimension {
            Dimension::Idea => &self.idea,
            Dimension::Team => &self.team,
            Dimension::Traction => &self.traction,
            Dimension::Market => &self.market,
        }
    }
}

/// Clamp a raw dimension score into the `[0, 10]` band.
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 10.0)
}

/// Weighted composite of the four dimension scores, rounded to one decimal
/// and clamped to `[0, 10]`.
pub fn weighted_overall(idea: f64, team: f64, traction: f64, market: f64) -> f64 {
    let composite = idea * Dimension::Idea.weight()
        + team * Dimension::Team.weight()
        + traction * Dimension::Traction.weight()
        + market * Dimension::Market.weight();
    round_to_tenth(composite.clamp(0.0, 10.0))
}

pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Investment recommendation from the composite score thresholds.
pub fn recommendation_for(overall_score: f64) -> &'static str {
    if overall_score >= 8.0 {
        "Strong Investment Opportunity - High conviction"
    } else if overall_score >= 6.5 {
        "Good Investment Opportunity - Worth exploring with additional research"
    } else if overall_score >= 5.0 {
        "Moderate Opportunity - Needs improvement in key areas"
    } else if overall_score >= 3.5 {
        "Weak Opportunity - Significant concerns"
    } else {
        "Not Recommended - Too many red flags"
    }
}

#[cfg(test)]
mod tests {
    use super::{
        clamp_score, recommendation_for, weighted_overall, Dimension, Weights, DIMENSIONS,
    };

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = DIMENSIONS.iter().map(|dimension| dimension.weight()).sum();
        assert!((total - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_weights_match_the_dimension_vector() {
        let weights = Weights::default();
        assert_eq!(weights.idea, 0.25);
        assert_eq!(weights.team, 0.30);
        assert_eq!(weights.traction, 0.25);
        assert_eq!(weights.market, 0.20);
    }

    #[test]
    fn weighted_overall_matches_hand_computed_composite() {
        // 7.5*0.25 + 8.0*0.30 + 6.5*0.25 + 7.0*0.20 = 7.3
        assert_eq!(weighted_overall(7.5, 8.0, 6.5, 7.0), 7.3);
    }

    #[test]
    fn weighted_overall_rounds_to_one_decimal() {
        let overall = weighted_overall(7.33, 6.21, 5.55, 8.12);
        assert_eq!((overall * 10.0).fract(), 0.0);
    }

    #[test]
    fn overall_stays_within_band_at_the_extremes() {
        assert_eq!(weighted_overall(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(weighted_overall(10.0, 10.0, 10.0, 10.0), 10.0);
    }

    #[test]
    fn dimension_scores_are_clamped() {
        assert_eq!(clamp_score(12.4), 10.0);
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(6.1), 6.1);
    }

    #[test]
    fn recommendation_thresholds_are_inclusive() {
        assert!(recommendation_for(8.0).starts_with("Strong"));
        assert!(recommendation_for(7.9).starts_with("Good"));
        assert!(recommendation_for(6.5).starts_with("Good"));
        assert!(recommendation_for(5.0).starts_with("Moderate"));
        assert!(recommendation_for(3.5).starts_with("Weak"));
        assert!(recommendation_for(3.4).starts_with("Not Recommended"));
    }

    #[test]
    fn dimension_labels_are_lower_snake() {
        assert_eq!(Dimension::Market.as_str(), "market");
        let json = serde_json::to_string(&Dimension::Traction).expect("serialize");
        assert_eq!(json, "\"traction\"");
    }
}
