use serde::{Deserialize, Serialize};

pub const UNKNOWN_STARTUP_NAME: &str = "Unknown Startup";

/// Where the ingested material came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Pdf,
    Url,
    Structured,
}

/// Ingestion bookkeeping carried alongside the extracted fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngestionMeta {
    pub source_type: SourceType,
    pub source_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_count: Option<usize>,
    pub raw_content_length: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identified_sections: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_sections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness_score: Option<f64>,
}

/// The canonical normalized view of an input startup, independent of its
/// source format. Produced by the ingestion agent, immutable thereafter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartupFacts {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    pub meta: IngestionMeta,
}

/// Already-parsed fields accepted on the structured ingestion path.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct StructuredInput {
    #[serde(alias = "startup_name")]
    pub name: Option<String>,
    pub description: Option<String>,
    pub problem: Option<String>,
    pub solution: Option<String>,
    pub traction: Option<String>,
    pub team: Option<String>,
    pub market: Option<String>,
    pub business_model: Option<String>,
    pub competition: Option<String>,
    pub funding: Option<String>,
    pub stage: Option<String>,
    pub technology: Option<String>,
    #[serde(alias = "industry")]
    pub sector: Option<String>,
}

impl StartupFacts {
    pub fn empty(meta: IngestionMeta) -> Self {
        Self {
            name: UNKNOWN_STARTUP_NAME.to_string(),
            description: None,
            problem: None,
            solution: None,
            traction: None,
            team: None,
            market: None,
            business_model: None,
            competition: None,
            funding: None,
            stage: None,
            technology: None,
            sector: None,
            meta,
        }
    }

    /// Fields a complete submission is expected to carry; blanks here feed
    /// the critique fallback.
    pub fn missing_core_fields(&self) -> Vec<&'static str> {
        [
            ("description", &self.description),
            ("team", &self.team),
            ("traction", &self.traction),
            ("market", &self.market),
        ]
        .into_iter()
        .filter(|(_, value)| is_blank(value))
        .map(|(field, _)| field)
        .collect()
    }

    /// Fill blanks from a structured companion record, leaving extracted
    /// values untouched.
    pub fn merge_blanks_from(&mut self, input: &StructuredInput) {
        if self.name == UNKNOWN_STARTUP_NAME {
            if let Some(name) = non_blank(&input.name) {
                self.name = name;
            }
        }
        merge_field(&mut self.description, &input.description);
        merge_field(&mut self.problem, &input.problem);
        merge_field(&mut self.solution, &input.solution);
        merge_field(&mut self.traction, &input.traction);
        merge_field(&mut self.team, &input.team);
        merge_field(&mut self.market, &input.market);
        merge_field(&mut self.business_model, &input.business_model);
        merge_field(&mut self.competition, &input.competition);
        merge_field(&mut self.funding, &input.funding);
        merge_field(&mut self.stage, &input.stage);
        merge_field(&mut self.technology, &input.technology);
        merge_field(&mut self.sector, &input.sector);
    }
}

fn merge_field(target: &mut Option<String>, source: &Option<String>) {
    if is_blank(target) {
        if let Some(value) = non_blank(source) {
            *target = Some(value);
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|text| !text.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{IngestionMeta, SourceType, StartupFacts, StructuredInput, UNKNOWN_STARTUP_NAME};

    pub(crate) fn meta_fixture() -> IngestionMeta {
        IngestionMeta {
            source_type: SourceType::Structured,
            source_ref: "inline".to_string(),
            slide_count: None,
            raw_content_length: 0,
            identified_sections: Vec::new(),
            missing_sections: Vec::new(),
            completeness_score: None,
        }
    }

    #[test]
    fn empty_facts_default_the_name() {
        let facts = StartupFacts::empty(meta_fixture());
        assert_eq!(facts.name, UNKNOWN_STARTUP_NAME);
        assert_eq!(
            facts.missing_core_fields(),
            vec!["description", "team", "traction", "market"]
        );
    }

    #[test]
    fn merge_fills_only_blank_fields() {
        let mut facts = StartupFacts::empty(meta_fixture());
        facts.traction = Some("120 paying customers".to_string());

        facts.merge_blanks_from(&StructuredInput {
            name: Some("Gridline".to_string()),
            traction: Some("should not overwrite".to_string()),
            team: Some("two founders".to_string()),
            ..StructuredInput::default()
        });

        assert_eq!(facts.name, "Gridline");
        assert_eq!(facts.traction.as_deref(), Some("120 paying customers"));
        assert_eq!(facts.team.as_deref(), Some("two founders"));
    }

    #[test]
    fn whitespace_only_values_count_as_missing() {
        let mut facts = StartupFacts::empty(meta_fixture());
        facts.market = Some("   ".to_string());
        assert!(facts.missing_core_fields().contains(&"market"));
    }

    #[test]
    fn serialization_uses_snake_case_source_type() {
        let facts = StartupFacts::empty(meta_fixture());
        let json = serde_json::to_value(&facts).expect("serialize");
        assert_eq!(json["meta"]["source_type"], "structured");
    }
}
