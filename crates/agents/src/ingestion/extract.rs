//! Structured extraction of the thirteen `StartupFacts` fields from an
//! ingested corpus, with per-field keyword fallbacks.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use dealscope_core::domain::facts::{IngestionMeta, StartupFacts, UNKNOWN_STARTUP_NAME};
use dealscope_core::json;

use crate::gateway::{GenerationOptions, InvocationResult, LlmGateway};

pub const EXTRACTION_MODEL: &str = "gemini-1.5-pro";
const PROMPT_CORPUS_LIMIT: usize = 8000;
const SYSTEM_PROMPT: &str = "You are a data extraction agent for a startup analysis platform. \
                             Extract only information explicitly present in the content.";

/// Turn a corpus into `StartupFacts`. Model extraction first; any field the
/// model leaves blank is filled from the keyword heuristics, so a dead
/// gateway still yields a usable record.
pub async fn extract_facts(
    gateway: &dyn LlmGateway,
    corpus: &str,
    meta: IngestionMeta,
) -> StartupFacts {
    let options = GenerationOptions::new(0.3, 2048).with_system_prompt(SYSTEM_PROMPT);
    let response =
        gateway.invoke(EXTRACTION_MODEL, &extraction_prompt(corpus), &options).await;

    let parsed = match &response {
        InvocationResult::Ok { text } => json::extract_object(text),
        InvocationResult::Fallback { reason } => {
            warn!(reason = %reason, "fact extraction fell back to keyword heuristics");
            None
        }
    };

    let model_field = |name: &str| -> Option<String> {
        parsed.as_ref().and_then(|object| json::string_field(object, name))
    };

    let heuristics = heuristic_fields(corpus);

    let mut facts = StartupFacts::empty(meta);
    facts.name = model_field("startup_name")
        .or(heuristics.name)
        .unwrap_or_else(|| UNKNOWN_STARTUP_NAME.to_string());
    facts.description = model_field("description").or(heuristics.description);
    facts.problem = model_field("problem").or(heuristics.problem);
    facts.solution = model_field("solution").or(heuristics.solution);
    facts.traction = model_field("traction").or(heuristics.traction);
    facts.team = model_field("team").or(heuristics.team);
    facts.market = model_field("market").or(heuristics.market);
    facts.business_model = model_field("business_model");
    facts.competition = model_field("competition");
    facts.funding = model_field("funding");
    facts.stage = model_field("stage");
    facts.technology = model_field("technology");
    facts.sector = model_field("sector").or(heuristics.sector);

    facts
}

fn extraction_prompt(corpus: &str) -> String {
    let truncated: String = corpus.chars().take(PROMPT_CORPUS_LIMIT).collect();
    format!(
        r#"Extract structured information about a startup from this content:

{truncated}

Extract and structure the following information in JSON format:
{{
    "startup_name": "Name of the startup/company",
    "description": "Brief description of what the company does (2-3 sentences)",
    "problem": "The problem the startup is solving",
    "solution": "The solution/product the startup offers",
    "traction": "Current traction, metrics, users, revenue, growth, milestones",
    "team": "Founding team members and their backgrounds",
    "market": "Target market, market size, opportunity",
    "business_model": "How the company makes money",
    "competition": "Competitive landscape or differentiation",
    "funding": "Funding status, amount raised, investors (if mentioned)",
    "stage": "Company stage (e.g., Pre-seed, Seed, Series A)",
    "technology": "Technology stack or key technologies used",
    "sector": "Industry sector (e.g., SaaS, Fintech, Healthcare)"
}}

If information is not available in the content, use an empty string.
Only extract information that is clearly stated in the content."#
    )
}

struct HeuristicFields {
    name: Option<String>,
    description: Option<String>,
    problem: Option<String>,
    solution: Option<String>,
    traction: Option<String>,
    team: Option<String>,
    market: Option<String>,
    sector: Option<String>,
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)(?:[Cc]ompany|[Ss]tartup|[Nn]ame)[:\s]+([A-Z][A-Za-z0-9&.\- ]{1,40})")
            .expect("name regex")
    })
}

fn labeled_section_re(label_alternatives: &str) -> Regex {
    Regex::new(&format!(
        r"(?is)(?:{label_alternatives})[:\s]+(.{{10,400}}?)(?:\n\n|\z)"
    ))
    .expect("labeled section regex")
}

const SECTOR_KEYWORDS: [&str; 6] =
    ["fintech", "healthcare", "e-commerce", "saas", "food-delivery", "technology"];

fn heuristic_fields(corpus: &str) -> HeuristicFields {
    let lower = corpus.to_lowercase();

    let name = name_re()
        .captures(corpus)
        .map(|captures| captures[1].trim().trim_end_matches(['.', ',']).to_string())
        .filter(|name| !name.is_empty());

    let section = |labels: &str| -> Option<String> {
        labeled_section_re(labels)
            .captures(corpus)
            .map(|captures| captures[1].split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|text| !text.is_empty())
    };

    let description = if corpus.trim().is_empty() {
        None
    } else {
        let clipped: String = corpus.trim().chars().take(300).collect();
        Some(clipped.split_whitespace().collect::<Vec<_>>().join(" "))
    };

    HeuristicFields {
        name,
        description,
        problem: section("problem|pain point|challenge"),
        solution: section("solution|product|service|offering"),
        traction: section("traction|users|customers|revenue|growth|metrics"),
        team: section("team|founders|founded by"),
        market: section("market|tam|opportunity"),
        sector: Some(
            SECTOR_KEYWORDS
                .iter()
                .find(|keyword| lower.contains(**keyword))
                .copied()
                .unwrap_or("technology")
                .to_string(),
        ),
    }
}
