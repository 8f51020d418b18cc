//! Slide segmentation, classification, and the missing-slides audit.
//!
//! Segmentation is deterministic on the extracted page strings. Candidate
//! boundaries are tried in order: form feeds, explicit "Slide N" markers,
//! page breaks, and finally paragraph grouping when the whole document came
//! back as one blob.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use dealscope_core::json;

use crate::gateway::{GenerationOptions, InvocationResult, LlmGateway};

const PARAGRAPH_CHUNK_CHARS: usize = 1500;
const CLASSIFY_MODEL: &str = "gemini-1.5-pro";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slide {
    pub index: usize,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SlideType {
    Title,
    Problem,
    Solution,
    MarketOpportunity,
    ProductService,
    BusinessModel,
    Traction,
    Team,
    Competition,
    FinancialProjections,
    FundingAsk,
    Roadmap,
    Contact,
    Other,
}

impl SlideType {
    pub const STANDARD: [SlideType; 13] = [
        SlideType::Title,
        SlideType::Problem,
        SlideType::Solution,
        SlideType::MarketOpportunity,
        SlideType::ProductService,
        SlideType::BusinessModel,
        SlideType::Traction,
        SlideType::Team,
        SlideType::Competition,
        SlideType::FinancialProjections,
        SlideType::FundingAsk,
        SlideType::Roadmap,
        SlideType::Contact,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Problem => "Problem",
            Self::Solution => "Solution",
            Self::MarketOpportunity => "Market Opportunity",
            Self::ProductService => "Product/Service",
            Self::BusinessModel => "Business Model",
            Self::Traction => "Traction",
            Self::Team => "Team",
            Self::Competition => "Competition",
            Self::FinancialProjections => "Financial Projections",
            Self::FundingAsk => "Funding Ask",
            Self::Roadmap => "Roadmap",
            Self::Contact => "Contact",
            Self::Other => "Other",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        Self::STANDARD
            .into_iter()
            .chain([Self::Other])
            .find(|slide_type| slide_type.label().to_lowercase() == normalized)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedSlide {
    pub slide: Slide,
    pub slide_type: SlideType,
    pub confidence: f64,
}

fn slide_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*slide\s+\d+").expect("slide marker regex"))
}

/// Chunk extracted pages into slide candidates.
pub fn segment_slides(pages: &[String]) -> Vec<Slide> {
    let corpus = pages.join("\n\n");

    if corpus.contains('\u{c}') {
        return to_slides(corpus.split('\u{c}').map(str::to_string).collect());
    }

    let marker_count = slide_marker_re().find_iter(&corpus).count();
    if marker_count >= 2 {
        return to_slides(split_before_markers(&corpus));
    }

    if pages.len() > 1 {
        return to_slides(pages.to_vec());
    }

    to_slides(group_paragraphs(&corpus))
}

fn to_slides(chunks: Vec<String>) -> Vec<Slide> {
    chunks
        .into_iter()
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .enumerate()
        .map(|(offset, text)| Slide { index: offset + 1, text })
        .collect()
}

fn split_before_markers(corpus: &str) -> Vec<String> {
    let starts: Vec<usize> = slide_marker_re().find_iter(corpus).map(|m| m.start()).collect();
    let mut chunks = Vec::with_capacity(starts.len() + 1);

    if let Some(&first) = starts.first() {
        if first > 0 {
            chunks.push(corpus[..first].to_string());
        }
    }
    for window in starts.windows(2) {
        chunks.push(corpus[window[0]..window[1]].to_string());
    }
    if let Some(&last) = starts.last() {
        chunks.push(corpus[last..].to_string());
    }

    chunks
}

/// Group paragraphs into chunks of roughly [`PARAGRAPH_CHUNK_CHARS`], used
/// when the extractor returned a single undifferentiated blob.
fn group_paragraphs(corpus: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_length = 0;

    for paragraph in corpus.split("\n\n") {
        let length = paragraph.len();
        if current_length > 0 && current_length + length > PARAGRAPH_CHUNK_CHARS {
            chunks.push(current.join("\n\n"));
            current = vec![paragraph];
            current_length = length;
        } else {
            current.push(paragraph);
            current_length += length;
        }
    }
    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }

    chunks
}

/// Classify slides, preferring the model and falling back to keyword rules
/// slide by slide.
pub async fn classify_slides(
    gateway: Option<&dyn LlmGateway>,
    slides: &[Slide],
) -> Vec<ClassifiedSlide> {
    let mut classified = Vec::with_capacity(slides.len());
    let mut model_available = gateway.is_some();

    for slide in slides {
        let from_model = if model_available {
            match classify_with_model(gateway.expect("checked above"), slide).await {
                Some(result) => Some(result),
                None => {
                    // One failed call disables the model for the rest of the
                    // deck; per-slide retries would multiply the damage.
                    model_available = false;
                    None
                }
            }
        } else {
            None
        };

        let (slide_type, confidence) =
            from_model.unwrap_or_else(|| classify_by_keywords(&slide.text));
        classified.push(ClassifiedSlide { slide: slide.clone(), slide_type, confidence });
    }

    classified
}

async fn classify_with_model(
    gateway: &dyn LlmGateway,
    slide: &Slide,
) -> Option<(SlideType, f64)> {
    let excerpt: String = slide.text.chars().take(500).collect();
    let labels: Vec<&str> = SlideType::STANDARD
        .into_iter()
        .chain([SlideType::Other])
        .map(SlideType::label)
        .collect();
    let prompt = format!(
        r#"Classify this pitch deck slide as one of: {labels}.

Content:
{excerpt}

Respond ONLY with JSON: {{"slide_type": "<label>", "confidence": 0.0}}"#,
        labels = labels.join(", "),
    );

    let response =
        gateway.invoke(CLASSIFY_MODEL, &prompt, &GenerationOptions::new(0.3, 200)).await;
    let text = match &response {
        InvocationResult::Ok { text } => text,
        InvocationResult::Fallback { reason } => {
            warn!(reason = %reason, "slide classification fell back to keyword rules");
            return None;
        }
    };

    let object = json::extract_object(text)?;
    let slide_type = SlideType::from_label(&json::string_field(&object, "slide_type")?)?;
    let confidence = json::number_field(&object, "confidence").unwrap_or(0.5).clamp(0.0, 1.0);
    Some((slide_type, confidence))
}

/// Keyword classification, mirrored on the common wording of each standard
/// slide. Order matters: earlier rules win on overlapping vocabulary.
pub fn classify_by_keywords(text: &str) -> (SlideType, f64) {
    let lower = text.to_lowercase();
    let contains_any =
        |words: &[&str]| words.iter().any(|word| lower.contains(word));

    let slide_type = if contains_any(&["problem", "pain point", "challenge"]) {
        SlideType::Problem
    } else if contains_any(&["solution", "how it works"]) {
        SlideType::Solution
    } else if contains_any(&["market", "tam", "sam", "addressable"]) {
        SlideType::MarketOpportunity
    } else if contains_any(&["traction", "mrr", "arr", "users", "customers", "retention"]) {
        SlideType::Traction
    } else if contains_any(&["team", "founder", "advisor"]) {
        SlideType::Team
    } else if contains_any(&["competition", "competitor", "landscape", "alternatives"]) {
        SlideType::Competition
    } else if contains_any(&["business model", "pricing", "revenue model", "monetization"]) {
        SlideType::BusinessModel
    } else if contains_any(&["financial", "projection", "forecast"]) {
        SlideType::FinancialProjections
    } else if contains_any(&["funding", "raising", "raise", "seeking", "investment ask"]) {
        SlideType::FundingAsk
    } else if contains_any(&["roadmap", "milestone", "timeline"]) {
        SlideType::Roadmap
    } else if contains_any(&["contact", "@", "www.", "reach us"]) {
        SlideType::Contact
    } else if contains_any(&["product", "platform", "service"]) {
        SlideType::ProductService
    } else if lower.len() < 200 && contains_any(&["pitch", "deck", "presents"]) {
        SlideType::Title
    } else {
        SlideType::Other
    };

    (slide_type, 0.6)
}

/// Which standard slides were identified, which are absent, and the
/// identified/standard ratio.
#[derive(Clone, Debug, PartialEq)]
pub struct SlideAudit {
    pub identified: Vec<String>,
    pub missing: Vec<String>,
    pub completeness_score: f64,
}

pub fn audit_slides(classified: &[ClassifiedSlide]) -> SlideAudit {
    let mut identified = Vec::new();
    for slide in classified {
        if slide.slide_type == SlideType::Other {
            continue;
        }
        let label = slide.slide_type.label().to_string();
        if !identified.contains(&label) {
            identified.push(label);
        }
    }

    let missing: Vec<String> = SlideType::STANDARD
        .into_iter()
        .map(|slide_type| slide_type.label().to_string())
        .filter(|label| !identified.contains(label))
        .collect();

    let completeness_score = identified.len() as f64 / SlideType::STANDARD.len() as f64;

    SlideAudit { identified, missing, completeness_score }
}

#[cfg(test)]
mod tests {
    use super::{
        audit_slides, classify_by_keywords, classify_slides, segment_slides, SlideType,
    };
    use crate::gateway::{LlmGateway, OfflineGateway, ScriptedGateway};

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn form_feeds_take_precedence_over_everything() {
        let slides =
            segment_slides(&pages(&["intro\u{c}Slide 2 problem\u{c}solution details"]));
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[0].text, "intro");
        assert_eq!(slides[2].index, 3);
    }

    #[test]
    fn slide_markers_split_when_no_form_feeds() {
        let corpus = "Slide 1\nOur big problem\n\nSlide 2\nOur clever solution\n\nSlide 3\nThe team";
        let slides = segment_slides(&pages(&[corpus]));
        assert_eq!(slides.len(), 3);
        assert!(slides[1].text.starts_with("Slide 2"));
    }

    #[test]
    fn multiple_pages_become_one_slide_each() {
        let slides = segment_slides(&pages(&["page a", "page b", "page c"]));
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[1].text, "page b");
    }

    #[test]
    fn single_blob_falls_back_to_paragraph_grouping() {
        let paragraph = "word ".repeat(120);
        let blob = vec![paragraph.trim().to_string(); 6].join("\n\n");
        let slides = segment_slides(&pages(&[blob.as_str()]));
        assert!(slides.len() > 1, "expected grouping to produce several chunks");
        assert!(slides.iter().all(|slide| !slide.text.is_empty()));
    }

    #[test]
    fn blank_chunks_are_dropped_and_indexes_are_sequential() {
        let slides = segment_slides(&pages(&["a\u{c}\u{c}   \u{c}b"]));
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].index, 1);
        assert_eq!(slides[1].index, 2);
    }

    #[test]
    fn keyword_rules_cover_the_standard_types() {
        let cases = [
            ("The problem: clinics waste hours on paperwork", SlideType::Problem),
            ("Our solution automates intake end to end", SlideType::Solution),
            ("TAM of $40B and growing", SlideType::MarketOpportunity),
            ("Traction: 300 customers, $40K MRR", SlideType::Traction),
            ("Team: two founders, ex-Stripe", SlideType::Team),
            ("Competition: legacy EHR vendors", SlideType::Competition),
            ("Business model: per-seat pricing", SlideType::BusinessModel),
            ("Financial projections for FY26", SlideType::FinancialProjections),
            ("We are raising $2M seed", SlideType::FundingAsk),
            ("Roadmap: Q3 multi-region", SlideType::Roadmap),
            ("Contact: hello@example.com", SlideType::Contact),
            ("random words with no signal", SlideType::Other),
        ];
        for (text, expected) in cases {
            assert_eq!(classify_by_keywords(text).0, expected, "text: {text}");
        }
    }

    #[tokio::test]
    async fn model_classification_is_used_when_parseable() {
        let gateway = ScriptedGateway::new().respond(
            "Classify this pitch deck slide",
            r#"{"slide_type": "Funding Ask", "confidence": 0.9}"#,
        );
        let slides = segment_slides(&pages(&["page a", "page b"]));
        let classified = classify_slides(Some(&gateway as &dyn LlmGateway), &slides).await;

        assert_eq!(classified[0].slide_type, SlideType::FundingAsk);
        assert_eq!(classified[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn offline_model_falls_back_to_keyword_rules() {
        let slides = segment_slides(&pages(&["Traction: 500 users", "Team of founders"]));
        let classified = classify_slides(Some(&OfflineGateway as &dyn LlmGateway), &slides).await;

        assert_eq!(classified[0].slide_type, SlideType::Traction);
        assert_eq!(classified[1].slide_type, SlideType::Team);
        assert!(classified.iter().all(|slide| slide.confidence == 0.6));
    }

    #[tokio::test]
    async fn audit_reports_missing_types_and_completeness() {
        let slides = segment_slides(&pages(&[
            "The problem: manual work",
            "Our solution: automation",
            "Traction: 200 customers",
        ]));
        let classified = classify_slides(None, &slides).await;
        let audit = audit_slides(&classified);

        assert_eq!(audit.identified, vec!["Problem", "Solution", "Traction"]);
        assert!(audit.missing.contains(&"Team".to_string()));
        assert!(audit.missing.contains(&"Funding Ask".to_string()));
        assert!((audit.completeness_score - 3.0 / 13.0).abs() < 1e-9);
    }
}
