//! Narrative agent: the three-part investor story plus tagline, with an
//! optional TTL cache in front of the model.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use dealscope_core::domain::facts::StartupFacts;
use dealscope_core::domain::narrative::{cache_key, clip_tagline, Narrative};
use dealscope_core::json;

use dealscope_db::NarrativeCache;

use crate::gateway::{GenerationOptions, InvocationResult, LlmGateway};

pub const NARRATIVE_MODEL: &str = "gemini-1.5-pro";

pub struct NarrativeAgent {
    gateway: Arc<dyn LlmGateway>,
    cache: Option<Arc<dyn NarrativeCache>>,
    ttl: Duration,
}

impl NarrativeAgent {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        cache: Option<Arc<dyn NarrativeCache>>,
        ttl: Duration,
    ) -> Self {
        Self { gateway, cache, ttl }
    }

    /// Never fails. With a `startup_id` and `use_cache`, a fresh result is
    /// written back under `narrative:{startup_id}`; cache trouble is warned
    /// and ignored.
    pub async fn narrative(
        &self,
        facts: &StartupFacts,
        startup_id: Option<&str>,
        use_cache: bool,
    ) -> Narrative {
        if use_cache {
            if let Some(id) = startup_id {
                if let Some(cached) = self.read_cache(id).await {
                    info!(startup_id = id, "narrative served from cache");
                    return cached;
                }
            }
        }

        let options = GenerationOptions::new(0.7, 1024);
        let response =
            self.gateway.invoke(NARRATIVE_MODEL, &narrative_prompt(facts), &options).await;

        let parsed = match &response {
            InvocationResult::Ok { text } => json::extract_object(text),
            InvocationResult::Fallback { reason } => {
                warn!(reason = %reason, "narrative gateway fell back, using template narrative");
                None
            }
        };

        let mut degraded = false;
        let mut field = |name: &str, fallback: String| -> String {
            match parsed.as_ref().and_then(|object| json::string_field(object, name)) {
                Some(value) => value,
                None => {
                    degraded = true;
                    fallback
                }
            }
        };

        let vision = field("vision", fallback_vision(facts));
        let differentiation = field("differentiation", fallback_differentiation(facts));
        let timing = field("timing", fallback_timing(facts));
        let tagline = clip_tagline(&field("tagline", fallback_tagline(facts)));

        let narrative = Narrative {
            vision,
            differentiation,
            timing,
            tagline,
            generated_at: Utc::now(),
            degraded,
        };

        if use_cache {
            if let Some(id) = startup_id {
                self.write_cache(id, &narrative).await;
            }
        }

        narrative
    }

    /// Cached narrative for the admin surface; `None` covers "no cache
    /// configured", miss, and unreadable entries alike.
    pub async fn cached(&self, startup_id: &str) -> Option<Narrative> {
        self.read_cache(startup_id).await
    }

    /// Returns whether an entry was removed. `false` when no cache is
    /// configured or the store failed.
    pub async fn clear_cached(&self, startup_id: &str) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        match cache.delete(&cache_key(startup_id)).await {
            Ok(existed) => existed,
            Err(error) => {
                warn!(error = %error, startup_id, "narrative cache delete failed");
                false
            }
        }
    }

    async fn read_cache(&self, startup_id: &str) -> Option<Narrative> {
        let cache = self.cache.as_ref()?;
        match cache.get(&cache_key(startup_id)).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(narrative) => Some(narrative),
                Err(error) => {
                    warn!(error = %error, startup_id, "cached narrative was unreadable");
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                warn!(error = %error, startup_id, "narrative cache read failed");
                None
            }
        }
    }

    async fn write_cache(&self, startup_id: &str, narrative: &Narrative) {
        let Some(cache) = &self.cache else {
            return;
        };
        let payload = match serde_json::to_string(narrative) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(error = %error, "narrative serialization failed, skipping cache write");
                return;
            }
        };
        if let Err(error) = cache.put(&cache_key(startup_id), &payload, self.ttl).await {
            warn!(error = %error, startup_id, "narrative cache write failed");
        }
    }
}

fn narrative_prompt(facts: &StartupFacts) -> String {
    let startup_data = serde_json::to_string_pretty(facts).unwrap_or_default();
    format!(
        r#"You are an expert narrative writer creating compelling startup stories for investors.

Analyze this startup and create a crisp narrative:

Startup Data:
{startup_data}

Respond ONLY with valid JSON containing exactly these fields:
{{
  "vision": "Where they are heading, the future state (2-3 sentences)",
  "differentiation": "What makes them unique (2-3 sentences)",
  "timing": "Why now is the right time (2-3 sentences)",
  "tagline": "A memorable tagline of at most 12 words"
}}"#
    )
}

fn sector_or_default(facts: &StartupFacts) -> &str {
    facts.sector.as_deref().map(str::trim).filter(|s| !s.is_empty()).unwrap_or("technology")
}

fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

fn fallback_vision(facts: &StartupFacts) -> String {
    let what = facts
        .solution
        .as_deref()
        .or(facts.description.as_deref())
        .unwrap_or("delivering a focused product");
    format!("{} aims to transform {} by {}.", facts.name, sector_or_default(facts), clip(what, 120))
}

fn fallback_differentiation(facts: &StartupFacts) -> String {
    let via = facts
        .technology
        .as_deref()
        .or(facts.solution.as_deref())
        .unwrap_or("a differentiated approach");
    let against = facts.competition.as_deref().unwrap_or("existing solutions");
    format!("Differentiates via {} against {}.", clip(via, 100), clip(against, 80))
}

const TREND_TOKENS: [&str; 6] =
    ["growing", "growth", "expanding", "accelerating", "cagr", "billion"];

fn fallback_timing(facts: &StartupFacts) -> String {
    let market = facts.market.as_deref().unwrap_or("");
    let lower = market.to_lowercase();
    let trend = TREND_TOKENS
        .iter()
        .find(|token| lower.contains(**token))
        .copied()
        .unwrap_or("market momentum");
    format!(
        "{} is growing and {} makes now the right time.",
        sector_or_default(facts),
        trend
    )
}

fn fallback_tagline(facts: &StartupFacts) -> String {
    let source = facts.description.as_deref().unwrap_or(&facts.name);
    let words: Vec<String> =
        source.split_whitespace().take(10).map(title_case_word).collect();
    words.join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
