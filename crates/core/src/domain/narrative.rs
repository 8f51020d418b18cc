use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TAGLINE_MAX_WORDS: usize = 12;

/// The three-part investor narrative plus a tagline of at most
/// [`TAGLINE_MAX_WORDS`] words.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub vision: String,
    pub differentiation: String,
    pub timing: String,
    pub tagline: String,
    pub generated_at: DateTime<Utc>,
    pub degraded: bool,
}

/// Trim a tagline to the word budget, preserving the leading words.
pub fn clip_tagline(raw: &str) -> String {
    let words: Vec<&str> = raw.split_whitespace().collect();
    if words.len() <= TAGLINE_MAX_WORDS {
        words.join(" ")
    } else {
        words[..TAGLINE_MAX_WORDS].join(" ")
    }
}

/// Cache key for a narrative, namespaced the way the cache store expects.
pub fn cache_key(startup_id: &str) -> String {
    format!("narrative:{startup_id}")
}
