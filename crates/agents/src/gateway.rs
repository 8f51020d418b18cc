//! Uniform entry point for model completions.
//!
//! The gateway never raises for provider trouble: network failures, auth
//! failures after one refresh, non-success statuses, and empty completions
//! all come back as [`InvocationResult::Fallback`], which agents treat
//! exactly like unparseable output - take the rule-based path. Only invalid
//! arguments panic.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::warn;

use dealscope_core::config::{LlmConfig, ProviderSelection};

use crate::auth::{AccessTokenClient, AuthError};

#[derive(Clone, Debug)]
pub struct GenerationOptions {
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl GenerationOptions {
    /// Panics when the parameters are outside the provider's accepted
    /// ranges; bad generation parameters are programmer errors, not runtime
    /// conditions.
    pub fn new(temperature: f64, max_tokens: u32) -> Self {
        assert!((0.0..=2.0).contains(&temperature), "temperature must be within 0.0..=2.0");
        assert!(max_tokens > 0, "max_tokens must be positive");
        Self { system_prompt: None, temperature, max_tokens }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationResult {
    Ok { text: String },
    Fallback { reason: String },
}

impl InvocationResult {
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self::Fallback { reason: reason.into() }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Ok { text } => Some(text),
            Self::Fallback { .. } => None,
        }
    }
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> InvocationResult;
}

/// Production gateway speaking the provider's `generateContent` protocol.
///
/// Provider selection happens once at construction: the project-scoped
/// endpoint when project credentials are configured, the API-key endpoint
/// otherwise, and a permanent "no credentials" fallback when neither is.
pub struct HttpLlmGateway {
    provider: ProviderSelection,
    api_key: Option<SecretString>,
    auth: Option<AccessTokenClient>,
    http: reqwest::Client,
}

impl HttpLlmGateway {
    pub fn from_config(config: &LlmConfig) -> Result<Self, AuthError> {
        let provider = config.provider();
        let auth = match provider {
            ProviderSelection::ProjectScoped { .. } => {
                Some(AccessTokenClient::from_config(config)?)
            }
            _ => None,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Ok(Self { provider, api_key: config.api_key.clone(), auth, http })
    }

    fn endpoint(&self, model: &str) -> Option<String> {
        match &self.provider {
            ProviderSelection::ProjectScoped { project_id, location } => Some(format!(
                "https://{location}-aiplatform.googleapis.com/v1/projects/{project_id}\
                 /locations/{location}/publishers/google/models/{model}:generateContent"
            )),
            ProviderSelection::ApiKey => {
                let key = self.api_key.as_ref()?;
                Some(format!(
                    "https://generativelanguage.googleapis.com/v1/models/{model}\
                     :generateContent?key={}",
                    key.expose_secret()
                ))
            }
            ProviderSelection::None => None,
        }
    }
}

#[async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> InvocationResult {
        assert!(!model.trim().is_empty(), "model must not be empty");
        assert!(!prompt.trim().is_empty(), "prompt must not be empty");

        let Some(endpoint) = self.endpoint(model) else {
            return InvocationResult::fallback("no credentials");
        };

        let full_prompt = match &options.system_prompt {
            Some(system_prompt) => format!("{system_prompt}\n\n{prompt}"),
            None => prompt.to_string(),
        };

        let payload = json!({
            "contents": [{ "parts": [{ "text": full_prompt }] }],
            "generationConfig": {
                "temperature": options.temperature,
                "maxOutputTokens": options.max_tokens,
                "topK": 40,
                "topP": 0.95,
            }
        });

        let mut network_retried = false;
        let mut auth_refreshed = false;

        loop {
            let mut request = self.http.post(&endpoint).json(&payload);
            if let Some(auth) = &self.auth {
                match auth.token().await {
                    Ok(token) => request = request.bearer_auth(token),
                    Err(error) => {
                        return InvocationResult::fallback(format!("auth failure: {error}"))
                    }
                }
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(error) if is_transient(&error) && !network_retried => {
                    warn!(model, error = %error, "transient network failure, retrying once");
                    network_retried = true;
                    continue;
                }
                Err(error) => {
                    return InvocationResult::fallback(format!("network failure: {error}"))
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED && !auth_refreshed {
                if let Some(auth) = &self.auth {
                    warn!(model, "provider returned 401, refreshing access token");
                    auth.invalidate().await;
                    auth_refreshed = true;
                    continue;
                }
            }
            if !status.is_success() {
                return InvocationResult::fallback(format!("provider returned {status}"));
            }

            let body: Value = match response.json().await {
                Ok(body) => body,
                Err(error) => {
                    return InvocationResult::fallback(format!("unreadable response body: {error}"))
                }
            };

            let text = collect_candidate_text(&body);
            if text.trim().is_empty() {
                return InvocationResult::fallback("empty response");
            }
            return InvocationResult::Ok { text };
        }
    }
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Concatenate the text of every part in the first candidate.
fn collect_candidate_text(body: &Value) -> String {
    body.get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text"))
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

/// Gateway double that always falls back, for exercising rule-based paths.
#[derive(Default)]
pub struct OfflineGateway;

#[async_trait]
impl LlmGateway for OfflineGateway {
    async fn invoke(&self, _: &str, _: &str, _: &GenerationOptions) -> InvocationResult {
        InvocationResult::fallback("llm unavailable")
    }
}

/// Gateway double returning canned text, routed by a marker substring of the
/// prompt so concurrent agents each hit their own script deterministically.
#[derive(Default)]
pub struct ScriptedGateway {
    scripts: Vec<(String, String)>,
    invocations: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `response` whenever `marker` appears in the prompt.
    pub fn respond(mut self, marker: impl Into<String>, response: impl Into<String>) -> Self {
        self.scripts.push((marker.into(), response.into()));
        self
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().expect("scripted gateway lock poisoned").len()
    }

    pub fn invoked_markers(&self) -> Vec<String> {
        self.invocations.lock().expect("scripted gateway lock poisoned").clone()
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn invoke(&self, _: &str, prompt: &str, _: &GenerationOptions) -> InvocationResult {
        for (marker, response) in &self.scripts {
            if prompt.contains(marker.as_str()) {
                self.invocations
                    .lock()
                    .expect("scripted gateway lock poisoned")
                    .push(marker.clone());
                return InvocationResult::Ok { text: response.clone() };
            }
        }

        self.invocations
            .lock()
            .expect("scripted gateway lock poisoned")
            .push("<unmatched>".to_string());
        InvocationResult::fallback("no scripted response for prompt")
    }
}
