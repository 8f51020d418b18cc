use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Immutable runtime configuration, loaded once at process start and
/// injected into the gateway, stores, and server. Precedence: defaults,
/// then `dealscope.toml`, then environment, then programmatic overrides.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub critique_log: CritiqueLogConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub credentials_json: Option<SecretString>,
    pub credentials_path: Option<PathBuf>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

/// Which provider endpoint the gateway will talk to, resolved once from the
/// credential material present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderSelection {
    /// Authenticated project-scoped endpoint (preferred).
    ProjectScoped { project_id: String, location: String },
    /// Plain API-key endpoint.
    ApiKey,
    /// No credentials; every invocation falls back to the rule-based path.
    None,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// SQLite URL for the narrative cache; absence disables caching silently.
    pub url: Option<String>,
    pub ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CritiqueLogConfig {
    /// SQLite URL for the critique log; absence disables logging silently.
    pub url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub rate_limit: Option<RateLimitConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub cache_url: Option<String>,
    pub critique_log_url: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                project_id: None,
                location: None,
                credentials_json: None,
                credentials_path: None,
                api_key: None,
                timeout_secs: 60,
            },
            cache: CacheConfig { url: None, ttl_secs: 86_400 },
            critique_log: CritiqueLogConfig { url: None },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                rate_limit: None,
            },
            logging: LoggingConfig { level: "info".to_string() },
        }
    }
}

impl LlmConfig {
    pub fn provider(&self) -> ProviderSelection {
        match (&self.project_id, &self.location) {
            (Some(project_id), Some(location)) => ProviderSelection::ProjectScoped {
                project_id: project_id.clone(),
                location: location.clone(),
            },
            _ if self.api_key.is_some() => ProviderSelection::ApiKey,
            _ => ProviderSelection::None,
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = resolve_config_path(options.config_path.as_deref()) {
            config.apply_patch(read_patch(&path)?);
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(project_id) = llm.project_id {
                self.llm.project_id = Some(project_id);
            }
            if let Some(location) = llm.location {
                self.llm.location = Some(location);
            }
            if let Some(credentials_path) = llm.credentials_path {
                self.llm.credentials_path = Some(PathBuf::from(credentials_path));
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(api_key_value.into());
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(url) = cache.url {
                self.cache.url = Some(url);
            }
            if let Some(ttl_secs) = cache.ttl_secs {
                self.cache.ttl_secs = ttl_secs;
            }
        }

        if let Some(critique_log) = patch.critique_log {
            if let Some(url) = critique_log.url {
                self.critique_log.url = Some(url);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LLM_PROJECT_ID") {
            self.llm.project_id = Some(value);
        }
        if let Some(value) = read_env("LLM_LOCATION") {
            self.llm.location = Some(value);
        }
        if let Some(value) = read_env("LLM_CREDENTIALS_JSON") {
            self.llm.credentials_json = Some(value.into());
        }
        if let Some(value) = read_env("LLM_CREDENTIALS_PATH") {
            self.llm.credentials_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CACHE_URL") {
            self.cache.url = Some(value);
        }
        if let Some(value) = read_env("CRITIQUE_LOG_URL") {
            self.critique_log.url = Some(value);
        }

        let window_ms = read_env("RATE_LIMIT_WINDOW_MS")
            .map(|value| parse_u64("RATE_LIMIT_WINDOW_MS", &value))
            .transpose()?;
        let max_requests = read_env("RATE_LIMIT_MAX_REQUESTS")
            .map(|value| parse_u32("RATE_LIMIT_MAX_REQUESTS", &value))
            .transpose()?;
        if let (Some(window_ms), Some(max_requests)) = (window_ms, max_requests) {
            self.server.rate_limit = Some(RateLimitConfig { window_ms, max_requests });
        }

        if let Some(value) = read_env("BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }
        if let Some(value) = read_env("LOG_LEVEL") {
            self.logging.level = value;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_key) = overrides.api_key {
            self.llm.api_key = Some(api_key.into());
        }
        if let Some(cache_url) = overrides.cache_url {
            self.cache.url = Some(cache_url);
        }
        if let Some(critique_log_url) = overrides.critique_log_url {
            self.critique_log.url = Some(critique_log_url);
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.timeout_secs == 0 || self.llm.timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "llm.timeout_secs must be in range 1..=300".to_string(),
            ));
        }

        if self.llm.project_id.is_some() != self.llm.location.is_some() {
            return Err(ConfigError::Validation(
                "LLM_PROJECT_ID and LLM_LOCATION must be set together".to_string(),
            ));
        }

        if matches!(self.llm.provider(), ProviderSelection::ProjectScoped { .. })
            && self.llm.credentials_json.is_none()
            && self.llm.credentials_path.is_none()
        {
            return Err(ConfigError::Validation(
                "project-scoped endpoint requires LLM_CREDENTIALS_JSON or LLM_CREDENTIALS_PATH"
                    .to_string(),
            ));
        }

        if let Some(api_key) = &self.llm.api_key {
            if api_key.expose_secret().trim().is_empty() {
                return Err(ConfigError::Validation("LLM_API_KEY must not be blank".to_string()));
            }
        }

        for (name, url) in
            [("CACHE_URL", &self.cache.url), ("CRITIQUE_LOG_URL", &self.critique_log.url)]
        {
            if let Some(url) = url {
                let sqlite = url.starts_with("sqlite://")
                    || url.starts_with("sqlite::")
                    || url == ":memory:";
                if !sqlite {
                    return Err(ConfigError::Validation(format!(
                        "{name} must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                    )));
                }
            }
        }

        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.ttl_secs must be greater than zero".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
        }

        if let Some(rate_limit) = &self.server.rate_limit {
            if rate_limit.window_ms == 0 || rate_limit.max_requests == 0 {
                return Err(ConfigError::Validation(
                    "rate limit window and max requests must both be greater than zero".to_string(),
                ));
            }
        }

        let level = self.logging.level.trim().to_ascii_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::Validation(
                "logging.level must be one of trace|debug|info|warn|error".to_string(),
            )),
        }
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("dealscope.toml"), PathBuf::from("config/dealscope.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    cache: Option<CachePatch>,
    critique_log: Option<CritiqueLogPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    project_id: Option<String>,
    location: Option<String>,
    credentials_path: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    url: Option<String>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CritiqueLogPatch {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
}
