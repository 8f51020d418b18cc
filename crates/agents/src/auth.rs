//! Access tokens for the project-scoped provider endpoint.
//!
//! Tokens come from the `gcloud` CLI pointed at the configured service
//! account credentials. One client is shared across all evaluation tasks;
//! the async mutex makes a refresh single-flight, so concurrent callers wait
//! on the same subprocess instead of racing their own.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use dealscope_core::config::LlmConfig;

/// Refresh ahead of Google's one-hour token lifetime.
const TOKEN_LIFETIME: Duration = Duration::from_secs(45 * 60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not materialize inline credentials: {0}")]
    Materialize(std::io::Error),
    #[error("could not run gcloud: {0}")]
    Spawn(std::io::Error),
    #[error("gcloud exited with an error: {0}")]
    TokenFetch(String),
    #[error("gcloud produced an empty token")]
    EmptyToken,
}

pub struct AccessTokenClient {
    credentials_path: Option<PathBuf>,
    // Keeps a LLM_CREDENTIALS_JSON payload alive on disk for gcloud.
    _materialized: Option<tempfile::NamedTempFile>,
    cached: tokio::sync::Mutex<Option<CachedToken>>,
}

struct CachedToken {
    token: String,
    fetched_at: Instant,
}

impl AccessTokenClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, AuthError> {
        let (credentials_path, materialized) = match (&config.credentials_path, &config.credentials_json)
        {
            (Some(path), _) => (Some(path.clone()), None),
            (None, Some(json)) => {
                let mut file = tempfile::NamedTempFile::new().map_err(AuthError::Materialize)?;
                file.write_all(json.expose_secret().as_bytes())
                    .map_err(AuthError::Materialize)?;
                (Some(file.path().to_path_buf()), Some(file))
            }
            (None, None) => (None, None),
        };

        Ok(Self {
            credentials_path,
            _materialized: materialized,
            cached: tokio::sync::Mutex::new(None),
        })
    }

    /// Current access token, fetching or refreshing if the cached one is
    /// missing or past its lifetime.
    pub async fn token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < TOKEN_LIFETIME {
                return Ok(entry.token.clone());
            }
        }

        let token = self.fetch().await?;
        *cached = Some(CachedToken { token: token.clone(), fetched_at: Instant::now() });
        Ok(token)
    }

    /// Drop the cached token; the next [`token`](Self::token) call fetches a
    /// fresh one. Called after a 401 from the provider.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        *cached = None;
    }

    async fn fetch(&self) -> Result<String, AuthError> {
        let mut command = Command::new("gcloud");
        command
            .args(["auth", "print-access-token"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(path) = &self.credentials_path {
            command.env("GOOGLE_APPLICATION_CREDENTIALS", path);
        }

        let output = command.output().await.map_err(AuthError::Spawn)?;
        if !output.status.success() {
            return Err(AuthError::TokenFetch(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }

        debug!("fetched fresh provider access token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use dealscope_core::config::LlmConfig;

    use super::AccessTokenClient;

    fn config_without_credentials() -> LlmConfig {
        LlmConfig {
            project_id: Some("deal-scope-test".to_string()),
            location: Some("us-central1".to_string()),
            credentials_json: None,
            credentials_path: None,
            api_key: None,
            timeout_secs: 60,
        }
    }

    #[tokio::test]
    async fn inline_credentials_are_materialized_to_disk() {
        let mut config = config_without_credentials();
        config.credentials_json = Some("{\"type\":\"service_account\"}".to_string().into());

        let client = AccessTokenClient::from_config(&config).expect("client");
        let path = client.credentials_path.as_ref().expect("materialized path");
        let contents = std::fs::read_to_string(path).expect("read materialized file");
        assert!(contents.contains("service_account"));
    }

    #[tokio::test]
    async fn invalidate_clears_the_cached_token() {
        let client =
            AccessTokenClient::from_config(&config_without_credentials()).expect("client");

        {
            let mut cached = client.cached.lock().await;
            *cached = Some(super::CachedToken {
                token: "stale".to_string(),
                fetched_at: std::time::Instant::now(),
            });
        }

        client.invalidate().await;
        assert!(client.cached.lock().await.is_none());
    }
}
