//! Generative-language backend.
//!
//! The backend is chosen once from configuration. Callers match on the
//! [`Generation`] they get back instead of checking a "configured" flag.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Config, EcosystemError, SecretValue};

/// Narrative used in place of generated text when no credential is present.
pub const UNCONFIGURED_SENTINEL: &str =
    "Gemini API not configured. Please add GOOGLE_API_KEY to .env file.";

/// Text-in/text-out capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Outcome of one backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    Text(String),
    Unconfigured,
    Failed { reason: String },
}

impl Generation {
    /// Text suitable for a stage narrative, including the legacy sentinel and
    /// failure strings.
    pub fn narrative(&self) -> String {
        match self {
            Generation::Text(text) => text.clone(),
            Generation::Unconfigured => UNCONFIGURED_SENTINEL.to_string(),
            Generation::Failed { reason } => format!("API Exception: {reason}"),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, Generation::Text(_))
    }
}

#[derive(Clone)]
pub enum LanguageBackend {
    Active {
        generator: Arc<dyn TextGenerator>,
        timeout: Duration,
    },
    Unconfigured,
}

impl std::fmt::Debug for LanguageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LanguageBackend::Active { timeout, .. } => f
                .debug_struct("Active")
                .field("timeout", timeout)
                .finish_non_exhaustive(),
            LanguageBackend::Unconfigured => f.write_str("Unconfigured"),
        }
    }
}

impl LanguageBackend {
    pub fn new_active(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        LanguageBackend::Active { generator, timeout }
    }

    /// Select the backend variant. A missing credential is not an error.
    pub fn from_config(config: &Config) -> Result<Self, EcosystemError> {
        let backend = &config.backend;
        if backend.provider != "gemini" {
            return Err(EcosystemError::InvalidConfiguration(format!(
                "unsupported backend provider `{}`",
                backend.provider
            )));
        }

        match config.backend_api_key() {
            Some(key) => {
                let client = GeminiClient::new(&backend.base_url, &backend.model, key, backend.timeout())?;
                Ok(Self::new_active(Arc::new(client), backend.timeout()))
            }
            None => {
                warn!(
                    env = %backend.api_key_env,
                    "language backend credential missing; stages will run degraded"
                );
                Ok(LanguageBackend::Unconfigured)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, LanguageBackend::Active { .. })
    }

    /// Never returns an error; failures and timeouts become [`Generation::Failed`].
    pub async fn generate(&self, prompt: &str) -> Generation {
        let LanguageBackend::Active { generator, timeout } = self else {
            return Generation::Unconfigured;
        };

        match tokio::time::timeout(*timeout, generator.generate(prompt)).await {
            Ok(Ok(text)) => {
                debug!(chars = text.len(), "backend response received");
                Generation::Text(text)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "backend call failed");
                Generation::Failed {
                    reason: format!("{err:#}"),
                }
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "backend call timed out");
                Generation::Failed {
                    reason: format!("timed out after {}ms", timeout.as_millis()),
                }
            }
        }
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretValue,
        timeout: Duration,
    ) -> Result<Self, EcosystemError> {
        let mut key = header::HeaderValue::from_str(api_key.expose())
            .map_err(|err| EcosystemError::InvalidConfiguration(err.to_string()))?;
        key.set_sensitive(true);
        let mut headers = header::HeaderMap::new();
        headers.insert("x-goog-api-key", key);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| EcosystemError::Http(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini returned HTTP {}: {}", status.as_u16(), body.trim());
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("failed to parse Gemini response")?;

        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect();

        if text.trim().is_empty() {
            return Err(anyhow!("Gemini response contained no text"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("echo: {prompt}"))
        }
    }

    struct Broken;

    #[async_trait]
    impl TextGenerator for Broken {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("quota exhausted"))
        }
    }

    struct Stalled;

    #[async_trait]
    impl TextGenerator for Stalled {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    #[tokio::test]
    async fn unconfigured_backend_returns_sentinel() {
        let generation = LanguageBackend::Unconfigured.generate("anything").await;
        assert_eq!(generation, Generation::Unconfigured);
        assert_eq!(generation.narrative(), UNCONFIGURED_SENTINEL);
        assert!(generation.is_degraded());
    }

    #[tokio::test]
    async fn active_backend_returns_text() {
        let backend = LanguageBackend::new_active(Arc::new(Echo), Duration::from_secs(1));
        assert_eq!(backend.generate("hi").await, Generation::Text("echo: hi".into()));
    }

    #[tokio::test]
    async fn failure_is_a_distinct_variant() {
        let backend = LanguageBackend::new_active(Arc::new(Broken), Duration::from_secs(1));
        let generation = backend.generate("hi").await;
        assert!(matches!(generation, Generation::Failed { ref reason } if reason.contains("quota")));
        assert_eq!(generation.narrative(), "API Exception: quota exhausted");
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let backend = LanguageBackend::new_active(Arc::new(Stalled), Duration::from_millis(50));
        assert!(matches!(backend.generate("hi").await, Generation::Failed { .. }));
    }

    #[test]
    fn missing_credential_selects_unconfigured() {
        let mut config = Config::default();
        config.backend.api_key_env = "ECOSYSTEM_TEST_KEY_THAT_IS_NEVER_SET".into();
        let backend = LanguageBackend::from_config(&config).expect("backend resolves");
        assert!(!backend.is_configured());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut config = Config::default();
        config.backend.provider = "carrier-pigeon".into();
        assert!(LanguageBackend::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn gemini_client_joins_candidate_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header_eq("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Summarize" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] } }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            format!("{}/models/", server.uri()),
            "gemini-test",
            SecretValue::new("test-key"),
            Duration::from_secs(5),
        )
        .expect("client builds");
        assert_eq!(client.generate("Summarize").await.expect("text"), "Hello world");
    }

    #[tokio::test]
    async fn gemini_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            server.uri(),
            "gemini-test",
            SecretValue::new("test-key"),
            Duration::from_secs(5),
        )
        .expect("client builds");
        let err = client.generate("hi").await.expect_err("429 fails");
        assert!(err.to_string().contains("429"));
    }
}
