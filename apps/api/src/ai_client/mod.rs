/// AI client: the single point of entry for hosted model calls.
///
/// No other module talks to Hugging Face or Gemini directly. Callers hold an
/// `Arc<dyn Summarizer>` and never see provider wire formats.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::errors::AppError;

pub mod gemini;
pub mod huggingface;

pub use gemini::GeminiClient;
pub use huggingface::HuggingFaceClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider returned empty content")]
    EmptyContent,
}

impl AiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AiError::Api { status: 429, .. })
    }

    /// Transport failures, 429 and 5xx are worth another attempt.
    fn is_retryable(&self) -> bool {
        match self {
            AiError::Http(_) => true,
            AiError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

const MAX_MODEL_NAME_LEN: usize = 128;

/// Model ids are spliced into provider URLs, so only plain `name` or
/// `org/name` ids are accepted.
pub fn is_valid_model_name(model: &str) -> bool {
    !model.is_empty()
        && model.len() <= MAX_MODEL_NAME_LEN
        && model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
        && model.matches('/').count() <= 1
        && model.split('/').all(|part| !part.is_empty() && part != "." && part != "..")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    HuggingFace,
    Gemini,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::HuggingFace => "huggingface",
            AiProvider::Gemini => "gemini",
        }
    }
}

/// One text-generation call. `model` overrides the provider default.
#[derive(Debug, Clone)]
pub struct SummaryRequest<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    pub max_length: u32,
    pub min_length: u32,
}

/// A hosted summarization/generation backend.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn provider(&self) -> AiProvider;

    fn default_model(&self) -> &str;

    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, AiError>;
}

/// The providers configured at startup. A provider is absent when its
/// token is not set.
#[derive(Clone, Default)]
pub struct AiProviders {
    pub huggingface: Option<Arc<dyn Summarizer>>,
    pub gemini: Option<Arc<dyn Summarizer>>,
}

impl AiProviders {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = build_http_client()?;
        let huggingface = config.huggingface.api_key.clone().map(|token| {
            Arc::new(HuggingFaceClient::new(
                http.clone(),
                token,
                config.huggingface.api_url.clone(),
                config.huggingface.model.clone(),
            )) as Arc<dyn Summarizer>
        });
        let gemini = config.gemini.api_key.clone().map(|key| {
            Arc::new(GeminiClient::new(
                http.clone(),
                key,
                config.gemini.api_url.clone(),
                config.gemini.model.clone(),
            )) as Arc<dyn Summarizer>
        });
        Ok(Self {
            huggingface,
            gemini,
        })
    }

    /// Returns the requested provider, or 503 when it is not configured.
    /// Never touches the network.
    pub fn select(&self, provider: AiProvider) -> Result<Arc<dyn Summarizer>, AppError> {
        let slot = match provider {
            AiProvider::HuggingFace => &self.huggingface,
            AiProvider::Gemini => &self.gemini,
        };
        slot.clone().ok_or_else(|| {
            let var = match provider {
                AiProvider::HuggingFace => "HUGGINGFACE_API_TOKEN",
                AiProvider::Gemini => "GEMINI_API_KEY",
            };
            AppError::ServiceUnavailable(format!(
                "AI provider '{}' is not configured ({var} is not set)",
                provider.as_str()
            ))
        })
    }
}

fn build_http_client() -> anyhow::Result<Client> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Sends a request, retrying on transport errors, 429 and 5xx. Any other
/// error status returns immediately with the body as the message.
pub(crate) async fn send_with_retry<F>(build: F) -> Result<Response, AiError>
where
    F: Fn() -> RequestBuilder,
{
    let build = &build;
    with_retry(move || async move {
        let response = build().send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!("AI provider returned {}: {}", status, body);
        Err(AiError::Api {
            status: status.as_u16(),
            message: body,
        })
    })
    .await
}

/// Runs `call` up to `MAX_ATTEMPTS` times with exponential backoff (1s, 2s).
/// The error of the final attempt is returned as-is.
async fn with_retry<T, F, Fut>(mut call: F) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                let delay = Duration::from_millis(1000 << (attempt - 1));
                warn!(
                    "AI call attempt {} failed ({}), retrying after {}ms...",
                    attempt,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_missing_provider_is_service_unavailable() {
        let providers = AiProviders::default();
        let err = providers.select(AiProvider::HuggingFace).err().unwrap();
        assert!(matches!(err, AppError::ServiceUnavailable(ref m) if m.contains("HUGGINGFACE_API_TOKEN")));

        let err = providers.select(AiProvider::Gemini).err().unwrap();
        assert!(matches!(err, AppError::ServiceUnavailable(ref m) if m.contains("GEMINI_API_KEY")));
    }

    #[test]
    fn test_select_returns_configured_provider() {
        let providers = AiProviders {
            huggingface: Some(Arc::new(testing::ScriptedSummarizer::ok())),
            gemini: None,
        };
        let selected = providers.select(AiProvider::HuggingFace).unwrap();
        assert_eq!(selected.default_model(), "scripted");
        assert!(providers.select(AiProvider::Gemini).is_err());
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(AiError::Api {
            status: 429,
            message: String::new()
        }
        .is_rate_limited());
        assert!(!AiError::Api {
            status: 503,
            message: String::new()
        }
        .is_rate_limited());
        assert!(!AiError::EmptyContent.is_rate_limited());
    }

    fn api_error(status: u16) -> AiError {
        AiError::Api {
            status,
            message: format!("status {status}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_server_errors() {
        let mut calls = 0;
        let result = with_retry(|| {
            calls += 1;
            let outcome = if calls < MAX_ATTEMPTS { Err(api_error(503)) } else { Ok(calls) };
            async move { outcome }
        })
        .await;
        assert_eq!(result.unwrap(), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_provider_error() {
        let mut calls = 0;
        let started = tokio::time::Instant::now();
        let result: Result<(), AiError> = with_retry(|| {
            calls += 1;
            async { Err(api_error(429)) }
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.is_rate_limited());
        assert!(matches!(err, AiError::Api { status: 429, .. }));
        assert_eq!(calls, MAX_ATTEMPTS);
        // 1s + 2s of backoff
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4), "{waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), AiError> = with_retry(|| {
            calls += 1;
            async { Err(api_error(400)) }
        })
        .await;
        assert!(matches!(result, Err(AiError::Api { status: 400, .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_model_names_accepted() {
        for model in ["facebook/bart-large-cnn", "gemini-1.5-flash", "google/flan_t5.v2"] {
            assert!(is_valid_model_name(model), "{model}");
        }
    }

    #[test]
    fn test_model_names_that_reshape_the_url_rejected() {
        for model in [
            "",
            "../admin",
            "org/..",
            "/absolute",
            "org/",
            "a/b/c",
            "org//name",
            "model?key=x",
            "model#frag",
            "model%2F..",
            "gemini:streamGenerateContent",
            "with space",
        ] {
            assert!(!is_valid_model_name(model), "{model}");
        }
        assert!(!is_valid_model_name(&"m".repeat(MAX_MODEL_NAME_LEN + 1)));
    }

    #[test]
    fn test_provider_deserializes_lowercase() {
        let p: AiProvider = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(p, AiProvider::Gemini);
        let p: AiProvider = serde_json::from_str("\"huggingface\"").unwrap();
        assert_eq!(p, AiProvider::HuggingFace);
    }

    #[test]
    fn test_from_config_without_keys_has_no_providers() {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://x".to_string()),
            "SECRET_KEY" => Some("k".to_string()),
            _ => None,
        })
        .unwrap();
        let providers = AiProviders::from_config(&config).unwrap();
        assert!(providers.huggingface.is_none());
        assert!(providers.gemini.is_none());
    }
}
