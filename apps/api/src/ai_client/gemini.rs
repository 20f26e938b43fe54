//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{send_with_retry, AiError, AiProvider, Summarizer, SummaryRequest};

/// Rough tokens-per-word factor used to turn a word budget into
/// `maxOutputTokens`.
const TOKENS_PER_WORD: u32 = 2;

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

impl GeminiClient {
    pub fn new(http: Client, api_key: String, base_url: String, model: String) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl Summarizer for GeminiClient {
    fn provider(&self) -> AiProvider {
        AiProvider::Gemini
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, AiError> {
        let url = self.endpoint(request.model);
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: request.max_length.saturating_mul(TOKENS_PER_WORD),
                temperature: 0.3,
            },
        };

        let response = send_with_retry(|| {
            self.http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed.text().ok_or(AiError::EmptyContent)?;
        debug!(
            "Gemini call succeeded: model={}, output_chars={}",
            request.model,
            text.len()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_response_text_joins_parts() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Steady "}, {"text": "progress."}]}
            }]
        }))
        .unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Steady progress."));
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let parsed: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert!(parsed.text().is_none());
    }

    #[test]
    fn test_request_uses_camel_case() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "hello" }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 560,
                temperature: 0.3,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 560);
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_endpoint_format() {
        let client = GeminiClient::new(
            Client::new(),
            "key".into(),
            "https://generativelanguage.googleapis.com/v1beta/models".into(),
            "gemini-1.5-flash".into(),
        );
        assert_eq!(
            client.endpoint("gemini-1.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
