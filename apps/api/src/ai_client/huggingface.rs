//! Hugging Face Inference API client (summarization / text2text models).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{send_with_retry, AiError, AiProvider, Summarizer, SummaryRequest};

#[derive(Clone)]
pub struct HuggingFaceClient {
    http: Client,
    token: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_length: u32,
    min_length: u32,
    do_sample: bool,
    truncation: &'static str,
}

#[derive(Debug, Deserialize)]
struct InferenceOutput {
    summary_text: Option<String>,
    generated_text: Option<String>,
}

impl HuggingFaceClient {
    pub fn new(http: Client, token: String, base_url: String, model: String) -> Self {
        Self {
            http,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}", self.base_url, model)
    }
}

#[async_trait]
impl Summarizer for HuggingFaceClient {
    fn provider(&self) -> AiProvider {
        AiProvider::HuggingFace
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, AiError> {
        let url = self.endpoint(request.model);
        let body = InferenceRequest {
            inputs: request.prompt,
            parameters: InferenceParameters {
                max_length: request.max_length,
                min_length: request.min_length,
                do_sample: false,
                truncation: "only_first",
            },
        };

        let response = send_with_retry(|| {
            self.http
                .post(&url)
                .bearer_auth(&self.token)
                .json(&body)
        })
        .await?;

        let payload: Value = response.json().await?;
        let text = parse_inference_output(payload)?;
        debug!(
            "Hugging Face call succeeded: model={}, output_chars={}",
            request.model,
            text.len()
        );
        Ok(text)
    }
}

/// Extracts the text from the shapes the Inference API returns:
/// `[{"summary_text": ..}]`, `[{"generated_text": ..}]`, a bare object of
/// either, or `{"error": ..}`.
fn parse_inference_output(payload: Value) -> Result<String, AiError> {
    if let Some(message) = payload.get("error").and_then(|e| e.as_str()) {
        return Err(AiError::Api {
            status: 200,
            message: message.to_string(),
        });
    }

    let first = match payload {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        Value::Array(_) => return Err(AiError::EmptyContent),
        other => other,
    };

    let output: InferenceOutput = serde_json::from_value(first)?;
    output
        .summary_text
        .or(output.generated_text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(AiError::EmptyContent)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_summary_array() {
        let text = parse_inference_output(json!([{"summary_text": " Good progress. "}])).unwrap();
        assert_eq!(text, "Good progress.");
    }

    #[test]
    fn test_parse_generated_text_object() {
        let text = parse_inference_output(json!({"generated_text": "Recommendations"})).unwrap();
        assert_eq!(text, "Recommendations");
    }

    #[test]
    fn test_parse_error_payload() {
        let err = parse_inference_output(json!({"error": "Model is loading"})).unwrap_err();
        assert!(matches!(err, AiError::Api { ref message, .. } if message == "Model is loading"));
    }

    #[test]
    fn test_parse_empty_array_is_empty_content() {
        assert!(matches!(
            parse_inference_output(json!([])),
            Err(AiError::EmptyContent)
        ));
        assert!(matches!(
            parse_inference_output(json!([{"summary_text": "  "}])),
            Err(AiError::EmptyContent)
        ));
    }

    #[test]
    fn test_endpoint_joins_model() {
        let client = HuggingFaceClient::new(
            Client::new(),
            "hf_x".into(),
            "https://router.huggingface.co/hf-inference/models/".into(),
            "facebook/bart-large-cnn".into(),
        );
        assert_eq!(
            client.endpoint("facebook/bart-large-cnn"),
            "https://router.huggingface.co/hf-inference/models/facebook/bart-large-cnn"
        );
    }
}
