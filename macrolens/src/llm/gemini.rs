use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Hosted provider speaking the Gemini `generateContent` REST API
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            default_timeout: Duration::from_secs(120),
            default_max_tokens: 8192,
            default_temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(
        mut self,
        timeout_secs: u64,
        max_tokens: usize,
        temperature: f32,
    ) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let tools = if request.grounded_search {
            Some(vec![Tool {
                google_search: serde_json::json!({}),
            }])
        } else {
            None
        };

        let response_mime_type = request
            .response_schema
            .as_ref()
            .map(|_| "application/json".to_string());

        let req_body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt),
                }],
            }],
            tools,
            generation_config: GenerationConfig {
                max_output_tokens: Some(request.max_tokens.unwrap_or(self.default_max_tokens)),
                temperature: Some(request.temperature.unwrap_or(self.default_temperature)),
                response_mime_type,
                response_schema: request.response_schema,
            },
        };

        let endpoint = self.endpoint();
        tracing::debug!(model = %self.model, %endpoint, "sending generateContent request");

        // The deadline covers the whole exchange, body included.
        let exchange = async {
            let response = self
                .client
                .post(&endpoint)
                .header("x-goog-api-key", &self.api_key)
                .header("Content-Type", "application/json")
                .json(&req_body)
                .send()
                .await
                .context("LLM HTTP request failed")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("LLM API error {}: {}", status, body);
            }

            let body: GenerateContentResponse = response
                .json()
                .await
                .context("Failed to parse LLM response")?;
            Ok::<_, anyhow::Error>(body)
        };

        let resp_body = tokio::time::timeout(timeout, exchange)
            .await
            .context("LLM request timed out")??;

        let candidate = match resp_body.candidates.first() {
            Some(c) => c,
            None => {
                if let Some(reason) = resp_body
                    .prompt_feedback
                    .as_ref()
                    .and_then(|f| f.block_reason.as_deref())
                {
                    anyhow::bail!("LLM request was blocked: {}", reason);
                }
                anyhow::bail!("LLM response has no candidates");
            }
        };

        let content: String = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = resp_body
            .usage_metadata
            .map(|u| UsageMetadata {
                prompt_tokens: u.prompt_token_count.unwrap_or(0),
                completion_tokens: u.candidates_token_count.unwrap_or(0),
                total_tokens: u.total_token_count.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage,
            model: resp_body.model_version.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// generateContent request/response structures
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<Usage>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Usage {
    #[serde(default)]
    prompt_token_count: Option<usize>,
    #[serde(default)]
    candidates_token_count: Option<usize>,
    #[serde(default)]
    total_token_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_model_path() {
        let provider = GeminiProvider::new("https://example.test/v1beta/", "key", "gemini-2.5-flash");
        assert_eq!(
            provider.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn request_body_carries_search_tool_and_schema() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part { text: Some("hi".into()) }],
            }],
            tools: Some(vec![Tool {
                google_search: serde_json::json!({}),
            }]),
            generation_config: GenerationConfig {
                max_output_tokens: Some(10),
                temperature: None,
                response_mime_type: Some("application/json".into()),
                response_schema: Some(serde_json::json!({"type": "OBJECT"})),
            },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["tools"][0]["google_search"], serde_json::json!({}));
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 10);
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert!(value["generationConfig"].get("temperature").is_none());
    }
}
