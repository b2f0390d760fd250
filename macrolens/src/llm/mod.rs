use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Core trait for hosted model providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Model identifier used for requests
    fn model(&self) -> &str;
}

/// Request structure for LLM generation
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
    /// Ask the provider to ground the answer with its own web search tool
    pub grounded_search: bool,
    /// Constrain the reply to JSON matching this schema (Gemini schema dialect)
    pub response_schema: Option<serde_json::Value>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

pub mod factory;
pub mod gemini;
pub mod openai;

#[cfg(test)]
pub(crate) mod testing;

/// Helper to extract JSON from text that might contain markdown backticks or preamble
pub fn extract_json_from_text(text: &str) -> Option<String> {
    // 1. Try to find content between ```json and ```
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 2. Try to find content between ``` and ```
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 3. Try to find the first '{' and last '}'
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return Some(text[start..=end].to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let text = "Here you go:\n```json\n{\"verified\": true}\n```\nThanks";
        assert_eq!(extract_json_from_text(text).as_deref(), Some("{\"verified\": true}"));
    }

    #[test]
    fn extracts_braced_json_after_preamble() {
        let text = "Sure! {\"macro_analysis\": []} hope this helps";
        assert_eq!(
            extract_json_from_text(text).as_deref(),
            Some("{\"macro_analysis\": []}")
        );
    }

    #[test]
    fn no_json_found() {
        assert!(extract_json_from_text("nothing structured here").is_none());
        assert!(extract_json_from_text("} backwards {").is_none());
    }
}
