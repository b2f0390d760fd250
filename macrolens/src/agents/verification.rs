use std::sync::Arc;

use common::Step;
use serde::Deserialize;
use tracing::{info, warn};

use super::AgentSettings;
use crate::analysis::verdict_schema;
use crate::error::PipelineError;
use crate::llm::{extract_json_from_text, LlmProvider, LlmRequest};

/// Structured fact-check answer
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    pub verified: bool,
    #[serde(default)]
    pub reason: String,
}

/// Fact-checks the scout's digest and passes it through unchanged when it holds up.
pub struct VerificationAgent {
    provider: Arc<dyn LlmProvider>,
    settings: AgentSettings,
}

impl VerificationAgent {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            settings: AgentSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    fn prompt(news: &str) -> String {
        format!(
            r#"You are a fact-checking editor at a financial newsroom.

Review the news digest below. Check that every item is plausible, internally consistent,
recent, and attributed to a named source. Do not rewrite the digest.

OUTPUT FORMAT (strict JSON):
{{
  "verified": true or false,
  "reason": "one sentence explaining the verdict"
}}

Answer "verified": false only if an item is fabricated, contradictory, or clearly outdated.

NEWS DIGEST:
{}
"#,
            news
        )
    }

    /// Returns `news` untouched when the verdict is positive.
    pub async fn run(&self, news: &str) -> Result<String, PipelineError> {
        let mut request = LlmRequest::new(Self::prompt(news));
        request.response_schema = Some(verdict_schema());
        request.temperature = Some(0.0);
        let request = self.settings.apply(request);

        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|e| PipelineError::provider(Step::Verification, e))?;

        let verdict = parse_verdict(&response.content)?;
        if verdict.verified {
            info!(reason = %verdict.reason, "verification: digest accepted");
            Ok(news.to_string())
        } else {
            warn!(reason = %verdict.reason, "verification: digest rejected");
            let reason = if verdict.reason.trim().is_empty() {
                "no reason given".to_string()
            } else {
                verdict.reason
            };
            Err(PipelineError::VerificationRejected { reason })
        }
    }
}

fn parse_verdict(content: &str) -> Result<Verdict, PipelineError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(PipelineError::EmptyResponse {
            step: Step::Verification,
        });
    }

    let json = match serde_json::from_str::<Verdict>(content) {
        Ok(verdict) => return Ok(verdict),
        Err(e) => extract_json_from_text(content).ok_or_else(|| PipelineError::MalformedJson {
            step: Step::Verification,
            detail: e.to_string(),
        })?,
    };

    serde_json::from_str(&json).map_err(|e| PipelineError::MalformedJson {
        step: Step::Verification,
        detail: e.to_string(),
    })
}
