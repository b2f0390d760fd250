use std::sync::Arc;

use common::{PipelineConfig, Step};
use tracing::info;

use super::AgentSettings;
use crate::error::PipelineError;
use crate::llm::{LlmProvider, LlmRequest};

/// Finds and ranks the most important recent news for the configured focus.
pub struct ScoutAgent {
    provider: Arc<dyn LlmProvider>,
    settings: AgentSettings,
    focus: String,
    news_count: usize,
    search: bool,
}

impl ScoutAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, pipeline: &PipelineConfig) -> Self {
        Self {
            provider,
            settings: AgentSettings::default(),
            focus: pipeline.focus.clone(),
            news_count: pipeline.news_count.max(1),
            search: pipeline.search,
        }
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn prompt(&self) -> String {
        format!(
            r#"You are a financial news scout working for a macroeconomic research desk.

TASK:
Search the web for the most important news published in the last 24 hours about {focus}.
Select the {count} stories with the largest potential effect on the macroeconomy and on financial markets
(central bank decisions, inflation and employment data, fiscal policy, trade, energy, geopolitics, major corporate events).

OUTPUT FORMAT (plain text, no JSON, no markdown tables):
Rank the stories from most to least important. For each one write a numbered entry:
<rank>. <headline>
   Source: <publication>, <date>
   Summary: <two or three factual sentences>

Only report facts found in your sources. Do not add commentary or analysis."#,
            focus = self.focus,
            count = self.news_count,
        )
    }

    /// Run the scout; whitespace-only output is a `NoContent` failure.
    pub async fn run(&self) -> Result<String, PipelineError> {
        let mut request = LlmRequest::new(self.prompt());
        request.grounded_search = self.search;
        request.temperature = Some(0.3);
        let request = self.settings.apply(request);

        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|e| PipelineError::provider(Step::Scout, e))?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(PipelineError::NoContent);
        }

        info!(
            model = %response.model,
            chars = text.len(),
            tokens = response.usage.total_tokens,
            "scout: news gathered"
        );
        Ok(text.to_string())
    }
}
