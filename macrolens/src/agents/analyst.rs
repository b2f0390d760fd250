use std::sync::Arc;

use common::Step;
use tracing::info;

use super::AgentSettings;
use crate::analysis::{response_schema, MacroAnalysisResult};
use crate::error::PipelineError;
use crate::llm::{LlmProvider, LlmRequest};

/// Turns a news digest into schema-conforming macroeconomic analysis.
pub struct AnalysisAgent {
    provider: Arc<dyn LlmProvider>,
    settings: AgentSettings,
}

impl AnalysisAgent {
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
            r#"You are a senior macroeconomic analyst.

For EACH news item below produce one entry with:
- "news_summary": one or two sentences restating the news
- "identified_macro_factors": the macroeconomic factors involved (e.g. interest rates, inflation, employment, GDP growth, currency, commodities, fiscal policy)
- "impact_analysis": the likely impact on the economy and on financial markets, with the transmission channel
- "importance_score": an integer from 1 (minor) to 10 (market moving)

Keep the order of the news items. Respond with JSON only, matching:
{{ "macro_analysis": [ {{ "news_summary": "...", "identified_macro_factors": ["..."], "impact_analysis": "...", "importance_score": 7 }} ] }}

NEWS ITEMS:
{}
"#,
            news
        )
    }

    /// No retry: an empty or non-conforming reply fails the step.
    pub async fn run(&self, news: &str) -> Result<MacroAnalysisResult, PipelineError> {
        let mut request = LlmRequest::new(Self::prompt(news));
        request.response_schema = Some(response_schema());
        request.temperature = Some(0.4);
        let request = self.settings.apply(request);

        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|e| PipelineError::provider(Step::Analysis, e))?;

        if response.content.trim().is_empty() {
            return Err(PipelineError::EmptyResponse {
                step: Step::Analysis,
            });
        }

        let result = MacroAnalysisResult::parse(&response.content).map_err(|e| {
            PipelineError::MalformedJson {
                step: Step::Analysis,
                detail: e.to_string(),
            }
        })?;

        info!(
            items = result.len(),
            tokens = response.usage.total_tokens,
            "analysis: structured result parsed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;

    #[tokio::test]
    async fn parses_schema_output() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            r#"{"macro_analysis":[{"news_summary":"Fed raises rates","identified_macro_factors":["interest rates"],"impact_analysis":"Tighter credit","importance_score":9}]}"#,
        )]));
        let agent = AnalysisAgent::new(provider.clone()).with_settings(AgentSettings {
            max_tokens: Some(4096),
            ..AgentSettings::default()
        });

        let result = agent.run("1. Fed raises rates").await.expect("analysis ok");
        assert_eq!(result.len(), 1);
        assert_eq!(result.macro_analysis[0].importance_score, Some(9));

        let request = provider.request(0);
        assert_eq!(request.max_tokens, Some(4096));
        assert_eq!(request.response_schema, Some(response_schema()));
        assert!(request.prompt.ends_with("1. Fed raises rates\n"));
    }

    #[tokio::test]
    async fn empty_reply_fails() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("")]));
        let err = AnalysisAgent::new(provider).run("news").await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResponse { step: Step::Analysis }));
        assert!(err.to_string().contains("empty response"));
    }

    #[tokio::test]
    async fn invalid_json_fails() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("{\"macro_analysis\": [ {")]));
        let err = AnalysisAgent::new(provider).run("news").await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedJson { step: Step::Analysis, .. }));
    }
}
