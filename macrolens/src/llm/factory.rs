// Provider construction from configuration
use anyhow::{Context, Result};
use std::sync::Arc;

use common::{LlmConfig, RemoteLlmConfig, Step};
use tracing::{info, warn};

use super::gemini::{self, GeminiProvider};
use super::openai::{self, OpenAiProvider};
use super::LlmProvider;
use crate::orchestrator::StepProviders;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Supported provider adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adapter {
    Gemini,
    OpenAi,
}

impl Adapter {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Adapter::Gemini),
            "openai" | "remote" => Ok(Adapter::OpenAi),
            other => anyhow::bail!("Unknown LLM adapter type: {}", other),
        }
    }

    fn default_api_url(self) -> &'static str {
        match self {
            Adapter::Gemini => gemini::DEFAULT_API_URL,
            Adapter::OpenAi => openai::DEFAULT_API_URL,
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Adapter::Gemini => gemini::DEFAULT_MODEL,
            Adapter::OpenAi => openai::DEFAULT_MODEL,
        }
    }

    fn default_key_env(self) -> &'static str {
        match self {
            Adapter::Gemini => "GEMINI_API_KEY",
            Adapter::OpenAi => "OPENAI_API_KEY",
        }
    }

    fn default_max_tokens(self) -> usize {
        match self {
            Adapter::Gemini => 8192,
            Adapter::OpenAi => 4096,
        }
    }
}

/// Build one provider. A missing API key is only a warning: the provider is
/// still created and requests fail when they reach the API.
pub fn create_llm_provider(adapter: Adapter, cfg: &RemoteLlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let api_url = cfg
        .api_url
        .clone()
        .unwrap_or_else(|| adapter.default_api_url().to_string());
    url::Url::parse(&api_url).with_context(|| format!("Invalid LLM api_url '{}'", api_url))?;

    let api_key_env = cfg
        .api_key_env
        .clone()
        .unwrap_or_else(|| adapter.default_key_env().to_string());
    let api_key = match std::env::var(&api_key_env) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            warn!(env = %api_key_env, "LLM API key env var is not set; requests will fail until it is");
            String::new()
        }
    };

    let model = cfg
        .model
        .clone()
        .unwrap_or_else(|| adapter.default_model().to_string());
    let timeout_secs = cfg.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
    let max_tokens = cfg.max_tokens.unwrap_or_else(|| adapter.default_max_tokens());
    let temperature = cfg.temperature.unwrap_or(DEFAULT_TEMPERATURE);

    info!(?adapter, %model, %api_url, "LLM provider initialized");

    let provider: Arc<dyn LlmProvider> = match adapter {
        Adapter::Gemini => Arc::new(
            GeminiProvider::new(api_url, api_key, model).with_defaults(timeout_secs, max_tokens, temperature),
        ),
        Adapter::OpenAi => Arc::new(
            OpenAiProvider::new(api_url, api_key, model).with_defaults(timeout_secs, max_tokens, temperature),
        ),
    };
    Ok(provider)
}

/// Build the provider for each step, sharing one instance between steps
/// whose resolved settings are identical.
pub fn create_step_providers(llm: &LlmConfig) -> Result<StepProviders> {
    let adapter = Adapter::parse(&llm.adapter)?;
    let shared = create_llm_provider(adapter, &llm.remote)?;

    let for_step = |step: Step| -> Result<Arc<dyn LlmProvider>> {
        let resolved = llm.step(step);
        if resolved == llm.remote {
            Ok(shared.clone())
        } else {
            create_llm_provider(adapter, &resolved)
                .with_context(|| format!("Failed to initialize {} provider", step))
        }
    };

    Ok(StepProviders {
        scout: for_step(Step::Scout)?,
        verification: for_step(Step::Verification)?,
        analysis: for_step(Step::Analysis)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_names() {
        assert_eq!(Adapter::parse("gemini").unwrap(), Adapter::Gemini);
        assert_eq!(Adapter::parse(" OpenAI ").unwrap(), Adapter::OpenAi);
        assert!(Adapter::parse("local").is_err());
    }

    #[test]
    fn step_overrides_get_their_own_provider() {
        let llm = LlmConfig {
            remote: RemoteLlmConfig {
                model: Some("gemini-2.5-flash".into()),
                api_key_env: Some("MACROLENS_TEST_UNSET_KEY".into()),
                ..RemoteLlmConfig::default()
            },
            analysis: Some(RemoteLlmConfig {
                model: Some("gemini-2.5-pro".into()),
                ..RemoteLlmConfig::default()
            }),
            ..LlmConfig::default()
        };

        let providers = create_step_providers(&llm).expect("providers");
        assert_eq!(providers.scout.model(), "gemini-2.5-flash");
        assert_eq!(providers.analysis.model(), "gemini-2.5-pro");
        assert!(Arc::ptr_eq(&providers.scout, &providers.verification));
        assert!(!Arc::ptr_eq(&providers.scout, &providers.analysis));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let cfg = RemoteLlmConfig {
            api_url: Some("not a url".into()),
            ..RemoteLlmConfig::default()
        };
        let err = create_llm_provider(Adapter::OpenAi, &cfg).err().expect("expected error");
        assert!(err.to_string().contains("Invalid LLM api_url"));
    }
}
