//! The three prompt steps of the pipeline. Each agent is a single
//! request/response round-trip against an injected provider.

use common::RemoteLlmConfig;

use crate::llm::LlmRequest;

pub mod analyst;
pub mod scout;
pub mod verification;

pub use analyst::AnalysisAgent;
pub use scout::ScoutAgent;
pub use verification::VerificationAgent;

/// Per-step request tuning; unset fields fall back to the provider defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentSettings {
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl AgentSettings {
    pub(crate) fn apply(&self, mut request: LlmRequest) -> LlmRequest {
        request.max_tokens = self.max_tokens.or(request.max_tokens);
        request.temperature = self.temperature.or(request.temperature);
        request.timeout_seconds = self.timeout_seconds.or(request.timeout_seconds);
        request
    }
}

impl From<&RemoteLlmConfig> for AgentSettings {
    fn from(cfg: &RemoteLlmConfig) -> Self {
        Self {
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            timeout_seconds: cfg.timeout_seconds,
        }
    }
}
