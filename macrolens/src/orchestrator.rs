use std::sync::Arc;
use std::time::Instant;

use common::{Config, Step};
use tracing::{error, info};

use crate::agents::{AgentSettings, AnalysisAgent, ScoutAgent, VerificationAgent};
use crate::analysis::MacroAnalysisResult;
use crate::error::PipelineError;
use crate::llm::LlmProvider;

pub const STATUS_SCOUT: &str = "Scouting for the latest market news...";
pub const STATUS_VERIFY: &str = "Verifying news accuracy...";
pub const STATUS_ANALYZE: &str = "Analyzing macroeconomic impact...";

/// Callback receiving a human-readable status line before each step
pub type StatusFn<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Providers for each step. The same provider may back several steps.
#[derive(Clone)]
pub struct StepProviders {
    pub scout: Arc<dyn LlmProvider>,
    pub verification: Arc<dyn LlmProvider>,
    pub analysis: Arc<dyn LlmProvider>,
}

impl StepProviders {
    pub fn shared(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            scout: provider.clone(),
            verification: provider.clone(),
            analysis: provider,
        }
    }

    pub fn get(&self, step: Step) -> &Arc<dyn LlmProvider> {
        match step {
            Step::Scout => &self.scout,
            Step::Verification => &self.verification,
            Step::Analysis => &self.analysis,
        }
    }
}

/// Sequential driver: Scout, then Verification (when enabled), then Analysis.
pub struct AnalysisOrchestrator {
    scout: ScoutAgent,
    verifier: Option<VerificationAgent>,
    analyst: AnalysisAgent,
}

impl AnalysisOrchestrator {
    pub fn new(scout: ScoutAgent, verifier: Option<VerificationAgent>, analyst: AnalysisAgent) -> Self {
        Self {
            scout,
            verifier,
            analyst,
        }
    }

    /// Wire the agents from configuration and already-constructed providers.
    pub fn from_config(config: &Config, providers: StepProviders) -> Self {
        let settings = |step| AgentSettings::from(&config.llm.step(step));

        let scout = ScoutAgent::new(providers.scout.clone(), &config.pipeline)
            .with_settings(settings(Step::Scout));
        let verifier = config.pipeline.verification.then(|| {
            VerificationAgent::new(providers.verification.clone())
                .with_settings(settings(Step::Verification))
        });
        let analyst =
            AnalysisAgent::new(providers.analysis.clone()).with_settings(settings(Step::Analysis));

        Self::new(scout, verifier, analyst)
    }

    pub fn verification_enabled(&self) -> bool {
        self.verifier.is_some()
    }

    /// Run the whole pipeline. The first failing step aborts the run and its
    /// error is returned as-is.
    pub async fn run_analysis(&self, on_status: StatusFn<'_>) -> Result<MacroAnalysisResult, PipelineError> {
        let started = Instant::now();
        let outcome = self.run_steps(on_status).await;

        match &outcome {
            Ok(result) => info!(
                items = result.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "orchestrator: analysis complete"
            ),
            Err(e) => error!(
                kind = e.kind(),
                step = ?e.step(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "orchestrator: analysis failed: {}",
                e
            ),
        }
        outcome
    }

    async fn run_steps(&self, on_status: StatusFn<'_>) -> Result<MacroAnalysisResult, PipelineError> {
        on_status(STATUS_SCOUT);
        let news = self.scout.run().await?;

        let news = match &self.verifier {
            Some(verifier) => {
                on_status(STATUS_VERIFY);
                verifier.run(&news).await?
            }
            None => news,
        };

        on_status(STATUS_ANALYZE);
        self.analyst.run(&news).await
    }
}
