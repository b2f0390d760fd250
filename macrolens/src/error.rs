//! Failures of the analysis pipeline and the messages shown for them.

use common::Step;

/// Message shown when a failure carries no usable description
pub const GENERIC_FAILURE: &str = "An unknown error occurred while running the analysis.";

/// Failures of the analysis pipeline. `Display` is the message shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The scout produced nothing to analyse
    #[error("The scout agent returned no content.")]
    NoContent,

    /// The verifier judged the scouted news unreliable
    #[error("News verification failed: {reason}")]
    VerificationRejected { reason: String },

    #[error("The {step} agent returned an empty response.")]
    EmptyResponse { step: Step },

    #[error("The {step} agent returned malformed JSON: {detail}")]
    MalformedJson { step: Step, detail: String },

    /// Network, HTTP or SDK-level failure; the originating message is kept verbatim
    #[error("{message}")]
    Provider { step: Step, message: String },

    #[error("{}", GENERIC_FAILURE)]
    Unknown,
}

impl PipelineError {
    /// Wrap a provider failure, keeping its full context chain as the message.
    pub fn provider(step: Step, err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        if message.trim().is_empty() {
            PipelineError::Unknown
        } else {
            PipelineError::Provider { step, message }
        }
    }

    /// Stable machine-readable kind, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NoContent => "no_content",
            PipelineError::VerificationRejected { .. } => "verification_rejected",
            PipelineError::EmptyResponse { .. } => "empty_response",
            PipelineError::MalformedJson { .. } => "malformed_json",
            PipelineError::Provider { .. } => "provider_error",
            PipelineError::Unknown => "unknown",
        }
    }

    /// Step that failed, when known
    pub fn step(&self) -> Option<Step> {
        match self {
            PipelineError::NoContent => Some(Step::Scout),
            PipelineError::VerificationRejected { .. } => Some(Step::Verification),
            PipelineError::EmptyResponse { step }
            | PipelineError::MalformedJson { step, .. }
            | PipelineError::Provider { step, .. } => Some(*step),
            PipelineError::Unknown => None,
        }
    }
}
