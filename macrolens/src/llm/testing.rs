// Canned provider for unit tests
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

/// Replays queued replies in order and records every request it receives.
pub(crate) struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new(replies: Vec<Result<&str, &str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn request(&self, index: usize) -> LlmRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted reply left".to_string()));

        match reply {
            Ok(content) => Ok(LlmResponse {
                content,
                usage: UsageMetadata::default(),
                model: "scripted".to_string(),
            }),
            Err(message) => Err(anyhow::anyhow!(message)),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
