use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::MacroAnalysisResult;
use crate::error::PipelineError;
use crate::orchestrator::{AnalysisOrchestrator, StatusFn};

pub mod websocket;

/// Message returned when a run is requested while another one is loading
pub const BUSY_MESSAGE: &str = "An analysis is already running. Please wait for it to finish.";

const INTERRUPTED_MESSAGE: &str = "The analysis run was interrupted before it finished.";

/// Lifecycle of the current analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Loading,
    Done,
    Failed,
}

/// Point-in-time view of the current (or last) run. Lives in memory only.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub state: RunState,
    pub run_id: Option<Uuid>,
    pub status_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MacroAnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for RunSnapshot {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            run_id: None,
            status_message: None,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }
}

/// Single-flight gate plus the state shown to the front-end.
#[derive(Default)]
pub struct RunTracker {
    busy: AtomicBool,
    snapshot: Mutex<RunSnapshot>,
}

impl RunTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start a run, or `None` while another run is loading.
    pub fn try_begin(self: &Arc<Self>) -> Option<RunGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let run_id = Uuid::new_v4();
        *self.lock() = RunSnapshot {
            state: RunState::Loading,
            run_id: Some(run_id),
            started_at: Some(Utc::now()),
            ..RunSnapshot::default()
        };
        info!(%run_id, "runs: run started");

        Some(RunGuard {
            tracker: Arc::clone(self),
            run_id,
        })
    }

    pub fn is_loading(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.lock().clone()
    }

    /// Result of the last successful run, if the latest run succeeded
    pub fn last_result(&self) -> Option<MacroAnalysisResult> {
        self.lock().result.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RunSnapshot> {
        // A panic while holding the lock leaves a consistent snapshot behind
        self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Held for the duration of a run; dropping it re-arms the trigger.
pub struct RunGuard {
    tracker: Arc<RunTracker>,
    run_id: Uuid,
}

impl RunGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn record_status(&self, message: &str) {
        let mut snapshot = self.tracker.lock();
        if snapshot.run_id == Some(self.run_id) {
            snapshot.status_message = Some(message.to_string());
        }
    }

    fn record_outcome(&self, outcome: &Result<MacroAnalysisResult, PipelineError>) {
        let mut snapshot = self.tracker.lock();
        snapshot.finished_at = Some(Utc::now());
        snapshot.status_message = None;
        match outcome {
            Ok(result) => {
                snapshot.state = RunState::Done;
                snapshot.result = Some(result.clone());
                snapshot.error = None;
            }
            Err(e) => {
                snapshot.state = RunState::Failed;
                snapshot.result = None;
                snapshot.error = Some(e.to_string());
            }
        }
    }

    /// Run the pipeline, mirroring every status line into the snapshot
    /// before handing it to `on_status`.
    pub async fn execute(
        self,
        orchestrator: &AnalysisOrchestrator,
        on_status: StatusFn<'_>,
    ) -> Result<MacroAnalysisResult, PipelineError> {
        let forward = |message: &str| {
            self.record_status(message);
            on_status(message);
        };

        let outcome = orchestrator.run_analysis(&forward).await;
        self.record_outcome(&outcome);
        info!(run_id = %self.run_id, ok = outcome.is_ok(), "runs: run finished");
        outcome
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        {
            let mut snapshot = self.tracker.lock();
            if snapshot.run_id == Some(self.run_id) && snapshot.state == RunState::Loading {
                warn!(run_id = %self.run_id, "runs: run dropped while loading");
                snapshot.state = RunState::Failed;
                snapshot.finished_at = Some(Utc::now());
                snapshot.status_message = None;
                snapshot.error = Some(INTERRUPTED_MESSAGE.to_string());
            }
        }
        self.tracker.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use crate::orchestrator::{StepProviders, STATUS_ANALYZE, STATUS_SCOUT, STATUS_VERIFY};
    use common::Config;

    const ANALYSIS: &str = r#"{"macro_analysis":[{"news_summary":"Fed raises rates","identified_macro_factors":["interest rates"],"impact_analysis":"..."}]}"#;

    fn orchestrator(replies: Vec<Result<&str, &str>>) -> AnalysisOrchestrator {
        let provider = Arc::new(ScriptedProvider::new(replies));
        AnalysisOrchestrator::from_config(&Config::default(), StepProviders::shared(provider))
    }

    #[test]
    fn second_run_is_refused_while_loading() {
        let tracker = RunTracker::new();
        let guard = tracker.try_begin().expect("first run");
        assert!(tracker.is_loading());
        assert!(tracker.try_begin().is_none());
        assert_eq!(tracker.snapshot().state, RunState::Loading);

        drop(guard);
        assert!(!tracker.is_loading());
        assert!(tracker.try_begin().is_some());
    }

    #[test]
    fn dropped_guard_marks_run_interrupted() {
        let tracker = RunTracker::new();
        drop(tracker.try_begin().unwrap());
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, RunState::Failed);
        assert_eq!(snapshot.error.as_deref(), Some(INTERRUPTED_MESSAGE));
    }

    #[tokio::test]
    async fn successful_run_is_recorded() {
        let tracker = RunTracker::new();
        let orchestrator = orchestrator(vec![
            Ok("1. Fed raises rates..."),
            Ok(r#"{"verified": true, "reason": "ok"}"#),
            Ok(ANALYSIS),
        ]);
        let seen = Mutex::new(Vec::new());
        let on_status = |m: &str| seen.lock().unwrap().push(m.to_string());

        let guard = tracker.try_begin().unwrap();
        let run_id = guard.run_id();
        let result = guard.execute(&orchestrator, &on_status).await.expect("run ok");

        assert_eq!(result.len(), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![STATUS_SCOUT, STATUS_VERIFY, STATUS_ANALYZE]
        );
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, RunState::Done);
        assert_eq!(snapshot.run_id, Some(run_id));
        assert!(snapshot.finished_at.is_some());
        assert_eq!(tracker.last_result(), Some(result));
        assert!(!tracker.is_loading());
    }

    #[tokio::test]
    async fn status_message_is_tracked_while_loading() {
        let tracker = RunTracker::new();
        let orchestrator = orchestrator(vec![
            Ok("1. news"),
            Ok(r#"{"verified": true, "reason": "ok"}"#),
            Ok(ANALYSIS),
        ]);

        // Each callback sees the snapshot as the front-end would at that moment
        let watcher = Arc::clone(&tracker);
        let observed = Mutex::new(Vec::new());
        let on_status = |m: &str| {
            let snapshot = watcher.snapshot();
            observed
                .lock()
                .unwrap()
                .push((snapshot.state, snapshot.status_message, m.to_string()));
        };

        tracker
            .try_begin()
            .unwrap()
            .execute(&orchestrator, &on_status)
            .await
            .unwrap();

        let observed = observed.into_inner().unwrap();
        assert_eq!(observed.len(), 3);
        for (state, status_message, message) in observed {
            assert_eq!(state, RunState::Loading);
            assert_eq!(status_message.as_deref(), Some(message.as_str()));
        }
        assert_eq!(tracker.snapshot().status_message, None);
    }

    #[tokio::test]
    async fn failed_run_clears_previous_result() {
        let tracker = RunTracker::new();
        let ok = orchestrator(vec![
            Ok("1. news"),
            Ok(r#"{"verified": true, "reason": "ok"}"#),
            Ok(ANALYSIS),
        ]);
        tracker.try_begin().unwrap().execute(&ok, &|_| {}).await.unwrap();
        assert!(tracker.last_result().is_some());

        let failing = orchestrator(vec![Ok("")]);
        let err = tracker
            .try_begin()
            .unwrap()
            .execute(&failing, &|_| {})
            .await
            .unwrap_err();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, RunState::Failed);
        assert_eq!(snapshot.error, Some(err.to_string()));
        assert!(tracker.last_result().is_none());
    }
}
