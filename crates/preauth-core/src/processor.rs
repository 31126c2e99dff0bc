//! The PREAUTH pipeline processor: the single-flight run driver.
//!
//! The processor enforces the run model:
//!
//!   Claim → Fetch → Reset progress → Processing → Sensing → Planning →
//!   Orchestration → Decision → Complete
//!
//! At most one run per request id is in flight at any time. A second
//! `process` call for the same id fails with `AlreadyProcessing` before
//! touching any store. The in-flight marker is held by an RAII guard and is
//! released on every exit path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use preauth_contracts::{
    error::{PreauthError, PreauthResult},
    progress::PipelineEvent,
    request::{RequestStatus, RequestUpdate},
    stage::DecisionOutput,
};

use crate::progress::{NoopUpdates, ProgressCallbacks};
use crate::random::RandomSource;
use crate::stages::{self, sensing::SensingRules};
use crate::traits::{RequestStore, ToolInvoker, TraceLogStore, UpdateSink, WorkflowStepStore};

/// A run currently holding the single-flight marker for its request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InFlightRun {
    pub request_id: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
}

type InFlightMap = Arc<Mutex<HashMap<String, InFlightRun>>>;

/// Removes the request from the in-flight map when dropped.
struct InFlightGuard {
    runs: InFlightMap,
    request_id: String,
    run_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.request_id);
    }
}

/// Drives requests through the four stages.
///
/// Construct one processor per application and share it. Runs for
/// different requests proceed concurrently.
pub struct PipelineProcessor {
    tools: Arc<dyn ToolInvoker>,
    requests: Arc<dyn RequestStore>,
    steps: Arc<dyn WorkflowStepStore>,
    traces: Arc<dyn TraceLogStore>,
    rng: Arc<dyn RandomSource>,
    sensing_rules: SensingRules,
    in_flight: InFlightMap,
}

impl PipelineProcessor {
    pub fn new(
        tools: Arc<dyn ToolInvoker>,
        requests: Arc<dyn RequestStore>,
        steps: Arc<dyn WorkflowStepStore>,
        traces: Arc<dyn TraceLogStore>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            tools,
            requests,
            steps,
            traces,
            rng,
            sensing_rules: SensingRules::default(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the default urgent and complex procedure code sets.
    pub fn with_sensing_rules(mut self, rules: SensingRules) -> Self {
        self.sensing_rules = rules;
        self
    }

    pub fn is_processing(&self, request_id: &str) -> bool {
        self.lock_in_flight().contains_key(request_id)
    }

    /// Snapshot of every run in flight, oldest first.
    pub fn in_flight(&self) -> Vec<InFlightRun> {
        let mut runs: Vec<InFlightRun> = self.lock_in_flight().values().cloned().collect();
        runs.sort_by_key(|r| r.started_at);
        runs
    }

    /// Run the pipeline for `request_id` with no live subscriber.
    pub async fn process(&self, request_id: &str) -> PreauthResult<DecisionOutput> {
        self.process_with_updates(request_id, Arc::new(NoopUpdates))
            .await
    }

    /// Run the pipeline for `request_id`, pushing lifecycle events to `updates`.
    ///
    /// # Errors
    ///
    /// - `AlreadyProcessing` if a run for this id is in flight; nothing is
    ///   written in that case
    /// - `RequestNotFound` if the id does not resolve
    /// - any stage, tool, or storage error, after the request has been moved
    ///   to `review` with an error rationale (best-effort)
    pub async fn process_with_updates(
        &self,
        request_id: &str,
        updates: Arc<dyn UpdateSink>,
    ) -> PreauthResult<DecisionOutput> {
        let guard = self.claim(request_id)?;
        let span = info_span!("pipeline_run", request_id, run_id = %guard.run_id);

        async move {
            info!("pipeline run starting");
            let result = self.run(request_id, &updates).await;

            match &result {
                Ok(decision) => info!(
                    decision = %decision.decision,
                    confidence = decision.confidence,
                    "pipeline run finished"
                ),
                Err(err) => {
                    error!(error = %err, "pipeline run failed");
                    self.recover(request_id, err).await;
                    updates.notify(PipelineEvent::Error {
                        request_id: request_id.to_string(),
                        error: err.to_string(),
                    });
                }
            }

            drop(guard);
            result
        }
        .instrument(span)
        .await
    }

    fn claim(&self, request_id: &str) -> PreauthResult<InFlightGuard> {
        let mut runs = self.lock_in_flight();
        if runs.contains_key(request_id) {
            warn!(request_id, "request is already being processed");
            return Err(PreauthError::AlreadyProcessing {
                request_id: request_id.to_string(),
            });
        }

        let run = InFlightRun {
            request_id: request_id.to_string(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        };
        let run_id = run.run_id;
        runs.insert(request_id.to_string(), run);

        Ok(InFlightGuard {
            runs: Arc::clone(&self.in_flight),
            request_id: request_id.to_string(),
            run_id,
        })
    }

    async fn run(
        &self,
        request_id: &str,
        updates: &Arc<dyn UpdateSink>,
    ) -> PreauthResult<DecisionOutput> {
        let request = self
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| PreauthError::RequestNotFound {
                request_id: request_id.to_string(),
            })?;

        // A reprocess never mixes its progress records with an earlier run's.
        self.steps.delete_all(request_id).await?;
        self.traces.delete_all(request_id).await?;

        self.requests
            .update(request_id, RequestUpdate::status(RequestStatus::Processing))
            .await?;
        updates.notify(PipelineEvent::Status {
            request_id: request_id.to_string(),
            status: RequestStatus::Processing,
        });

        let progress = ProgressCallbacks::new(
            request_id,
            Arc::clone(&self.steps),
            Arc::clone(&self.traces),
            Arc::clone(updates),
            Arc::clone(&self.rng),
        );

        let sensing = stages::sensing::run(&request, &self.sensing_rules, &progress).await?;
        let plan = stages::planning::run(&sensing, &request, self.rng.as_ref(), &progress).await?;
        let orchestration =
            stages::orchestration::run(&plan, &request, self.tools.as_ref(), &progress).await?;
        let decision =
            stages::decision::run(&orchestration, &request, self.requests.as_ref(), &progress)
                .await?;

        updates.notify(PipelineEvent::Complete {
            request_id: request_id.to_string(),
            decision: decision.decision,
            status: decision.status,
            rationale: decision.rationale.clone(),
            confidence: decision.confidence,
        });

        Ok(decision)
    }

    /// Move a failed request to manual review. Failures here are logged only.
    async fn recover(&self, request_id: &str, err: &PreauthError) {
        if matches!(err, PreauthError::RequestNotFound { .. }) {
            return;
        }
        let update = RequestUpdate::status(RequestStatus::Review).with_rationale(format!(
            "Processing error: {err}. Manual review required."
        ));
        if let Err(update_err) = self.requests.update(request_id, update).await {
            error!(
                request_id,
                error = %update_err,
                "failed to move request to review after pipeline error"
            );
        }
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<String, InFlightRun>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ChannelUpdates;
    use crate::random::FixedRandom;
    use crate::testing::{sample_request, MemoryStores, ScriptedTools};
    use preauth_contracts::decision::Decision;
    use preauth_contracts::progress::TraceLevel;
    use preauth_contracts::tool::tool_names;
    use tokio::sync::Notify;

    fn processor(stores: &Arc<MemoryStores>, tools: Arc<ScriptedTools>) -> PipelineProcessor {
        PipelineProcessor::new(
            tools,
            stores.clone(),
            stores.clone(),
            stores.clone(),
            Arc::new(FixedRandom(0.5)),
        )
    }

    #[tokio::test]
    async fn full_run_approves_and_records_progress() {
        let stores = Arc::new(MemoryStores::with_request(sample_request("PA-1")));
        let processor = processor(&stores, Arc::new(ScriptedTools::approving()));

        let decision = processor.process("PA-1").await.unwrap();

        assert_eq!(decision.decision, Decision::Approve);
        assert_eq!(decision.status, RequestStatus::Approved);
        assert_eq!(stores.request("PA-1").unwrap().status, RequestStatus::Approved);

        // Sensing, Planning, Activation, six tools, Decision.
        let steps = stores.steps_for("PA-1");
        assert_eq!(steps.len(), 10);
        let numbers: Vec<u32> = steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, (1..=10).collect::<Vec<_>>());
        assert!(!processor.is_processing("PA-1"));
    }

    #[tokio::test]
    async fn status_moves_to_processing_before_stages_run() {
        let stores = Arc::new(MemoryStores::with_request(sample_request("PA-1")));
        let processor = processor(&stores, Arc::new(ScriptedTools::approving()));

        processor.process("PA-1").await.unwrap();

        let statuses: Vec<_> = stores
            .updates_for("PA-1")
            .into_iter()
            .filter_map(|u| u.status)
            .collect();
        assert_eq!(statuses, vec![RequestStatus::Processing, RequestStatus::Approved]);
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let stores = Arc::new(MemoryStores::default());
        let processor = processor(&stores, Arc::new(ScriptedTools::approving()));

        let err = processor.process("PA-404").await.unwrap_err();

        assert_eq!(
            err,
            PreauthError::RequestNotFound {
                request_id: "PA-404".into()
            }
        );
        assert!(stores.updates_for("PA-404").is_empty());
        assert!(!processor.is_processing("PA-404"));
    }

    #[tokio::test]
    async fn concurrent_second_run_is_rejected() {
        let stores = Arc::new(MemoryStores::with_request(sample_request("PA-1")));
        let gate = Arc::new(Notify::new());
        let tools = Arc::new(ScriptedTools::approving().gated(gate.clone()));
        let processor = Arc::new(processor(&stores, tools.clone()));

        let first = tokio::spawn({
            let processor = processor.clone();
            async move { processor.process("PA-1").await }
        });
        while !processor.is_processing("PA-1") {
            tokio::task::yield_now().await;
        }

        let err = processor.process("PA-1").await.unwrap_err();
        assert_eq!(
            err,
            PreauthError::AlreadyProcessing {
                request_id: "PA-1".into()
            }
        );
        assert_eq!(processor.in_flight().len(), 1);

        gate.notify_one();
        let decision = first.await.unwrap().unwrap();
        assert_eq!(decision.decision, Decision::Approve);

        // One run's worth of everything.
        let terminal_writes = stores
            .updates_for("PA-1")
            .into_iter()
            .filter(|u| u.decision_date.is_some())
            .count();
        assert_eq!(terminal_writes, 1);
        assert_eq!(stores.steps_for("PA-1").len(), 10);
        let invoked = stores
            .traces_for("PA-1")
            .iter()
            .filter(|t| t.message == "Intelligent Document Processing tool invoked")
            .count();
        assert_eq!(invoked, 1);
        assert_eq!(
            tools
                .calls()
                .iter()
                .filter(|c| c.as_str() == tool_names::DOCUMENT_PROCESSING)
                .count(),
            1
        );
        assert!(processor.in_flight().is_empty());
    }

    #[tokio::test]
    async fn tool_failure_moves_request_to_review() {
        let stores = Arc::new(MemoryStores::with_request(sample_request("PA-1")));
        let tools = Arc::new(ScriptedTools::approving().failing_on(tool_names::CLAIMS_HISTORY));
        let processor = processor(&stores, tools);
        let (sink, mut rx) = ChannelUpdates::new();

        let err = processor
            .process_with_updates("PA-1", Arc::new(sink))
            .await
            .unwrap_err();

        assert!(matches!(err, PreauthError::ToolExecution { .. }));
        let stored = stores.request("PA-1").unwrap();
        assert_eq!(stored.status, RequestStatus::Review);
        assert_eq!(
            stored.decision_rationale.unwrap(),
            format!("Processing error: {err}. Manual review required.")
        );
        assert!(!processor.is_processing("PA-1"));

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(PipelineEvent::Error {
                request_id: "PA-1".into(),
                error: err.to_string(),
            })
        );
        assert!(stores
            .traces_for("PA-1")
            .iter()
            .any(|t| t.level == TraceLevel::Error));
    }

    #[tokio::test]
    async fn lock_is_released_after_failure() {
        let stores = Arc::new(MemoryStores::with_request(sample_request("PA-1")));
        stores.fail_appends(true);
        let processor = processor(&stores, Arc::new(ScriptedTools::approving()));

        assert!(processor.process("PA-1").await.is_err());
        stores.fail_appends(false);
        assert!(processor.process("PA-1").await.is_ok());
    }

    #[tokio::test]
    async fn reprocess_replaces_previous_progress() {
        let stores = Arc::new(MemoryStores::with_request(sample_request("PA-1")));
        let processor = processor(&stores, Arc::new(ScriptedTools::approving()));

        processor.process("PA-1").await.unwrap();
        let first_steps = stores.steps_for("PA-1").len();
        let first_traces = stores.traces_for("PA-1").len();

        processor.process("PA-1").await.unwrap();
        let steps = stores.steps_for("PA-1");

        assert_eq!(steps.len(), first_steps);
        assert_eq!(stores.traces_for("PA-1").len(), first_traces);
        assert_eq!(steps[0].step_number, 1);
    }

    #[tokio::test]
    async fn events_arrive_in_lifecycle_order() {
        let stores = Arc::new(MemoryStores::with_request(sample_request("PA-1")));
        let processor = processor(&stores, Arc::new(ScriptedTools::approving()));
        let (sink, mut rx) = ChannelUpdates::new();

        processor
            .process_with_updates("PA-1", Arc::new(sink))
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(kinds.first(), Some(&"status"));
        assert_eq!(kinds.last(), Some(&"complete"));
        assert_eq!(kinds.iter().filter(|k| **k == "step").count(), 10);
    }

    #[tokio::test]
    async fn inactive_member_is_denied_even_when_matcher_approves() {
        let stores = Arc::new(MemoryStores::with_request(sample_request("PA-1")));
        let tools = ScriptedTools::approving().with_response(
            tool_names::MEMBER_ELIGIBILITY,
            serde_json::json!({ "found": true, "isActive": false, "issues": ["MEMBER_INACTIVE"] }),
        );
        let processor = processor(&stores, Arc::new(tools));

        let decision = processor.process("PA-1").await.unwrap();

        assert_eq!(decision.decision, Decision::Deny);
        assert_eq!(decision.confidence, 0.95);
        assert_eq!(stores.request("PA-1").unwrap().status, RequestStatus::Denied);
    }
}
