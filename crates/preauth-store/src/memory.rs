//! In-memory implementation of the request, step, and trace stores.
//!
//! `InMemoryStore` keeps everything behind one `Arc<Mutex<_>>`. Clones share
//! the same state, so the processor and an observer (the demo, a test) can
//! hold the store at the same time.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use preauth_contracts::{
    error::{PreauthError, PreauthResult},
    progress::{TraceLogEntry, WorkflowStep},
    request::{Request, RequestUpdate},
};
use preauth_core::traits::{RequestStore, TraceLogStore, WorkflowStepStore};

/// An operation the store can be told to reject with `Storage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    RequestReads,
    RequestUpdates,
    StepAppends,
    TraceAppends,
    Deletes,
}

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
struct StoreState {
    requests: BTreeMap<String, Request>,
    steps: BTreeMap<String, Vec<WorkflowStep>>,
    traces: BTreeMap<String, Vec<TraceLogEntry>>,
    faults: HashSet<Fault>,
}

impl StoreState {
    fn check(&self, fault: Fault) -> PreauthResult<()> {
        if self.faults.contains(&fault) {
            return Err(PreauthError::Storage {
                reason: format!("injected fault: {fault:?}"),
            });
        }
        Ok(())
    }
}

// ── Public store ──────────────────────────────────────────────────────────────

/// Requests, workflow steps, and trace logs in memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with `requests`.
    pub fn with_requests(requests: impl IntoIterator<Item = Request>) -> Self {
        let store = Self::new();
        for request in requests {
            store.insert_request(request);
        }
        store
    }

    /// Insert or replace a request.
    pub fn insert_request(&self, request: Request) {
        if let Ok(mut state) = self.lock() {
            state.requests.insert(request.request_id.clone(), request);
        }
    }

    pub fn request(&self, request_id: &str) -> Option<Request> {
        self.lock()
            .ok()
            .and_then(|s| s.requests.get(request_id).cloned())
    }

    /// Every stored request, oldest submission first.
    pub fn requests(&self) -> Vec<Request> {
        let mut requests: Vec<Request> = self
            .lock()
            .map(|s| s.requests.values().cloned().collect())
            .unwrap_or_default();
        requests.sort_by_key(|r| r.submitted_at);
        requests
    }

    /// Make `fault` fail until cleared.
    pub fn inject(&self, fault: Fault) {
        if let Ok(mut state) = self.lock() {
            state.faults.insert(fault);
        }
    }

    pub fn clear(&self, fault: Fault) {
        if let Ok(mut state) = self.lock() {
            state.faults.remove(&fault);
        }
    }

    fn lock(&self) -> PreauthResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|e| PreauthError::Storage {
            reason: format!("store lock poisoned: {e}"),
        })
    }
}

// ── RequestStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn get(&self, request_id: &str) -> PreauthResult<Option<Request>> {
        let state = self.lock()?;
        state.check(Fault::RequestReads)?;
        Ok(state.requests.get(request_id).cloned())
    }

    async fn update(&self, request_id: &str, update: RequestUpdate) -> PreauthResult<()> {
        let mut state = self.lock()?;
        state.check(Fault::RequestUpdates)?;
        let request = state
            .requests
            .get_mut(request_id)
            .ok_or_else(|| PreauthError::RequestNotFound {
                request_id: request_id.to_string(),
            })?;
        update.apply_to(request, Utc::now());
        debug!(request_id, status = %request.status, "request updated");
        Ok(())
    }
}

// ── WorkflowStepStore impl ────────────────────────────────────────────────────

#[async_trait]
impl WorkflowStepStore for InMemoryStore {
    async fn append(&self, step: WorkflowStep) -> PreauthResult<()> {
        let mut state = self.lock()?;
        state.check(Fault::StepAppends)?;
        state
            .steps
            .entry(step.request_id.clone())
            .or_default()
            .push(step);
        Ok(())
    }

    async fn delete_all(&self, request_id: &str) -> PreauthResult<()> {
        let mut state = self.lock()?;
        state.check(Fault::Deletes)?;
        state.steps.remove(request_id);
        Ok(())
    }

    async fn list(&self, request_id: &str) -> PreauthResult<Vec<WorkflowStep>> {
        let state = self.lock()?;
        Ok(state.steps.get(request_id).cloned().unwrap_or_default())
    }
}

// ── TraceLogStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl TraceLogStore for InMemoryStore {
    async fn append(&self, entry: TraceLogEntry) -> PreauthResult<()> {
        let mut state = self.lock()?;
        state.check(Fault::TraceAppends)?;
        state
            .traces
            .entry(entry.request_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn delete_all(&self, request_id: &str) -> PreauthResult<()> {
        let mut state = self.lock()?;
        state.check(Fault::Deletes)?;
        state.traces.remove(request_id);
        Ok(())
    }

    async fn list(&self, request_id: &str) -> PreauthResult<Vec<TraceLogEntry>> {
        let state = self.lock()?;
        Ok(state.traces.get(request_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use preauth_contracts::progress::{StepStatus, TraceLevel};
    use preauth_contracts::request::{Priority, RequestStatus};
    use serde_json::json;

    fn request(id: &str, day: u32) -> Request {
        Request {
            request_id: id.to_string(),
            patient_name: "Robert Chen".into(),
            patient_dob: None,
            member_id: "MEM-100001".into(),
            provider: "Dr. Sarah Mitchell".into(),
            provider_npi: None,
            procedure_code: "CPT-70553".into(),
            procedure_name: "MRI brain".into(),
            diagnosis_codes: vec!["G43.909".into()],
            submitted_at: Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap(),
            status: RequestStatus::Pending,
            priority: Priority::Medium,
            assigned_to: None,
            document_url: None,
            decision_rationale: None,
            decision_date: None,
            updated_at: None,
        }
    }

    fn step(id: &str, n: u32) -> WorkflowStep {
        WorkflowStep {
            request_id: id.to_string(),
            step_number: n,
            name: format!("step {n}"),
            description: String::new(),
            status: StepStatus::Completed,
            timestamp: "09:00:00 AM".into(),
            details: vec![],
            tool_name: None,
            duration_ms: 900,
        }
    }

    fn trace(id: &str, message: &str) -> TraceLogEntry {
        TraceLogEntry {
            request_id: id.to_string(),
            timestamp: "09:00:00.000".into(),
            level: TraceLevel::Info,
            category: "Test".into(),
            message: message.to_string(),
            details: json!({}),
        }
    }

    #[tokio::test]
    async fn update_applies_patch_and_stamps_time() {
        let store = InMemoryStore::with_requests([request("PA-1", 1)]);

        store
            .update(
                "PA-1",
                RequestUpdate::status(RequestStatus::Denied).with_rationale("no"),
            )
            .await
            .unwrap();

        let stored = store.request("PA-1").unwrap();
        assert_eq!(stored.status, RequestStatus::Denied);
        assert_eq!(stored.decision_rationale.as_deref(), Some("no"));
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn update_of_unknown_request_fails() {
        let store = InMemoryStore::new();
        let err = store
            .update("PA-9", RequestUpdate::status(RequestStatus::Review))
            .await
            .unwrap_err();
        assert!(matches!(err, PreauthError::RequestNotFound { .. }));
    }

    #[tokio::test]
    async fn steps_and_traces_are_scoped_per_request() {
        let store = InMemoryStore::new();
        WorkflowStepStore::append(&store, step("PA-1", 1)).await.unwrap();
        WorkflowStepStore::append(&store, step("PA-1", 2)).await.unwrap();
        WorkflowStepStore::append(&store, step("PA-2", 1)).await.unwrap();
        TraceLogStore::append(&store, trace("PA-1", "a")).await.unwrap();
        TraceLogStore::append(&store, trace("PA-2", "b")).await.unwrap();

        WorkflowStepStore::delete_all(&store, "PA-1").await.unwrap();
        TraceLogStore::delete_all(&store, "PA-1").await.unwrap();

        assert!(WorkflowStepStore::list(&store, "PA-1").await.unwrap().is_empty());
        assert!(TraceLogStore::list(&store, "PA-1").await.unwrap().is_empty());
        assert_eq!(WorkflowStepStore::list(&store, "PA-2").await.unwrap().len(), 1);
        assert_eq!(TraceLogStore::list(&store, "PA-2").await.unwrap()[0].message, "b");
    }

    #[tokio::test]
    async fn steps_keep_insertion_order() {
        let store = InMemoryStore::new();
        for n in 1..=4 {
            WorkflowStepStore::append(&store, step("PA-1", n)).await.unwrap();
        }
        let numbers: Vec<u32> = WorkflowStepStore::list(&store, "PA-1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.step_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn injected_faults_fail_until_cleared() {
        let store = InMemoryStore::with_requests([request("PA-1", 1)]);
        store.inject(Fault::TraceAppends);

        let err = TraceLogStore::append(&store, trace("PA-1", "x")).await.unwrap_err();
        assert!(matches!(err, PreauthError::Storage { .. }));
        // Other operations are unaffected.
        WorkflowStepStore::append(&store, step("PA-1", 1)).await.unwrap();

        store.clear(Fault::TraceAppends);
        TraceLogStore::append(&store, trace("PA-1", "x")).await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::new();
        let observer = store.clone();
        store.insert_request(request("PA-1", 1));
        assert!(observer.request("PA-1").is_some());
    }

    #[test]
    fn requests_are_listed_oldest_first() {
        let store = InMemoryStore::with_requests([request("PA-3", 3), request("PA-1", 1), request("PA-2", 2)]);
        let ids: Vec<String> = store.requests().into_iter().map(|r| r.request_id).collect();
        assert_eq!(ids, vec!["PA-1", "PA-2", "PA-3"]);
    }
}
