//! In-memory doubles shared by this crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Notify;

use preauth_contracts::{
    error::{PreauthError, PreauthResult},
    progress::{TraceLogEntry, WorkflowStep},
    request::{Priority, Request, RequestStatus, RequestUpdate},
    tool::tool_names,
};

use crate::traits::{RequestStore, ToolInvoker, TraceLogStore, WorkflowStepStore};

pub(crate) fn sample_request(request_id: &str) -> Request {
    Request {
        request_id: request_id.to_string(),
        patient_name: "Maria Garcia".into(),
        patient_dob: None,
        member_id: "MEM-100004".into(),
        provider: "Dr. Alan Brooks".into(),
        provider_npi: Some("1234567890".into()),
        procedure_code: "CPT-27447".into(),
        procedure_name: "Total knee arthroplasty".into(),
        diagnosis_codes: vec!["M17.11".into()],
        submitted_at: Utc::now(),
        status: RequestStatus::Pending,
        priority: Priority::Medium,
        assigned_to: None,
        document_url: Some("/documents/PA-1.pdf".into()),
        decision_rationale: None,
        decision_date: None,
        updated_at: None,
    }
}

/// All three stores in one struct, with switches for injected failures.
#[derive(Default)]
pub(crate) struct MemoryStores {
    requests: Mutex<HashMap<String, Request>>,
    steps: Mutex<Vec<WorkflowStep>>,
    traces: Mutex<Vec<TraceLogEntry>>,
    updates: Mutex<Vec<(String, RequestUpdate)>>,
    fail_appends: AtomicBool,
    fail_terminal_updates: AtomicBool,
}

impl MemoryStores {
    pub(crate) fn with_request(request: Request) -> Self {
        let stores = Self::default();
        stores
            .requests
            .lock()
            .unwrap()
            .insert(request.request_id.clone(), request);
        stores
    }

    pub(crate) fn request(&self, request_id: &str) -> Option<Request> {
        self.requests.lock().unwrap().get(request_id).cloned()
    }

    pub(crate) fn steps_for(&self, request_id: &str) -> Vec<WorkflowStep> {
        self.steps
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.request_id == request_id)
            .cloned()
            .collect()
    }

    pub(crate) fn traces_for(&self, request_id: &str) -> Vec<TraceLogEntry> {
        self.traces
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.request_id == request_id)
            .cloned()
            .collect()
    }

    /// Every applied or attempted update, in order.
    pub(crate) fn updates_for(&self, request_id: &str) -> Vec<RequestUpdate> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == request_id)
            .map(|(_, u)| u.clone())
            .collect()
    }

    pub(crate) fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Reject updates that set approved or denied.
    pub(crate) fn fail_terminal_updates(&self, fail: bool) {
        self.fail_terminal_updates.store(fail, Ordering::SeqCst);
    }

    fn check_append(&self) -> PreauthResult<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(PreauthError::Storage {
                reason: "append rejected".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RequestStore for MemoryStores {
    async fn get(&self, request_id: &str) -> PreauthResult<Option<Request>> {
        Ok(self.request(request_id))
    }

    async fn update(&self, request_id: &str, update: RequestUpdate) -> PreauthResult<()> {
        self.updates
            .lock()
            .unwrap()
            .push((request_id.to_string(), update.clone()));
        let terminal = matches!(
            update.status,
            Some(RequestStatus::Approved | RequestStatus::Denied)
        );
        if terminal && self.fail_terminal_updates.load(Ordering::SeqCst) {
            return Err(PreauthError::Storage {
                reason: "update rejected".into(),
            });
        }
        let mut requests = self.requests.lock().unwrap();
        let request = requests
            .get_mut(request_id)
            .ok_or_else(|| PreauthError::RequestNotFound {
                request_id: request_id.to_string(),
            })?;
        update.apply_to(request, Utc::now());
        Ok(())
    }
}

#[async_trait]
impl WorkflowStepStore for MemoryStores {
    async fn append(&self, step: WorkflowStep) -> PreauthResult<()> {
        self.check_append()?;
        self.steps.lock().unwrap().push(step);
        Ok(())
    }

    async fn delete_all(&self, request_id: &str) -> PreauthResult<()> {
        self.steps.lock().unwrap().retain(|s| s.request_id != request_id);
        Ok(())
    }

    async fn list(&self, request_id: &str) -> PreauthResult<Vec<WorkflowStep>> {
        Ok(self.steps_for(request_id))
    }
}

#[async_trait]
impl TraceLogStore for MemoryStores {
    async fn append(&self, entry: TraceLogEntry) -> PreauthResult<()> {
        self.check_append()?;
        self.traces.lock().unwrap().push(entry);
        Ok(())
    }

    async fn delete_all(&self, request_id: &str) -> PreauthResult<()> {
        self.traces.lock().unwrap().retain(|t| t.request_id != request_id);
        Ok(())
    }

    async fn list(&self, request_id: &str) -> PreauthResult<Vec<TraceLogEntry>> {
        Ok(self.traces_for(request_id))
    }
}

/// Canned tool results keyed by tool name.
///
/// The defaults describe an active member and a matcher that recommends
/// approval of NCD-150.4.
pub(crate) struct ScriptedTools {
    responses: Mutex<HashMap<String, Value>>,
    failing: Option<String>,
    gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTools {
    pub(crate) fn approving() -> Self {
        let responses = HashMap::from([
            (
                tool_names::DOCUMENT_PROCESSING.to_string(),
                json!({ "pageCount": 4, "overallConfidence": 0.94, "entities": [] }),
            ),
            (
                tool_names::CLINICAL_EXTRACTION.to_string(),
                json!({ "procedureCodes": [{ "code": "27447" }], "extractionConfidence": 0.95 }),
            ),
            (
                tool_names::MEMBER_ELIGIBILITY.to_string(),
                json!({ "found": true, "isActive": true, "issues": [],
                        "plan": { "planType": "Gold Plus HMO" } }),
            ),
            (
                tool_names::CLAIMS_HISTORY.to_string(),
                json!({ "totalClaims": 3, "relatedProcedures": [] }),
            ),
            (
                tool_names::POLICY_SEARCH.to_string(),
                json!({ "totalMatches": 1,
                        "policies": [{ "policyId": "NCD-150.4", "title": "Knee Arthroplasty",
                                       "relevanceScore": 95 }] }),
            ),
            (
                tool_names::CRITERIA_MATCHING.to_string(),
                json!({ "policyId": "NCD-150.4", "decision": "approve", "confidence": 0.88,
                        "rationale": "criteria met",
                        "metCriteria": ["Member eligibility verified", "Imaging confirms OA"],
                        "unmetCriteria": [],
                        "flags": [],
                        "scoring": { "totalCriteria": 5, "criteriaMet": 5,
                                     "criteriaUnmet": 0, "matchPercentage": 100.0 } }),
            ),
        ]);
        Self {
            responses: Mutex::new(responses),
            failing: None,
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_response(self, tool: &str, value: Value) -> Self {
        self.responses.lock().unwrap().insert(tool.to_string(), value);
        self
    }

    pub(crate) fn failing_on(mut self, tool: &str) -> Self {
        self.failing = Some(tool.to_string());
        self
    }

    /// Hold the first tool call until `gate` is notified.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolInvoker for ScriptedTools {
    async fn call_tool(&self, name: &str, _params: Value) -> PreauthResult<Value> {
        self.calls.lock().unwrap().push(name.to_string());
        if name == tool_names::DOCUMENT_PROCESSING {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
        if self.failing.as_deref() == Some(name) {
            return Err(PreauthError::ToolExecution {
                tool: name.to_string(),
                reason: "upstream unavailable".into(),
            });
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| json!({})))
    }
}
