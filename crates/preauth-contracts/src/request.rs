//! The prior authorization request record and its partial-update patch.
//!
//! A `Request` is created outside the pipeline. The processor owns it for
//! the duration of a run and writes status transitions back through
//! `RequestStore::update` using a `RequestUpdate`.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a request.
///
/// `Pending → Processing → {Approved | Denied | Review}`. A failed run also
/// lands in `Review`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    Pending,
    Processing,
    Approved,
    Denied,
    Review,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
            RequestStatus::Review => "review",
        }
    }

    /// True for the three statuses a completed run can leave behind.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Approved | RequestStatus::Denied | RequestStatus::Review
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prior authorization request as stored between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Stable unique identifier, e.g. `PA-2026-0409`.
    pub request_id: String,
    pub patient_name: String,
    pub patient_dob: Option<NaiveDate>,
    pub member_id: String,
    pub provider: String,
    pub provider_npi: Option<String>,
    /// Raw code as submitted; may carry a `CPT-` or `HCPCS-` prefix.
    pub procedure_code: String,
    pub procedure_name: String,
    pub diagnosis_codes: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub priority: Priority,
    pub assigned_to: Option<String>,
    /// Reference to the submitted clinical document, if any.
    pub document_url: Option<String>,
    pub decision_rationale: Option<String>,
    pub decision_date: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Request {
    /// The procedure code with any `CPT-` / `HCPCS-` prefix removed.
    pub fn clean_procedure_code(&self) -> String {
        clean_procedure_code(&self.procedure_code)
    }
}

/// Strip the coding-system prefix from a procedure code.
///
/// `"CPT-27447"` → `"27447"`, `"HCPCS-E0601"` → `"E0601"`.
pub fn clean_procedure_code(code: &str) -> String {
    code.replace("CPT-", "").replace("HCPCS-", "")
}

/// A partial-field patch applied by `RequestStore::update`.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestUpdate {
    pub status: Option<RequestStatus>,
    pub priority: Option<Priority>,
    pub decision_rationale: Option<String>,
    pub decision_date: Option<DateTime<Utc>>,
}

impl RequestUpdate {
    /// A patch that only changes the status.
    pub fn status(status: RequestStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.decision_rationale = Some(rationale.into());
        self
    }

    pub fn with_decision_date(mut self, at: DateTime<Utc>) -> Self {
        self.decision_date = Some(at);
        self
    }

    /// Apply every `Some` field to `request` and stamp `updated_at`.
    pub fn apply_to(&self, request: &mut Request, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            request.status = status;
        }
        if let Some(priority) = self.priority {
            request.priority = priority;
        }
        if let Some(rationale) = &self.decision_rationale {
            request.decision_rationale = Some(rationale.clone());
        }
        if let Some(at) = self.decision_date {
            request.decision_date = Some(at);
        }
        request.updated_at = Some(now);
    }
}
