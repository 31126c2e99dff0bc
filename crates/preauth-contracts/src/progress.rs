//! Progress records emitted while a request moves through the pipeline.
//!
//! Two channels run side by side:
//!
//! - `WorkflowStep`: coarse, user-facing, one per stage or tool phase.
//! - `TraceLogEntry`: fine-grained, technical, several per tool call.
//!
//! Both are append-only per request and are wiped before a reprocess.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decision::Decision;
use crate::request::RequestStatus;

/// Status of a single workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

/// What a stage hands to `ProgressCallbacks::on_step`.
///
/// The processor turns this into a `WorkflowStep` by assigning the request
/// id, the next step number, and a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDescriptor {
    pub name: String,
    pub description: String,
    pub status: StepStatus,
    pub details: Vec<String>,
    pub tool_name: Option<String>,
    /// Left `None` when the stage has no measured duration to report.
    pub duration_ms: Option<u64>,
}

impl StepDescriptor {
    /// A completed step with no details yet.
    pub fn completed(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: StepStatus::Completed,
            details: Vec::new(),
            tool_name: None,
            duration_ms: None,
        }
    }

    pub fn with_status(mut self, status: StepStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_details<I, S>(mut self, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details = details.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// A persisted workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub request_id: String,
    /// 1-based, strictly increasing within one run of one request.
    pub step_number: u32,
    pub name: String,
    pub description: String,
    pub status: StepStatus,
    /// Wall-clock time in `hh:mm:ss AM` form, for display.
    pub timestamp: String,
    pub details: Vec<String>,
    pub tool_name: Option<String>,
    pub duration_ms: u64,
}

/// Severity of a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl TraceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceLevel::Info => "info",
            TraceLevel::Success => "success",
            TraceLevel::Warning => "warning",
            TraceLevel::Error => "error",
        }
    }
}

/// A persisted trace log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceLogEntry {
    pub request_id: String,
    /// Wall-clock time in `HH:MM:SS.mmm` form.
    pub timestamp: String,
    pub level: TraceLevel,
    /// Free-text component name, e.g. "Sensing Agent" or "Claims API".
    pub category: String,
    pub message: String,
    pub details: Value,
}

/// Lifecycle events pushed to a live subscriber.
///
/// Delivery is best-effort and never affects the outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PipelineEvent {
    Status {
        request_id: String,
        status: RequestStatus,
    },
    Step(WorkflowStep),
    Trace(TraceLogEntry),
    Complete {
        request_id: String,
        decision: Decision,
        status: RequestStatus,
        rationale: String,
        confidence: f64,
    },
    Error {
        request_id: String,
        error: String,
    },
}

impl PipelineEvent {
    /// The event type name: `status`, `step`, `trace`, `complete`, or `error`.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::Status { .. } => "status",
            PipelineEvent::Step(_) => "step",
            PipelineEvent::Trace(_) => "trace",
            PipelineEvent::Complete { .. } => "complete",
            PipelineEvent::Error { .. } => "error",
        }
    }
}
