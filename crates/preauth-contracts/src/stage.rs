//! Typed outputs of the four pipeline stages.
//!
//! Each stage owns and returns its output; the next stage receives it by
//! reference and never mutates it.

use serde::{Deserialize, Serialize};

use crate::decision::{Decision, Scoring};
use crate::outputs::ToolOutputs;
use crate::request::{Priority, RequestStatus};

/// Shape of the submitted clinical document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    ClinicalPdf,
    ScannedImage,
    ElectronicSubmission,
    Unknown,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::ClinicalPdf => "clinical-pdf",
            DocumentKind::ScannedImage => "scanned-image",
            DocumentKind::ElectronicSubmission => "electronic-submission",
            DocumentKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensingOutput {
    pub request_id: String,
    pub priority: Priority,
    pub document_type: DocumentKind,
    pub complexity: Complexity,
    pub document_url: Option<String>,
    pub processing_time_ms: u64,
}

/// One phase of the descriptive execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPhase {
    pub phase: u8,
    pub tools: Vec<String>,
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOrder {
    pub strategy: String,
    pub phases: Vec<ExecutionPhase>,
}

/// The plan handed to Orchestration.
///
/// Metadata for Orchestration and progress display; not an enforced
/// schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningOutput {
    pub request_id: String,
    pub tools: Vec<String>,
    pub execution_order: ExecutionOrder,
    pub estimated_duration_sec: u64,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationOutput {
    pub request_id: String,
    pub tool_outputs: ToolOutputs,
    pub processing_time_ms: u64,
}

/// The final result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutput {
    pub request_id: String,
    pub decision: Decision,
    pub status: RequestStatus,
    pub confidence: f64,
    pub rationale: String,
    pub scoring: Scoring,
    pub met_criteria: Vec<String>,
    pub unmet_criteria: Vec<String>,
    pub flags: Vec<String>,
    pub processing_time_ms: u64,
}
