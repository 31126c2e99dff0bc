//! Tool metadata, call-log records, and registry statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Registry names of the six review tools.
pub mod tool_names {
    pub const DOCUMENT_PROCESSING: &str = "intelligent-document-processing";
    pub const CLINICAL_EXTRACTION: &str = "clinical-data-extraction";
    pub const MEMBER_ELIGIBILITY: &str = "member-eligibility-lookup";
    pub const CLAIMS_HISTORY: &str = "claims-history-retrieval";
    pub const POLICY_SEARCH: &str = "ncd-guidelines-search";
    pub const CRITERIA_MATCHING: &str = "policy-criteria-matching";

    /// All six, in pipeline order.
    pub const ALL: [&str; 6] = [
        DOCUMENT_PROCESSING,
        CLINICAL_EXTRACTION,
        MEMBER_ELIGIBILITY,
        CLAIMS_HISTORY,
        POLICY_SEARCH,
        CRITERIA_MATCHING,
    ];
}

/// Handler-free view of a registered tool, for discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema document; only `required` is enforced.
    pub input_schema: Value,
    /// Descriptive only, never enforced.
    pub output_schema: Value,
    pub registered_at: DateTime<Utc>,
}

/// One tool invocation, success or failure.
///
/// Entries are never modified; the registry evicts old entries in bulk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallLogEntry {
    pub call_id: Uuid,
    pub tool_name: String,
    /// Parameters with long string values truncated.
    pub params: Value,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates computed from the retained call log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub registered_tools: usize,
    pub total_calls: usize,
    /// Percentage of successful calls, or `None` when no calls are logged.
    pub success_rate: Option<f64>,
    pub calls_by_tool: BTreeMap<String, usize>,
}
