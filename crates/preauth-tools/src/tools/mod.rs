//! The six prior authorization review tools.
//!
//! Every tool follows the same shape: decode the JSON parameters into a typed
//! input, sleep for its simulated backend latency, compute a typed output
//! from `preauth_contracts::outputs`, and encode it back to JSON. No tool
//! calls another tool.

pub mod claims_history;
pub mod clinical_extraction;
pub mod criteria_matching;
pub mod document_processing;
pub mod member_eligibility;
pub mod policy_search;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use preauth_config::LatencyRange;
use preauth_contracts::error::{PreauthError, PreauthResult};
use preauth_core::RandomSource;

pub use claims_history::ClaimsHistoryTool;
pub use clinical_extraction::ClinicalExtractionTool;
pub use criteria_matching::CriteriaMatchingTool;
pub use document_processing::DocumentProcessingTool;
pub use member_eligibility::MemberEligibilityTool;
pub use policy_search::PolicySearchTool;

/// Decode tool parameters. A shape mismatch is a `ToolExecution` failure.
pub(crate) fn parse_params<T: DeserializeOwned>(tool: &str, params: Value) -> PreauthResult<T> {
    serde_json::from_value(params).map_err(|e| PreauthError::ToolExecution {
        tool: tool.to_string(),
        reason: format!("invalid parameters: {e}"),
    })
}

pub(crate) fn encode_output<T: Serialize>(tool: &str, output: &T) -> PreauthResult<Value> {
    serde_json::to_value(output).map_err(|e| PreauthError::ToolExecution {
        tool: tool.to_string(),
        reason: format!("failed to encode result: {e}"),
    })
}

pub(crate) async fn simulate_latency(latency: LatencyRange, rng: &dyn RandomSource) {
    if latency.is_zero() {
        return;
    }
    tokio::time::sleep(latency.sample(rng)).await;
}

/// `base + r * spread`, rounded to three decimals.
pub(crate) fn jittered_confidence(rng: &dyn RandomSource, base: f64, spread: f64) -> f64 {
    round_to(base + rng.next_f64() * spread, 3)
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
