//! Planning: build the execution plan for Orchestration.
//!
//! The plan is fixed: all six tools, five phases, eligibility and claims in
//! parallel. It is metadata for Orchestration and progress display, not a
//! schedule Orchestration reads back.

use std::time::Instant;

use serde_json::json;

use preauth_contracts::{
    error::PreauthResult,
    progress::{StepDescriptor, TraceLevel},
    request::Request,
    stage::{ExecutionOrder, ExecutionPhase, PlanningOutput, SensingOutput},
    tool::tool_names,
};

use crate::progress::ProgressCallbacks;
use crate::random::RandomSource;
use crate::stages::with_failure_trace;

const CATEGORY: &str = "Planning Agent";
const AGENT: &str = "WorkflowPlanningAgent-v3";

pub const STRATEGY: &str = "sequential-with-parallel";

pub async fn run(
    sensing: &SensingOutput,
    request: &Request,
    rng: &dyn RandomSource,
    progress: &ProgressCallbacks,
) -> PreauthResult<PlanningOutput> {
    with_failure_trace(progress, CATEGORY, plan(sensing, request, rng, progress)).await
}

async fn plan(
    sensing: &SensingOutput,
    request: &Request,
    rng: &dyn RandomSource,
    progress: &ProgressCallbacks,
) -> PreauthResult<PlanningOutput> {
    let started = Instant::now();

    progress
        .on_trace(
            TraceLevel::Info,
            CATEGORY,
            "Planning Agent invoked by Sensing Agent",
            json!({
                "agent": AGENT,
                "input": request.request_id,
                "mode": "intelligent-planning",
                "complexity": sensing.complexity,
            }),
        )
        .await?;

    let tools = required_tools();
    let execution_order = build_execution_order();
    let estimated_duration_sec = estimate_duration(tools.len(), rng);

    progress
        .on_trace(
            TraceLevel::Success,
            CATEGORY,
            "Execution plan created successfully",
            json!({
                // Three agents surround the tool steps.
                "workflowSteps": tools.len() + 3,
                "toolsRequired": tools,
                "estimatedDuration": format!("{estimated_duration_sec} seconds"),
                "complexity": sensing.complexity,
                "executionStrategy": execution_order.strategy,
            }),
        )
        .await?;

    progress
        .on_step(
            StepDescriptor::completed(
                "Planning Agent",
                "Planning agent analyzes request complexity and creates execution plan",
            )
            .with_details([
                format!("Request complexity: {}", sensing.complexity.as_str()),
                format!("Workflow plan created with {} tools", tools.len()),
                format!("Required tools: {}", tools.join(", ")),
                "Orchestrator invoked with execution plan".to_string(),
            ]),
        )
        .await?;

    Ok(PlanningOutput {
        request_id: request.request_id.clone(),
        tools,
        execution_order,
        estimated_duration_sec,
        processing_time_ms: started.elapsed().as_millis() as u64,
    })
}

/// All six tools, in pipeline order.
pub fn required_tools() -> Vec<String> {
    tool_names::ALL.iter().map(|t| t.to_string()).collect()
}

pub fn build_execution_order() -> ExecutionOrder {
    let phase = |phase: u8, tools: &[&str], parallel: bool| ExecutionPhase {
        phase,
        tools: tools.iter().map(|t| t.to_string()).collect(),
        parallel,
    };

    ExecutionOrder {
        strategy: STRATEGY.to_string(),
        phases: vec![
            phase(1, &[tool_names::DOCUMENT_PROCESSING], false),
            phase(2, &[tool_names::CLINICAL_EXTRACTION], false),
            phase(
                3,
                &[tool_names::MEMBER_ELIGIBILITY, tool_names::CLAIMS_HISTORY],
                true,
            ),
            phase(4, &[tool_names::POLICY_SEARCH], false),
            phase(5, &[tool_names::CRITERIA_MATCHING], false),
        ],
    }
}

/// `round(tools * 3 + 10 + r * 10)` seconds.
pub fn estimate_duration(tool_count: usize, rng: &dyn RandomSource) -> u64 {
    (tool_count as f64 * 3.0 + 10.0 + rng.next_f64() * 10.0).round() as u64
}
