//! Decision: make the final determination and write it back.
//!
//! Starts from the criteria matcher's recommendation. An inactive member
//! overrides it with a denial. The terminal write is best-effort: a failed
//! write is logged and the decision is still returned.

use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::error;

use preauth_contracts::{
    decision::{flags, Decision},
    error::PreauthResult,
    outputs::{CriteriaMatchResult, EligibilityResult, ToolOutputs},
    progress::{StepDescriptor, TraceLevel},
    request::{Request, RequestUpdate},
    stage::{DecisionOutput, OrchestrationOutput},
};

use crate::progress::ProgressCallbacks;
use crate::stages::with_failure_trace;
use crate::traits::RequestStore;

const CATEGORY: &str = "Decision Agent";
const AGENT: &str = "DecisionAgent-v2";

/// Confidence attached to a denial forced by inactive eligibility.
pub const INACTIVE_MEMBER_CONFIDENCE: f64 = 0.95;

pub async fn run(
    orchestration: &OrchestrationOutput,
    request: &Request,
    requests: &dyn RequestStore,
    progress: &ProgressCallbacks,
) -> PreauthResult<DecisionOutput> {
    with_failure_trace(
        progress,
        CATEGORY,
        determine(orchestration, request, requests, progress),
    )
    .await
}

async fn determine(
    orchestration: &OrchestrationOutput,
    request: &Request,
    requests: &dyn RequestStore,
    progress: &ProgressCallbacks,
) -> PreauthResult<DecisionOutput> {
    let started = Instant::now();
    let outputs = &orchestration.tool_outputs;
    let matching = &outputs.matching;

    progress
        .on_trace(
            TraceLevel::Info,
            CATEGORY,
            "Decision Agent reviewing tool outputs",
            json!({
                "agent": AGENT,
                "recommendation": matching.decision,
                "memberActive": outputs.member.is_active,
            }),
        )
        .await?;

    let (decision, confidence) = final_decision(outputs);
    let rationale = build_rationale(decision, matching, &outputs.member);
    let status = decision.status();

    let update = RequestUpdate::status(status)
        .with_rationale(rationale.clone())
        .with_decision_date(Utc::now());
    if let Err(err) = requests.update(&request.request_id, update).await {
        error!(
            request_id = %request.request_id,
            error = %err,
            "failed to record final decision"
        );
    }

    progress
        .on_trace(
            if decision == Decision::Approve {
                TraceLevel::Success
            } else {
                TraceLevel::Warning
            },
            CATEGORY,
            format!("Final decision: {}", decision.as_str().to_uppercase()),
            json!({
                "agent": AGENT,
                "decision": decision,
                "confidence": confidence,
                "criteriaMetPct": matching.scoring.match_percentage,
                "flags": matching.flags,
            }),
        )
        .await?;

    progress
        .on_step(
            StepDescriptor::completed(
                "Decision Agent",
                "Decision agent reviews tool outputs and records the final determination",
            )
            .with_details([
                format!("Final decision: {}", decision.as_str().to_uppercase()),
                format!("Confidence: {confidence}"),
                format!("Request status set to {status}"),
            ]),
        )
        .await?;

    Ok(DecisionOutput {
        request_id: request.request_id.clone(),
        decision,
        status,
        confidence,
        rationale,
        scoring: matching.scoring.clone(),
        met_criteria: matching.met_criteria.clone(),
        unmet_criteria: matching.unmet_criteria.clone(),
        flags: matching.flags.clone(),
        processing_time_ms: started.elapsed().as_millis() as u64,
    })
}

/// The matcher's recommendation, unless the member is inactive.
///
/// Inactive eligibility is checked first and wins over every other signal.
pub fn final_decision(outputs: &ToolOutputs) -> (Decision, f64) {
    if !outputs.member.is_active {
        return (Decision::Deny, INACTIVE_MEMBER_CONFIDENCE);
    }
    (outputs.matching.decision, outputs.matching.confidence)
}

/// Human-readable rationale for `decision`.
pub fn build_rationale(
    decision: Decision,
    matching: &CriteriaMatchResult,
    member: &EligibilityResult,
) -> String {
    let scoring = &matching.scoring;
    let mut parts = Vec::new();

    match decision {
        Decision::Approve => {
            parts.push(format!(
                "Approved: {}/{} criteria met ({}%).",
                scoring.criteria_met, scoring.total_criteria, scoring.match_percentage
            ));
            if !matching.met_criteria.is_empty() {
                parts.push(format!(
                    "Key criteria satisfied: {}.",
                    first_three(&matching.met_criteria)
                ));
            }
            parts.push(format!("Policy {} requirements fulfilled.", matching.policy_id));
        }
        Decision::Deny => {
            parts.push(format!("Denied: {} criteria not met.", scoring.criteria_unmet));
            if !member.is_active {
                parts.push("Member eligibility is inactive or has coverage issues.".to_string());
            }
            if !matching.unmet_criteria.is_empty() {
                parts.push(format!(
                    "Unmet requirements: {}.",
                    first_three(&matching.unmet_criteria)
                ));
            }
            if matching.has_flag(flags::DENIAL_CONDITION_MET) {
                parts.push("Denial condition triggered per policy guidelines.".to_string());
            }
            parts.push(format!("Evaluated against policy {}.", matching.policy_id));
        }
        Decision::Review => {
            parts.push(format!(
                "Review required: {}/{} criteria met.",
                scoring.criteria_met, scoring.total_criteria
            ));
            if matching.has_flag(flags::REVIEW_TRIGGER_MET) {
                parts.push("Review trigger conditions detected.".to_string());
            }
            parts.push(format!("Evaluated against policy {}.", matching.policy_id));
            parts.push("Peer-to-peer review or additional documentation recommended.".to_string());
        }
    }

    if let Some(plan) = &member.plan {
        parts.push(format!("Member plan: {}.", plan.plan_type));
    }

    parts.join(" ")
}

fn first_three(items: &[String]) -> String {
    items.iter().take(3).cloned().collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedRandom;
    use crate::testing::{sample_request, MemoryStores};
    use crate::NoopUpdates;
    use preauth_contracts::decision::Scoring;
    use preauth_contracts::outputs::PlanDetails;
    use preauth_contracts::request::RequestStatus;
    use std::sync::Arc;

    fn outputs(decision: Decision, confidence: f64, active: bool) -> ToolOutputs {
        let mut outputs = ToolOutputs::default();
        outputs.member.is_active = active;
        outputs.member.plan = Some(PlanDetails {
            plan_type: "Gold Plus HMO".into(),
            ..PlanDetails::default()
        });
        outputs.matching = CriteriaMatchResult {
            policy_id: "NCD-150.4".into(),
            decision,
            confidence,
            met_criteria: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            unmet_criteria: vec!["E".into()],
            scoring: Scoring {
                total_criteria: 5,
                criteria_met: 4,
                criteria_unmet: 1,
                match_percentage: 80.0,
            },
            ..CriteriaMatchResult::default()
        };
        outputs
    }

    fn orchestration(outputs: ToolOutputs) -> OrchestrationOutput {
        OrchestrationOutput {
            request_id: "PA-1".into(),
            tool_outputs: outputs,
            processing_time_ms: 0,
        }
    }

    #[test]
    fn inactive_member_overrides_approval() {
        let (decision, confidence) = final_decision(&outputs(Decision::Approve, 0.95, false));
        assert_eq!(decision, Decision::Deny);
        assert_eq!(confidence, 0.95);
    }

    #[test]
    fn active_member_keeps_recommendation() {
        let (decision, confidence) = final_decision(&outputs(Decision::Review, 0.65, true));
        assert_eq!(decision, Decision::Review);
        assert_eq!(confidence, 0.65);
    }

    #[test]
    fn approve_rationale_names_policy_and_first_three_criteria() {
        let out = outputs(Decision::Approve, 0.88, true);
        let text = build_rationale(Decision::Approve, &out.matching, &out.member);
        assert_eq!(
            text,
            "Approved: 4/5 criteria met (80%). Key criteria satisfied: A; B; C. \
             Policy NCD-150.4 requirements fulfilled. Member plan: Gold Plus HMO."
        );
    }

    #[test]
    fn deny_rationale_mentions_inactive_member_and_denial_flag() {
        let mut out = outputs(Decision::Deny, 0.8, false);
        out.matching.flags = vec![flags::DENIAL_CONDITION_MET.into()];
        let text = build_rationale(Decision::Deny, &out.matching, &out.member);
        assert!(text.starts_with("Denied: 1 criteria not met."));
        assert!(text.contains("Member eligibility is inactive"));
        assert!(text.contains("Unmet requirements: E."));
        assert!(text.contains("Denial condition triggered per policy guidelines."));
        assert!(text.contains("Evaluated against policy NCD-150.4."));
    }

    #[test]
    fn review_rationale_without_plan() {
        let mut out = outputs(Decision::Review, 0.65, true);
        out.member.plan = None;
        out.matching.flags = vec![flags::REVIEW_TRIGGER_MET.into()];
        let text = build_rationale(Decision::Review, &out.matching, &out.member);
        assert_eq!(
            text,
            "Review required: 4/5 criteria met. Review trigger conditions detected. \
             Evaluated against policy NCD-150.4. \
             Peer-to-peer review or additional documentation recommended."
        );
    }

    #[tokio::test]
    async fn run_writes_terminal_status() {
        let stores = Arc::new(MemoryStores::with_request(sample_request("PA-1")));
        let progress = ProgressCallbacks::new(
            "PA-1",
            stores.clone(),
            stores.clone(),
            Arc::new(NoopUpdates),
            Arc::new(FixedRandom(0.5)),
        );
        let request = sample_request("PA-1");

        let out = run(
            &orchestration(outputs(Decision::Approve, 0.88, true)),
            &request,
            stores.as_ref(),
            &progress,
        )
        .await
        .unwrap();

        assert_eq!(out.status, RequestStatus::Approved);
        let stored = stores.request("PA-1").unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.decision_rationale.as_deref(), Some(out.rationale.as_str()));
        assert!(stored.decision_date.is_some());
    }

    #[tokio::test]
    async fn failed_terminal_write_still_returns_decision() {
        let stores = Arc::new(MemoryStores::with_request(sample_request("PA-1")));
        stores.fail_terminal_updates(true);
        let progress = ProgressCallbacks::new(
            "PA-1",
            stores.clone(),
            stores.clone(),
            Arc::new(NoopUpdates),
            Arc::new(FixedRandom(0.5)),
        );

        let out = run(
            &orchestration(outputs(Decision::Deny, 0.85, true)),
            &sample_request("PA-1"),
            stores.as_ref(),
            &progress,
        )
        .await
        .unwrap();

        assert_eq!(out.decision, Decision::Deny);
        assert_eq!(stores.request("PA-1").unwrap().status, RequestStatus::Pending);
        let last = stores.traces_for("PA-1").pop().unwrap();
        assert_eq!(last.message, "Final decision: DENY");
    }
}
