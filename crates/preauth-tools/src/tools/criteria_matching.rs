//! `policy-criteria-matching`: evaluate evidence against one coverage policy.
//!
//! Evaluation and decision are separate. `evaluate` turns the policy and
//! the evidence into weighted criterion results plus flags. `derive_decision`
//! is a pure function from that evaluation to a decision, a confidence, and a
//! rationale, applied in this priority order:
//!
//! 1. unmet critical criterion: deny, 0.85
//! 2. denial condition triggered: deny, 0.80
//! 3. auto-approval allowed and no unmet high criterion: approve, 0.95
//! 4. review trigger or any unmet high criterion: review, 0.65
//! 5. at least 80% of criteria met: approve, 0.88
//! 6. at least 50% met: review, 0.60
//! 7. otherwise: deny, 0.75
//!
//! Criterion evaluation is a heuristic. Keyword matches against the evidence
//! decide first; otherwise a draw from the injected random source, biased by
//! the request's prior status, decides.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use preauth_config::{CoverageCatalog, CoveragePolicy, LatencyRange};
use preauth_contracts::{
    decision::{flags, CriterionResult, CriterionWeight, Decision, Scoring},
    error::PreauthResult,
    outputs::CriteriaMatchResult,
    request::RequestStatus,
    tool::tool_names,
};
use preauth_core::{traits::Tool, RandomSource};

use super::{encode_output, parse_params, simulate_latency};

const MATCH_ENGINE: &str = "PolicyMatcher-v3.0";

const ELIGIBILITY_CRITERION: &str = "Member eligibility active";
const CONSERVATIVE_CRITERION: &str = "Conservative treatment documented";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Input {
    policy_id: String,
    clinical_evidence: Value,
    #[serde(default)]
    member_info: MemberInfo,
    #[serde(default)]
    claims_history: ClaimsInfo,
    #[serde(default)]
    request_context: MatchContext,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MemberInfo {
    /// Absent means eligibility was not checked, which does not count against
    /// the request.
    is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ClaimsInfo {
    related_procedures: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MatchContext {
    procedure_code: Option<String>,
    diagnosis_codes: Vec<String>,
    status: Option<RequestStatus>,
}

/// Criterion results and flags for one policy, before a decision is drawn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub results: Vec<CriterionResult>,
    pub met: Vec<String>,
    pub unmet: Vec<String>,
    pub flags: Vec<String>,
}

impl Evaluation {
    fn record(&mut self, result: CriterionResult, unmet_label: Option<&str>) {
        if result.met {
            self.met.push(result.criterion.clone());
        } else {
            self.unmet
                .push(unmet_label.unwrap_or(&result.criterion).to_string());
        }
        self.results.push(result);
    }

    fn flag(&mut self, flag: &str) {
        if !self.has_flag(flag) {
            self.flags.push(flag.to_string());
        }
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    fn unmet_with(&self, weight: CriterionWeight) -> Vec<&CriterionResult> {
        self.results
            .iter()
            .filter(|r| !r.met && r.weight == weight)
            .collect()
    }
}

pub struct CriteriaMatchingTool {
    catalog: Arc<CoverageCatalog>,
    latency: LatencyRange,
    rng: Arc<dyn RandomSource>,
}

impl CriteriaMatchingTool {
    pub fn new(
        catalog: Arc<CoverageCatalog>,
        latency: LatencyRange,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            catalog,
            latency,
            rng,
        }
    }

    fn evaluate(&self, policy: &CoveragePolicy, input: &Input) -> Evaluation {
        evaluate(policy, input, self.rng.as_ref())
    }
}

#[async_trait]
impl Tool for CriteriaMatchingTool {
    fn name(&self) -> &str {
        tool_names::CRITERIA_MATCHING
    }

    fn description(&self) -> &str {
        "Evaluates clinical evidence against a coverage policy's medical necessity, \
         documentation, and conservative treatment requirements and recommends \
         approve, deny, or review with a confidence score and rationale."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "policyId": { "type": "string" },
                "clinicalEvidence": { "type": "object", "description": "Document and clinical extraction output" },
                "memberInfo": { "type": "object" },
                "claimsHistory": { "type": "object" },
                "requestContext": { "type": "object" },
            },
            "required": ["policyId", "clinicalEvidence"],
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "decision": { "type": "string", "enum": ["approve", "deny", "review"] },
                "confidence": { "type": "number" },
                "criteriaResults": { "type": "array" },
                "metCriteria": { "type": "array" },
                "unmetCriteria": { "type": "array" },
                "rationale": { "type": "string" },
                "flags": { "type": "array" },
            },
        })
    }

    async fn execute(&self, params: Value) -> PreauthResult<Value> {
        let input: Input = parse_params(self.name(), params)?;
        simulate_latency(self.latency, self.rng.as_ref()).await;

        let Some(policy) = self.catalog.get(&input.policy_id) else {
            debug!(policy_id = %input.policy_id, "policy not in catalog");
            return encode_output(self.name(), &policy_not_found(&input.policy_id));
        };

        let evaluation = self.evaluate(policy, &input);
        let (decision, confidence, rationale) = derive_decision(&policy.policy_id, &evaluation);
        debug!(
            policy_id = %policy.policy_id,
            decision = %decision,
            met = evaluation.met.len(),
            unmet = evaluation.unmet.len(),
            "criteria evaluated"
        );

        let output = CriteriaMatchResult {
            policy_id: policy.policy_id.clone(),
            policy_title: Some(policy.title.clone()),
            policy_type: Some(policy.policy_type.clone()),
            decision,
            confidence,
            rationale,
            scoring: Scoring::from_results(&evaluation.results),
            criteria_results: evaluation.results,
            met_criteria: evaluation.met,
            unmet_criteria: evaluation.unmet,
            flags: evaluation.flags,
            error: None,
            match_engine: MATCH_ENGINE.to_string(),
        };
        encode_output(self.name(), &output)
    }
}

fn policy_not_found(policy_id: &str) -> CriteriaMatchResult {
    CriteriaMatchResult {
        policy_id: policy_id.to_string(),
        decision: Decision::Review,
        confidence: 0.3,
        rationale: "Unable to find matching coverage policy. Manual review required.".to_string(),
        unmet_criteria: vec!["Policy not found".to_string()],
        flags: vec![flags::POLICY_NOT_FOUND.to_string()],
        error: Some(format!("Policy {policy_id} not found")),
        match_engine: MATCH_ENGINE.to_string(),
        ..CriteriaMatchResult::default()
    }
}

fn evaluate(policy: &CoveragePolicy, input: &Input, rng: &dyn RandomSource) -> Evaluation {
    let evidence = &input.clinical_evidence;
    let ctx = &input.request_context;
    let mut eval = Evaluation::default();

    let eligible = input.member_info.is_active != Some(false);
    eval.record(
        CriterionResult {
            criterion: ELIGIBILITY_CRITERION.to_string(),
            met: eligible,
            weight: CriterionWeight::Critical,
            detail: if eligible {
                "Member has active coverage"
            } else {
                "Member eligibility issue detected"
            }
            .to_string(),
        },
        Some("Member eligibility not confirmed"),
    );

    for criterion in &policy.medical_necessity_criteria {
        let met = evaluate_criterion(criterion, evidence, ctx, rng);
        eval.record(
            CriterionResult {
                criterion: criterion.clone(),
                met,
                weight: CriterionWeight::High,
                detail: if met {
                    "Criterion satisfied by clinical evidence"
                } else {
                    "Insufficient evidence for criterion"
                }
                .to_string(),
            },
            None,
        );
    }

    let has_documents = present(evidence, "documentData") || present(evidence, "rawText");
    for doc in &policy.required_documentation {
        eval.record(
            CriterionResult {
                criterion: format!("Documentation: {doc}"),
                met: has_documents,
                weight: CriterionWeight::Medium,
                detail: if has_documents {
                    "Document provided"
                } else {
                    "Document not found in submission"
                }
                .to_string(),
            },
            None,
        );
    }

    if policy.conservative_treatment_required {
        let documented = !input.claims_history.related_procedures.is_empty()
            || evidence
                .pointer("/clinicalFindings/conservativeTreatment/documented")
                .and_then(Value::as_bool)
                .unwrap_or(false);
        let detail = if documented {
            format!(
                "Conservative treatment documented ({})",
                policy.conservative_min_duration().unwrap_or("duration documented")
            )
        } else {
            "Conservative treatment documentation missing or incomplete".to_string()
        };
        eval.record(
            CriterionResult {
                criterion: CONSERVATIVE_CRITERION.to_string(),
                met: documented,
                weight: CriterionWeight::High,
                detail,
            },
            Some("Conservative treatment documentation required"),
        );
    }

    if policy.auto_approve {
        eval.flag(flags::AUTO_APPROVE_ELIGIBLE);
    }

    for condition in &policy.denial_conditions {
        if denial_condition_met(condition, ctx, rng) {
            eval.flag(flags::DENIAL_CONDITION_MET);
            eval.unmet.push(format!("Denial trigger: {condition}"));
        }
    }

    let review_triggered = policy
        .review_triggers
        .iter()
        .any(|_| ctx.status == Some(RequestStatus::Review) && rng.next_f64() > 0.4);
    if review_triggered {
        eval.flag(flags::REVIEW_TRIGGER_MET);
    }

    eval
}

/// A JSON key that is present and not `null`.
fn present(evidence: &Value, key: &str) -> bool {
    evidence.get(key).is_some_and(|v| !v.is_null())
}

fn evaluate_criterion(
    criterion: &str,
    evidence: &Value,
    ctx: &MatchContext,
    rng: &dyn RandomSource,
) -> bool {
    let text = criterion.to_lowercase();
    if text.contains("documented") && present(evidence, "documentData") {
        return true;
    }
    if text.contains("symptom") && present(evidence, "clinicalFindings") {
        return true;
    }
    if text.contains("confirm") && present(evidence, "patient") {
        return true;
    }
    if text.contains("screening") && ctx.diagnosis_codes.iter().any(|c| c.starts_with('Z')) {
        return true;
    }

    match ctx.status {
        Some(RequestStatus::Approved) => true,
        Some(RequestStatus::Denied) => rng.next_f64() > 0.6,
        Some(RequestStatus::Review) => rng.next_f64() > 0.3,
        _ => rng.next_f64() > 0.25,
    }
}

/// Only requests previously denied can trip a denial condition.
fn denial_condition_met(condition: &str, ctx: &MatchContext, rng: &dyn RandomSource) -> bool {
    if ctx.status != Some(RequestStatus::Denied) {
        return false;
    }
    let text = condition.to_lowercase();
    let cpap = ctx
        .procedure_code
        .as_deref()
        .is_some_and(|code| code.contains("E0601"));
    if text.contains("no") && text.contains("sleep study") && cpap {
        return true;
    }
    if text.contains("not provided") || text.contains("insufficient") {
        return rng.next_f64() > 0.5;
    }
    false
}

/// Decision, confidence, and rationale for an evaluation of `policy_id`.
pub fn derive_decision(policy_id: &str, eval: &Evaluation) -> (Decision, f64, String) {
    let critical_unmet = eval.unmet_with(CriterionWeight::Critical);
    let high_unmet = eval.unmet_with(CriterionWeight::High);
    let scoring = Scoring::from_results(&eval.results);
    let (met, total) = (scoring.criteria_met, scoring.total_criteria);
    let fraction = scoring.met_fraction();

    if !critical_unmet.is_empty() {
        let names: Vec<&str> = critical_unmet.iter().map(|r| r.criterion.as_str()).collect();
        return (
            Decision::Deny,
            0.85,
            format!("Denied: Critical criteria not met - {}", names.join(", ")),
        );
    }

    if eval.has_flag(flags::DENIAL_CONDITION_MET) {
        let triggers: Vec<&str> = eval
            .unmet
            .iter()
            .filter(|u| u.starts_with("Denial trigger"))
            .map(String::as_str)
            .collect();
        return (
            Decision::Deny,
            0.80,
            format!(
                "Denied: Denial condition triggered per policy {policy_id}. {}",
                triggers.join(". ")
            ),
        );
    }

    if eval.has_flag(flags::AUTO_APPROVE_ELIGIBLE) && high_unmet.is_empty() {
        let highlights: Vec<&str> = eval.met.iter().take(3).map(String::as_str).collect();
        return (
            Decision::Approve,
            0.95,
            format!(
                "Auto-approved: All criteria met per policy {policy_id}. {}.",
                highlights.join(", ")
            ),
        );
    }

    let review_triggered = eval.has_flag(flags::REVIEW_TRIGGER_MET);
    if review_triggered || !high_unmet.is_empty() {
        let mut rationale = format!(
            "Review required: {} criteria need verification.",
            high_unmet.len()
        );
        if review_triggered {
            rationale.push_str(" Review trigger conditions detected.");
        }
        let pending: Vec<&str> = eval.unmet.iter().take(2).map(String::as_str).collect();
        if !pending.is_empty() {
            rationale.push_str(&format!(" {}.", pending.join(", ")));
        }
        return (Decision::Review, 0.65, rationale);
    }

    if fraction >= 0.8 {
        (
            Decision::Approve,
            0.88,
            format!(
                "Approved: {met}/{total} criteria met ({:.0}%). Medical necessity established per {policy_id}.",
                fraction * 100.0
            ),
        )
    } else if fraction >= 0.5 {
        (
            Decision::Review,
            0.60,
            format!(
                "Review recommended: {met}/{total} criteria met per {policy_id}. Additional documentation may be needed."
            ),
        )
    } else {
        (
            Decision::Deny,
            0.75,
            format!(
                "Denied: Only {met}/{total} criteria met. Insufficient clinical evidence for medical necessity per {policy_id}."
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preauth_core::FixedRandom;

    fn tool(r: f64) -> CriteriaMatchingTool {
        CriteriaMatchingTool::new(
            Arc::new(CoverageCatalog::bundled().unwrap()),
            LatencyRange::ZERO,
            Arc::new(FixedRandom(r)),
        )
    }

    async fn run(r: f64, params: Value) -> CriteriaMatchResult {
        serde_json::from_value(tool(r).execute(params).await.unwrap()).unwrap()
    }

    fn result(criterion: &str, met: bool, weight: CriterionWeight) -> CriterionResult {
        CriterionResult {
            criterion: criterion.to_string(),
            met,
            weight,
            detail: String::new(),
        }
    }

    /// `met` medium criteria satisfied out of `total`, no flags.
    fn medium_fraction(met: usize, total: usize) -> Evaluation {
        let mut eval = Evaluation::default();
        for i in 0..total {
            eval.record(result(&format!("Criterion {i}"), i < met, CriterionWeight::Medium), None);
        }
        eval
    }

    // ── Decision derivation ──────────────────────────────────────────────────

    #[test]
    fn unmet_critical_criterion_denies() {
        let mut eval = medium_fraction(3, 3);
        eval.record(result(ELIGIBILITY_CRITERION, false, CriterionWeight::Critical), None);
        eval.flag(flags::AUTO_APPROVE_ELIGIBLE);
        let (decision, confidence, rationale) = derive_decision("LCD-032", &eval);
        assert_eq!(decision, Decision::Deny);
        assert_eq!(confidence, 0.85);
        assert!(rationale.starts_with("Denied: Critical criteria not met"));
        assert!(rationale.contains(ELIGIBILITY_CRITERION));
    }

    #[test]
    fn denial_condition_denies() {
        let mut eval = medium_fraction(4, 4);
        eval.flag(flags::AUTO_APPROVE_ELIGIBLE);
        eval.flag(flags::DENIAL_CONDITION_MET);
        eval.unmet.push("Denial trigger: No sleep study on file".to_string());
        let (decision, confidence, rationale) = derive_decision("LCD-090", &eval);
        assert_eq!(decision, Decision::Deny);
        assert_eq!(confidence, 0.80);
        assert!(rationale.contains("per policy LCD-090"));
        assert!(rationale.contains("Denial trigger: No sleep study on file"));
    }

    #[test]
    fn auto_approval_tolerates_medium_gaps() {
        let mut eval = medium_fraction(1, 4);
        eval.flag(flags::AUTO_APPROVE_ELIGIBLE);
        let (decision, confidence, rationale) = derive_decision("NCD-220.1", &eval);
        assert_eq!(decision, Decision::Approve);
        assert_eq!(confidence, 0.95);
        assert!(rationale.starts_with("Auto-approved"));
        assert!(rationale.contains("NCD-220.1"));
    }

    #[test]
    fn unmet_high_criterion_requires_review() {
        let mut eval = medium_fraction(9, 9);
        eval.record(result("Failure of conservative therapy", false, CriterionWeight::High), None);
        eval.flag(flags::AUTO_APPROVE_ELIGIBLE);
        let (decision, confidence, rationale) = derive_decision("LCD-034", &eval);
        assert_eq!(decision, Decision::Review);
        assert_eq!(confidence, 0.65);
        assert!(rationale.starts_with("Review required: 1 criteria need verification."));
        assert!(rationale.contains("Failure of conservative therapy"));
        assert!(!rationale.contains("Review trigger"));
    }

    #[test]
    fn review_trigger_requires_review() {
        let mut eval = medium_fraction(5, 5);
        eval.flag(flags::REVIEW_TRIGGER_MET);
        let (decision, confidence, rationale) = derive_decision("LCD-078", &eval);
        assert_eq!(decision, Decision::Review);
        assert_eq!(confidence, 0.65);
        assert_eq!(
            rationale,
            "Review required: 0 criteria need verification. Review trigger conditions detected."
        );
    }

    #[test]
    fn eighty_percent_approves() {
        let (decision, confidence, rationale) = derive_decision("NCD-150.4", &medium_fraction(4, 5));
        assert_eq!(decision, Decision::Approve);
        assert_eq!(confidence, 0.88);
        assert_eq!(
            rationale,
            "Approved: 4/5 criteria met (80%). Medical necessity established per NCD-150.4."
        );
    }

    #[test]
    fn half_met_recommends_review() {
        let (decision, confidence, rationale) = derive_decision("LCD-056", &medium_fraction(1, 2));
        assert_eq!(decision, Decision::Review);
        assert_eq!(confidence, 0.60);
        assert!(rationale.starts_with("Review recommended: 1/2 criteria met"));
        assert!(rationale.contains("LCD-056"));
    }

    #[test]
    fn under_half_met_denies() {
        let (decision, confidence, rationale) = derive_decision("LCD-056", &medium_fraction(49, 100));
        assert_eq!(decision, Decision::Deny);
        assert_eq!(confidence, 0.75);
        assert!(rationale.starts_with("Denied: Only 49/100 criteria met."));
        assert!(rationale.contains("LCD-056"));
    }

    // ── Tool ─────────────────────────────────────────────────────────────────

    fn knee_params(status: &str, is_active: bool) -> Value {
        json!({
            "policyId": "NCD-150.4",
            "clinicalEvidence": {
                "documentData": { "documentId": "PA-2026-0409" },
                "patient": { "name": "Maria Garcia" },
                "clinicalFindings": { "conservativeTreatment": { "documented": true } },
            },
            "memberInfo": { "isActive": is_active },
            "claimsHistory": { "relatedProcedures": [{ "claimId": "CLM-2025-00016" }] },
            "requestContext": {
                "procedureCode": "27447",
                "diagnosisCodes": ["M17.11"],
                "status": status,
            },
        })
    }

    #[tokio::test]
    async fn knee_replacement_with_full_evidence_is_approved() {
        let out = run(0.0, knee_params("approved", true)).await;
        assert_eq!(out.decision, Decision::Approve);
        assert_eq!(out.confidence, 0.88);
        // eligibility + 4 necessity + 5 documentation + conservative treatment
        assert_eq!(out.scoring.total_criteria, 11);
        assert_eq!(out.scoring.criteria_met, 11);
        assert_eq!(out.scoring.match_percentage, 100.0);
        assert!(out.flags.is_empty());
        assert!(out.rationale.contains("criteria met"));
        assert!(out.rationale.contains("NCD-150.4"));
        assert_eq!(out.policy_title.as_deref(), Some("Total Knee Arthroplasty (TKA)"));
        assert_eq!(out.match_engine, MATCH_ENGINE);

        let conservative = out
            .criteria_results
            .iter()
            .find(|r| r.criterion == CONSERVATIVE_CRITERION)
            .unwrap();
        assert!(conservative.detail.contains("3 months"));
    }

    #[tokio::test]
    async fn inactive_member_fails_critical_criterion() {
        let out = run(0.99, knee_params("approved", false)).await;
        assert_eq!(out.decision, Decision::Deny);
        assert_eq!(out.confidence, 0.85);
        assert!(out
            .unmet_criteria
            .contains(&"Member eligibility not confirmed".to_string()));
    }

    #[tokio::test]
    async fn low_draws_leave_pending_criteria_unmet() {
        // Only "documented" criteria are decided by keyword; the rest fall
        // to draws that never clear the pending threshold at 0.0.
        let out = run(0.0, knee_params("pending", true)).await;
        assert_eq!(out.decision, Decision::Review);
        assert_eq!(out.confidence, 0.65);
        let unmet_high = out
            .criteria_results
            .iter()
            .filter(|r| !r.met && r.weight == CriterionWeight::High)
            .count();
        assert_eq!(unmet_high, 2);
        assert!(out
            .rationale
            .starts_with("Review required: 2 criteria need verification."));
    }

    #[tokio::test]
    async fn review_status_raises_review_trigger() {
        let out = run(0.99, knee_params("review", true)).await;
        assert!(out.has_flag(flags::REVIEW_TRIGGER_MET));
        assert_eq!(out.decision, Decision::Review);
        assert!(out.rationale.contains("Review trigger conditions detected."));
    }

    #[tokio::test]
    async fn previously_denied_cpap_trips_sleep_study_condition() {
        let params = json!({
            "policyId": "LCD-090",
            "clinicalEvidence": { "documentData": {} },
            "memberInfo": { "isActive": true },
            "requestContext": { "procedureCode": "E0601", "status": "denied" },
        });
        let out = run(0.0, params).await;
        assert!(out.has_flag(flags::DENIAL_CONDITION_MET));
        assert!(out.has_flag(flags::AUTO_APPROVE_ELIGIBLE));
        assert_eq!(out.decision, Decision::Deny);
        assert_eq!(out.confidence, 0.80);
        assert!(out
            .unmet_criteria
            .contains(&"Denial trigger: No sleep study on file".to_string()));
    }

    #[tokio::test]
    async fn unknown_policy_needs_review() {
        let out = run(
            0.5,
            json!({ "policyId": "UNKNOWN", "clinicalEvidence": {} }),
        )
        .await;
        assert_eq!(out.decision, Decision::Review);
        assert_eq!(out.confidence, 0.3);
        assert!(out.has_flag(flags::POLICY_NOT_FOUND));
        assert_eq!(out.unmet_criteria, vec!["Policy not found".to_string()]);
        assert_eq!(out.error.as_deref(), Some("Policy UNKNOWN not found"));
    }

    #[tokio::test]
    async fn missing_clinical_evidence_is_rejected() {
        assert!(tool(0.5)
            .execute(json!({ "policyId": "NCD-150.4" }))
            .await
            .is_err());
    }
}
