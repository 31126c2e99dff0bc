//! Orchestration: run the six tools and collect their results.
//!
//! Phases run in order. Phase 3 calls eligibility and claims concurrently
//! and joins on both before phase 4 starts. Every tool call is bracketed by
//! an info trace before and a success/warning trace after, and each phase
//! records one step per tool.

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use preauth_contracts::{
    decision::Decision,
    error::{PreauthError, PreauthResult},
    outputs::{
        ClaimsHistory, ClinicalExtraction, CriteriaMatchResult, DocumentExtraction,
        EligibilityResult, PolicySearchResult, ToolOutputs,
    },
    progress::{StepDescriptor, TraceLevel},
    request::Request,
    stage::{OrchestrationOutput, PlanningOutput},
    tool::tool_names,
};

use crate::progress::ProgressCallbacks;
use crate::stages::with_failure_trace;
use crate::traits::ToolInvoker;

const CATEGORY: &str = "Orchestrator";
const ORCHESTRATOR: &str = "ToolOrchestrator-v2";

/// Policy id passed to the matcher when the search found nothing.
pub const UNKNOWN_POLICY: &str = "UNKNOWN";

/// Claims lookback used for every request.
const LOOKBACK_MONTHS: u32 = 12;

pub async fn run(
    plan: &PlanningOutput,
    request: &Request,
    tools: &dyn ToolInvoker,
    progress: &ProgressCallbacks,
) -> PreauthResult<OrchestrationOutput> {
    with_failure_trace(progress, CATEGORY, orchestrate(plan, request, tools, progress)).await
}

async fn orchestrate(
    plan: &PlanningOutput,
    request: &Request,
    tools: &dyn ToolInvoker,
    progress: &ProgressCallbacks,
) -> PreauthResult<OrchestrationOutput> {
    let started = Instant::now();

    progress
        .on_trace(
            TraceLevel::Info,
            CATEGORY,
            "Orchestrator activated by Planning Agent",
            json!({
                "orchestrator": ORCHESTRATOR,
                "executionPlan": plan.execution_order.strategy,
                "toolChain": plan.tools.join(" → "),
            }),
        )
        .await?;

    progress
        .on_step(
            StepDescriptor::completed(
                "Orchestrator Activation",
                "Orchestrator agent sequences tool execution",
            )
            .with_details([
                "Tool chain initialized".to_string(),
                format!("Execution strategy: {}", plan.execution_order.strategy),
                format!("{} tools queued", plan.tools.len()),
                format!("Sequence: {}", tool_acronyms(&plan.tools)),
            ]),
        )
        .await?;

    let clean_code = request.clean_procedure_code();

    // ── Phase 1: document processing ─────────────────────────────────────────
    progress
        .on_trace(
            TraceLevel::Info,
            "IDP Service",
            "Intelligent Document Processing tool invoked",
            json!({
                "tool": "IDP-v3.2",
                "documentId": format!("{}.pdf", request.request_id),
                "processingMode": "structured-extraction",
                "invokedBy": "Orchestrator",
            }),
        )
        .await?;

    let document_path = request
        .document_url
        .clone()
        .unwrap_or_else(|| format!("/documents/{}.pdf", request.request_id));
    let (idp_raw, idp) = invoke::<DocumentExtraction>(
        tools,
        tool_names::DOCUMENT_PROCESSING,
        json!({
            "documentPath": document_path,
            "documentType": "prior-auth-request",
        }),
    )
    .await?;

    progress
        .on_trace(
            TraceLevel::Success,
            "IDP Service",
            "Document analysis completed successfully",
            json!({
                "pagesProcessed": idp.page_count,
                "entitiesExtracted": idp.entities.len(),
                "confidence": idp.overall_confidence,
                "processingTime": format!("{}ms", idp.processing_time_ms),
            }),
        )
        .await?;

    progress
        .on_step(
            StepDescriptor::completed(
                "Intelligent Document Processing",
                "IDP tool extracts text, entities, and form fields from clinical PDF",
            )
            .with_tool(tool_names::DOCUMENT_PROCESSING)
            .with_details([
                format!("PDF parsed successfully ({} pages)", idp.page_count),
                format!(
                    "Text extraction completed with {:.0}% confidence",
                    idp.overall_confidence * 100.0
                ),
                format!("{} entities recognized", idp.entities.len()),
                "Form fields identified and structured".to_string(),
            ]),
        )
        .await?;

    // ── Phase 2: clinical data extraction ────────────────────────────────────
    progress
        .on_trace(
            TraceLevel::Info,
            "Data Extraction",
            "Clinical data extraction tool invoked",
            json!({
                "tool": "ClinicalNER-v4.1",
                "extractionType": "all",
                "invokedBy": "Orchestrator",
            }),
        )
        .await?;

    let (extraction_raw, extraction) = invoke::<ClinicalExtraction>(
        tools,
        tool_names::CLINICAL_EXTRACTION,
        json!({
            "documentData": idp_raw,
            "extractionType": "all",
            "requestContext": {
                "procedureCode": request.procedure_code,
                "procedureName": request.procedure_name,
                "diagnosisCodes": request.diagnosis_codes,
                "memberId": request.member_id,
                "patientName": request.patient_name,
                "patientDob": request.patient_dob,
                "provider": request.provider,
                "providerNpi": request.provider_npi,
                "status": request.status,
            },
        }),
    )
    .await?;

    progress
        .on_trace(
            TraceLevel::Success,
            "Data Extraction",
            "Clinical entities extracted and validated",
            json!({
                "procedureCodes": extraction.procedure_codes.len(),
                "diagnosisCodes": extraction.diagnosis_codes.len(),
                "patientFound": extraction.patient.is_some(),
                "confidence": extraction.extraction_confidence,
            }),
        )
        .await?;

    progress
        .on_step(
            StepDescriptor::completed(
                "Clinical Data Extraction",
                "NLP extraction of patient demographics, procedure/diagnosis codes, and clinical findings",
            )
            .with_tool(tool_names::CLINICAL_EXTRACTION)
            .with_details([
                "Patient demographics extracted".to_string(),
                format!(
                    "{} procedure codes identified and validated",
                    extraction.procedure_codes.len()
                ),
                format!(
                    "{} diagnosis codes parsed and confirmed",
                    extraction.diagnosis_codes.len()
                ),
                "Clinical findings structured from SOAP notes".to_string(),
            ]),
        )
        .await?;

    // ── Phase 3: eligibility and claims, concurrently ────────────────────────
    progress
        .on_trace(
            TraceLevel::Info,
            "Member 360",
            "Member eligibility lookup tool invoked",
            json!({
                "memberId": request.member_id,
                "dataProduct": "Member360-API-v2",
                "endpoint": "/member/eligibility",
                "invokedBy": "Orchestrator",
            }),
        )
        .await?;

    progress
        .on_trace(
            TraceLevel::Info,
            "Claims API",
            "Claims history retrieval tool invoked",
            json!({
                "tool": "ClaimsHistory-API-v3",
                "memberId": request.member_id,
                "lookbackPeriod": format!("{LOOKBACK_MONTHS} months"),
                "invokedBy": "Orchestrator",
            }),
        )
        .await?;

    let ((_, member), (_, claims)) = tokio::try_join!(
        invoke::<EligibilityResult>(
            tools,
            tool_names::MEMBER_ELIGIBILITY,
            json!({
                "memberId": request.member_id,
                "queryType": "full-profile",
            }),
        ),
        invoke::<ClaimsHistory>(
            tools,
            tool_names::CLAIMS_HISTORY,
            json!({
                "memberId": request.member_id,
                "lookbackMonths": LOOKBACK_MONTHS,
                "procedureCode": request.procedure_code,
                "diagnosisCodes": request.diagnosis_codes,
            }),
        ),
    )?;

    let coverage = if member.is_active { "Active" } else { "Issue Detected" };
    let plan_type = member.plan.as_ref().map(|p| p.plan_type.clone());

    progress
        .on_trace(
            if member.is_active { TraceLevel::Success } else { TraceLevel::Warning },
            "Member 360",
            "Member eligibility verified",
            json!({
                "status": coverage,
                "planType": plan_type,
                "effectiveDate": member.eligibility.as_ref().and_then(|e| e.effective_date),
                "coverageLevel": member.plan.as_ref().map(|p| p.coverage_level.clone()),
                "issues": member.issues,
            }),
        )
        .await?;

    progress
        .on_step(
            StepDescriptor::completed(
                "Member Eligibility Verification",
                "Verify member eligibility, coverage status, and benefits from Member 360",
            )
            .with_tool(tool_names::MEMBER_ELIGIBILITY)
            .with_details([
                format!("Member ID {} verified", request.member_id),
                format!("Coverage status: {coverage}"),
                format!("Plan: {}", plan_type.as_deref().unwrap_or("N/A")),
                if member.issues.is_empty() {
                    "No eligibility issues detected".to_string()
                } else {
                    format!("Issues: {}", member.issues.join(", "))
                },
            ]),
        )
        .await?;

    let metrics = claims.utilization_metrics.as_ref();
    progress
        .on_trace(
            TraceLevel::Success,
            "Claims API",
            "Claims history retrieved successfully",
            json!({
                "totalClaims": claims.total_claims,
                "relatedProcedures": claims.related_procedures.len(),
                "lastClaimDate": claims.summary.as_ref().and_then(|s| s.last_claim_date),
            }),
        )
        .await?;

    progress
        .on_step(
            StepDescriptor::completed(
                "Claims History Analysis",
                "Retrieve and analyze member claims history and utilization patterns",
            )
            .with_tool(tool_names::CLAIMS_HISTORY)
            .with_details([
                format!(
                    "{} claims retrieved for past {LOOKBACK_MONTHS} months",
                    claims.total_claims
                ),
                format!("{} related procedures found", claims.related_procedures.len()),
                format!(
                    "Approval rate: {}",
                    metrics
                        .and_then(|m| m.approval_rate)
                        .map(|r| format!("{r}%"))
                        .unwrap_or_else(|| "N/A".to_string())
                ),
                format!(
                    "Total billed: ${:.2}",
                    metrics.map(|m| m.total_billed).unwrap_or(0.0)
                ),
            ]),
        )
        .await?;

    // ── Phase 4: coverage policy search ──────────────────────────────────────
    progress
        .on_trace(
            TraceLevel::Info,
            "NCD Search",
            "NCD/LCD guidelines search tool invoked",
            json!({
                "tool": "PolicySearch-v2.1",
                "procedureCode": clean_code,
                "diagnosisCodes": request.diagnosis_codes,
                "invokedBy": "Orchestrator",
            }),
        )
        .await?;

    let (_, search) = invoke::<PolicySearchResult>(
        tools,
        tool_names::POLICY_SEARCH,
        json!({
            "procedureCode": clean_code,
            "diagnosisCodes": request.diagnosis_codes,
        }),
    )
    .await?;

    let top_policy = search.top_policy();
    progress
        .on_trace(
            if top_policy.is_some() { TraceLevel::Success } else { TraceLevel::Warning },
            "NCD Search",
            "Coverage policy matched",
            json!({
                "matchedPolicies": search.total_matches,
                "topPolicyId": top_policy.map(|p| p.policy_id.clone()),
                "topRelevanceScore": top_policy.map(|p| p.relevance_score),
                "criteriaCount": search.medical_necessity_criteria.len(),
            }),
        )
        .await?;

    progress
        .on_step(
            StepDescriptor::completed(
                "NCD/LCD Guidelines Search",
                "Search coverage policies matching procedure and diagnosis codes",
            )
            .with_tool(tool_names::POLICY_SEARCH)
            .with_details([
                format!("{} matching policies found", search.total_matches),
                match top_policy {
                    Some(p) => format!(
                        "Top match: {} - {} (score: {})",
                        p.policy_id, p.title, p.relevance_score
                    ),
                    None => "No matching policy found".to_string(),
                },
                format!(
                    "{} medical necessity criteria loaded",
                    search.medical_necessity_criteria.len()
                ),
                format!(
                    "{} required documents identified",
                    search.required_documentation.len()
                ),
            ]),
        )
        .await?;

    // ── Phase 5: criteria matching ───────────────────────────────────────────
    let policy_id = top_policy
        .map(|p| p.policy_id.clone())
        .unwrap_or_else(|| UNKNOWN_POLICY.to_string());

    progress
        .on_trace(
            TraceLevel::Info,
            "Policy Match",
            "Policy criteria matching tool invoked",
            json!({
                "tool": "PolicyMatcher-v3.0",
                "policyId": policy_id,
                "invokedBy": "Orchestrator",
            }),
        )
        .await?;

    let (_, matching) = invoke::<CriteriaMatchResult>(
        tools,
        tool_names::CRITERIA_MATCHING,
        json!({
            "policyId": policy_id,
            "clinicalEvidence": clinical_evidence(extraction_raw, &idp_raw),
            "memberInfo": {
                "isActive": member.is_active,
                "plan": member.plan,
                "benefits": member.benefits,
            },
            "claimsHistory": {
                "totalClaims": claims.total_claims,
                "relatedProcedures": claims.related_procedures,
                "utilizationMetrics": claims.utilization_metrics,
                "summary": claims.summary,
            },
            "requestContext": {
                "requestId": request.request_id,
                "procedureCode": clean_code,
                "diagnosisCodes": request.diagnosis_codes,
                "status": request.status,
            },
        }),
    )
    .await?;

    let headline: String = matching.rationale.chars().take(80).collect();
    progress
        .on_trace(
            if matching.decision == Decision::Approve {
                TraceLevel::Success
            } else {
                TraceLevel::Warning
            },
            "Policy Match",
            format!(
                "Decision: {} - {headline}",
                matching.decision.as_str().to_uppercase()
            ),
            json!({
                "decision": matching.decision,
                "confidence": matching.confidence,
                "criteriaMet": matching.scoring.criteria_met,
                "criteriaTotal": matching.scoring.total_criteria,
                "matchPercentage": matching.scoring.match_percentage,
            }),
        )
        .await?;

    progress
        .on_step(
            StepDescriptor::completed(
                "Policy Criteria Matching",
                "Evaluate clinical evidence against policy criteria for decision recommendation",
            )
            .with_tool(tool_names::CRITERIA_MATCHING)
            .with_details([
                format!("Policy {policy_id} criteria evaluated"),
                format!(
                    "{}/{} criteria met ({}%)",
                    matching.scoring.criteria_met,
                    matching.scoring.total_criteria,
                    matching.scoring.match_percentage
                ),
                format!(
                    "Decision: {} (confidence: {})",
                    matching.decision.as_str().to_uppercase(),
                    matching.confidence
                ),
                matching.rationale.chars().take(120).collect(),
            ]),
        )
        .await?;

    Ok(OrchestrationOutput {
        request_id: request.request_id.clone(),
        tool_outputs: ToolOutputs {
            idp,
            extraction,
            member,
            claims,
            search,
            matching,
        },
        processing_time_ms: started.elapsed().as_millis() as u64,
    })
}

/// Call `tool` and decode its result, keeping the raw JSON for threading
/// into later calls.
async fn invoke<T: DeserializeOwned>(
    tools: &dyn ToolInvoker,
    tool: &str,
    params: Value,
) -> PreauthResult<(Value, T)> {
    debug!(tool, "invoking tool");
    let raw = tools.call_tool(tool, params).await?;
    let typed = serde_json::from_value(raw.clone()).map_err(|e| PreauthError::ToolExecution {
        tool: tool.to_string(),
        reason: format!("malformed result: {e}"),
    })?;
    Ok((raw, typed))
}

/// The extraction result with the document result attached as `documentData`.
fn clinical_evidence(extraction: Value, document: &Value) -> Value {
    match extraction {
        Value::Object(mut map) => {
            map.insert("documentData".to_string(), document.clone());
            Value::Object(map)
        }
        _ => json!({ "documentData": document }),
    }
}

/// `intelligent-document-processing` → `IDP`, joined with arrows.
fn tool_acronyms(tools: &[String]) -> String {
    tools
        .iter()
        .map(|t| {
            t.split('-')
                .filter_map(|w| w.chars().next())
                .flat_map(char::to_uppercase)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" → ")
}
