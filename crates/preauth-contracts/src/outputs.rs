//! Typed mirrors of the six tools' JSON results.
//!
//! Tools speak JSON through the registry. Orchestration decodes each result
//! into the matching type here so the Decision stage works with fields, not
//! string keys. Missing fields fall back to defaults so a sparse result from
//! a substitute tool still decodes.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::{CriterionResult, Decision, Scoring};

// ── intelligent-document-processing ──────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentExtraction {
    pub document_id: String,
    pub document_type: String,
    pub page_count: u32,
    pub processing_time_ms: u64,
    pub overall_confidence: f64,
    pub ocr_engine: String,
    pub raw_text_preview: String,
    pub entities: Vec<ExtractedEntity>,
    pub form_fields: BTreeMap<String, FormField>,
    pub tables: Vec<ExtractedTable>,
    pub sections: Vec<DocumentSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractedEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub confidence: f64,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormField {
    pub value: String,
    pub confidence: f64,
    pub field_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractedTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentSection {
    pub title: String,
    pub content: String,
    pub page_number: u32,
}

// ── clinical-data-extraction ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClinicalExtraction {
    pub extraction_type: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub nlp_engine: String,
    pub patient: Option<PatientDemographics>,
    pub procedure_codes: Vec<CodedProcedure>,
    pub diagnosis_codes: Vec<CodedDiagnosis>,
    pub code_validation: Option<CodeValidation>,
    pub clinical_findings: Option<ClinicalFindings>,
    pub extraction_confidence: f64,
    pub entities_extracted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatientDemographics {
    pub name: String,
    pub date_of_birth: String,
    pub member_id: String,
    pub provider: String,
    pub provider_npi: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodedProcedure {
    pub code: String,
    pub system: String,
    pub description: String,
    pub confidence: f64,
    pub validated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodedDiagnosis {
    pub code: String,
    pub system: String,
    pub description: String,
    pub is_primary: bool,
    pub confidence: f64,
    pub validated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeValidation {
    pub procedure_code_found: bool,
    pub matching_policy: Option<String>,
    pub matching_policy_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClinicalFindings {
    pub chief_complaint: String,
    pub history_of_present_illness: String,
    pub assessment: String,
    pub plan: String,
    pub conservative_treatment: ConservativeTreatment,
    /// Criterion texts the submitting provider explicitly attests to.
    pub documented_criteria: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConservativeTreatment {
    pub documented: bool,
    pub treatments: Vec<String>,
}

// ── member-eligibility-lookup ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EligibilityResult {
    pub found: bool,
    pub member_id: String,
    pub query_type: String,
    pub checked_as_of: Option<NaiveDate>,
    /// True only when the member row is active and no issue was raised.
    pub is_active: bool,
    pub issues: Vec<String>,
    pub error: Option<String>,
    pub eligibility: Option<EligibilityDetails>,
    pub plan: Option<PlanDetails>,
    pub benefits: Option<Benefits>,
    pub member: Option<MemberProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EligibilityDetails {
    pub status: String,
    pub effective_date: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
    pub pre_auth_required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanDetails {
    pub plan_type: String,
    pub plan_id: String,
    pub group_number: String,
    pub coverage_level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Benefits {
    pub copay_primary: f64,
    pub copay_specialist: f64,
    pub deductible_annual: f64,
    pub deductible_met: f64,
    pub deductible_fully_met: bool,
    pub max_out_of_pocket: f64,
    pub oop_met: f64,
    pub oop_max_reached: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemberProfile {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub phone: String,
    pub email: String,
    pub pcp_name: String,
    pub pcp_npi: String,
}

// ── claims-history-retrieval ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClaimsHistory {
    pub member_id: String,
    pub lookback_months: u32,
    pub date_range: Option<DateRange>,
    pub total_claims: usize,
    pub claims: Vec<ClaimSummary>,
    pub related_procedures: Vec<RelatedClaim>,
    pub utilization_metrics: Option<UtilizationMetrics>,
    pub summary: Option<ClaimsSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSummary {
    pub claim_id: String,
    pub service_date: NaiveDate,
    pub provider: String,
    pub facility: String,
    pub cpt_code: String,
    pub description: String,
    pub diagnosis_codes: Vec<String>,
    pub billed_amount: f64,
    pub paid_amount: f64,
    pub patient_responsibility: f64,
    pub status: String,
    pub denial_reason: Option<String>,
    pub service_type: String,
    pub auth_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedClaim {
    pub claim_id: String,
    pub service_date: NaiveDate,
    pub cpt_code: String,
    pub description: String,
    pub status: String,
    pub paid_amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UtilizationMetrics {
    pub total_billed: f64,
    pub total_paid: f64,
    pub total_patient_responsibility: f64,
    pub claims_paid: usize,
    pub claims_denied: usize,
    /// Paid claims as a percentage of all claims; `None` with no claims.
    pub approval_rate: Option<f64>,
    pub related_procedure_count: usize,
    pub prior_auths_on_file: usize,
    pub average_claim_amount: f64,
    pub unique_providers: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClaimsSummary {
    pub has_recent_related_claims: bool,
    pub has_recent_denials: bool,
    pub denial_reasons: Vec<String>,
    pub last_claim_date: Option<NaiveDate>,
}

// ── ncd-guidelines-search ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicySearchResult {
    pub search_query: SearchQuery,
    pub total_matches: usize,
    /// Ranked by relevance, highest first.
    pub policies: Vec<RankedPolicy>,
    pub medical_necessity_criteria: Vec<String>,
    pub required_documentation: Vec<String>,
    pub search_engine: String,
}

impl PolicySearchResult {
    /// The highest-ranked policy, if any matched.
    pub fn top_policy(&self) -> Option<&RankedPolicy> {
        self.policies.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchQuery {
    pub procedure_code: String,
    pub diagnosis_codes: Vec<String>,
    pub query_text: Option<String>,
    pub policy_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RankedPolicy {
    pub policy_id: String,
    pub policy_type: String,
    pub title: String,
    /// 0–100.
    pub relevance_score: u32,
    pub procedure_codes: Vec<String>,
    pub diagnosis_codes: Vec<String>,
    pub effective_date: Option<NaiveDate>,
    pub medical_necessity_criteria: Vec<String>,
    pub required_documentation: Vec<String>,
    pub auto_approve: bool,
    pub denial_conditions: Vec<String>,
    pub review_triggers: Vec<String>,
    pub conservative_treatment_required: bool,
}

// ── policy-criteria-matching ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CriteriaMatchResult {
    pub policy_id: String,
    pub policy_title: Option<String>,
    pub policy_type: Option<String>,
    pub decision: Decision,
    pub confidence: f64,
    pub rationale: String,
    pub criteria_results: Vec<CriterionResult>,
    pub met_criteria: Vec<String>,
    pub unmet_criteria: Vec<String>,
    pub flags: Vec<String>,
    pub scoring: Scoring,
    pub error: Option<String>,
    pub match_engine: String,
}

impl CriteriaMatchResult {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

impl Default for CriteriaMatchResult {
    /// An empty result recommends review at coin-flip confidence.
    fn default() -> Self {
        Self {
            policy_id: String::new(),
            policy_title: None,
            policy_type: None,
            decision: Decision::Review,
            confidence: 0.5,
            rationale: "Insufficient data for automated decision.".to_string(),
            criteria_results: Vec::new(),
            met_criteria: Vec::new(),
            unmet_criteria: Vec::new(),
            flags: Vec::new(),
            scoring: Scoring::default(),
            error: None,
            match_engine: String::new(),
        }
    }
}

// ── Orchestration aggregate ──────────────────────────────────────────────────

/// All six tool results, keyed by short logical name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutputs {
    pub idp: DocumentExtraction,
    pub extraction: ClinicalExtraction,
    pub member: EligibilityResult,
    pub claims: ClaimsHistory,
    pub search: PolicySearchResult,
    #[serde(rename = "match")]
    pub matching: CriteriaMatchResult,
}
