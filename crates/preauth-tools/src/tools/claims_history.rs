//! `claims-history-retrieval`: a member's recent claims and utilization.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Months, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use preauth_config::LatencyRange;
use preauth_contracts::{
    error::PreauthResult,
    outputs::{ClaimSummary, ClaimsHistory, ClaimsSummary, DateRange, RelatedClaim, UtilizationMetrics},
    request::clean_procedure_code,
    tool::tool_names,
};
use preauth_core::{traits::Tool, RandomSource};

use super::{encode_output, parse_params, round_to, simulate_latency};
use crate::reference::{ClaimRecord, ReferenceData};

fn default_lookback() -> u32 {
    12
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Input {
    member_id: String,
    #[serde(default = "default_lookback")]
    lookback_months: u32,
    #[serde(default)]
    procedure_code: Option<String>,
    #[serde(default)]
    diagnosis_codes: Vec<String>,
    #[serde(default = "default_true")]
    include_metrics: bool,
    #[serde(default)]
    as_of_date: Option<NaiveDate>,
}

pub struct ClaimsHistoryTool {
    data: Arc<dyn ReferenceData>,
    latency: LatencyRange,
    rng: Arc<dyn RandomSource>,
}

impl ClaimsHistoryTool {
    pub fn new(
        data: Arc<dyn ReferenceData>,
        latency: LatencyRange,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self { data, latency, rng }
    }
}

#[async_trait]
impl Tool for ClaimsHistoryTool {
    fn name(&self) -> &str {
        tool_names::CLAIMS_HISTORY
    }

    fn description(&self) -> &str {
        "Retrieves a member's claims within a lookback window, highlights claims related \
         to the requested procedure or diagnoses, and computes utilization metrics."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "memberId": { "type": "string" },
                "lookbackMonths": { "type": "integer", "minimum": 1, "default": 12 },
                "procedureCode": { "type": "string" },
                "diagnosisCodes": { "type": "array", "items": { "type": "string" } },
                "includeMetrics": { "type": "boolean", "default": true },
                "asOfDate": { "type": "string", "format": "date" },
            },
            "required": ["memberId"],
        })
    }

    async fn execute(&self, params: Value) -> PreauthResult<Value> {
        let input: Input = parse_params(self.name(), params)?;
        simulate_latency(self.latency, self.rng.as_ref()).await;

        let to = input.as_of_date.unwrap_or_else(|| Utc::now().date_naive());
        let from = to
            .checked_sub_months(Months::new(input.lookback_months))
            .unwrap_or(NaiveDate::MIN);
        let claims = self.data.claims_between(&input.member_id, from, to).await?;

        let code = input
            .procedure_code
            .as_deref()
            .map(clean_procedure_code)
            .unwrap_or_default();
        let related = related_claims(&claims, &code, &input.diagnosis_codes);
        debug!(
            member_id = %input.member_id,
            claims = claims.len(),
            related = related.len(),
            "claims retrieved"
        );

        let output = ClaimsHistory {
            member_id: input.member_id.clone(),
            lookback_months: input.lookback_months,
            date_range: Some(DateRange { from, to }),
            total_claims: claims.len(),
            claims: claims.iter().map(summarize).collect(),
            utilization_metrics: input
                .include_metrics
                .then(|| utilization(&claims, related.len())),
            summary: Some(ClaimsSummary {
                has_recent_related_claims: !related.is_empty(),
                has_recent_denials: claims.iter().any(ClaimRecord::is_denied),
                denial_reasons: claims
                    .iter()
                    .filter_map(|c| c.denial_reason.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect(),
                last_claim_date: claims.first().map(|c| c.service_date),
            }),
            related_procedures: related
                .into_iter()
                .map(|c| RelatedClaim {
                    claim_id: c.claim_id.clone(),
                    service_date: c.service_date,
                    cpt_code: c.cpt_code.clone(),
                    description: c.cpt_description.clone(),
                    status: c.claim_status.clone(),
                    paid_amount: c.paid_amount,
                })
                .collect(),
        };
        encode_output(self.name(), &output)
    }
}

/// Claims for the same procedure or sharing a diagnosis, in input order.
fn related_claims<'a>(
    claims: &'a [ClaimRecord],
    procedure_code: &str,
    diagnosis_codes: &[String],
) -> Vec<&'a ClaimRecord> {
    let mut seen = BTreeSet::new();
    claims
        .iter()
        .filter(|c| {
            let same_procedure = !procedure_code.is_empty() && c.cpt_code == procedure_code;
            let shared_dx = c.icd10_codes.iter().any(|dx| diagnosis_codes.contains(dx));
            same_procedure || shared_dx
        })
        .filter(|c| seen.insert(c.claim_id.clone()))
        .collect()
}

fn utilization(claims: &[ClaimRecord], related_count: usize) -> UtilizationMetrics {
    let total_billed: f64 = claims.iter().map(|c| c.billed_amount).sum();
    let claims_paid = claims.iter().filter(|c| c.is_paid()).count();
    let providers: BTreeSet<&str> = claims.iter().map(|c| c.provider_name.as_str()).collect();

    UtilizationMetrics {
        total_billed: round_to(total_billed, 2),
        total_paid: round_to(claims.iter().map(|c| c.paid_amount).sum(), 2),
        total_patient_responsibility: round_to(
            claims.iter().map(|c| c.patient_responsibility).sum(),
            2,
        ),
        claims_paid,
        claims_denied: claims.iter().filter(|c| c.is_denied()).count(),
        approval_rate: (!claims.is_empty())
            .then(|| round_to(claims_paid as f64 / claims.len() as f64 * 100.0, 1)),
        related_procedure_count: related_count,
        prior_auths_on_file: claims.iter().filter(|c| c.auth_number.is_some()).count(),
        average_claim_amount: if claims.is_empty() {
            0.0
        } else {
            round_to(total_billed / claims.len() as f64, 2)
        },
        unique_providers: providers.len(),
    }
}

fn summarize(c: &ClaimRecord) -> ClaimSummary {
    ClaimSummary {
        claim_id: c.claim_id.clone(),
        service_date: c.service_date,
        provider: c.provider_name.clone(),
        facility: c.facility_name.clone(),
        cpt_code: c.cpt_code.clone(),
        description: c.cpt_description.clone(),
        diagnosis_codes: c.icd10_codes.clone(),
        billed_amount: c.billed_amount,
        paid_amount: c.paid_amount,
        patient_responsibility: c.patient_responsibility,
        status: c.claim_status.clone(),
        denial_reason: c.denial_reason.clone(),
        service_type: c.service_type.clone(),
        auth_number: c.auth_number.clone(),
    }
}
