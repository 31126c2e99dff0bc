//! `member-eligibility-lookup`: coverage status, plan, and benefits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use preauth_config::LatencyRange;
use preauth_contracts::{
    error::PreauthResult,
    outputs::{Benefits, EligibilityDetails, EligibilityResult, MemberProfile, PlanDetails},
    tool::tool_names,
};
use preauth_core::{traits::Tool, RandomSource};

use super::{encode_output, parse_params, simulate_latency};
use crate::reference::{MemberRecord, ReferenceData};

pub const MEMBER_NOT_FOUND: &str = "MEMBER_NOT_FOUND";
pub const MEMBER_INACTIVE: &str = "MEMBER_INACTIVE";
pub const COVERAGE_NOT_YET_EFFECTIVE: &str = "COVERAGE_NOT_YET_EFFECTIVE";
pub const COVERAGE_TERMINATED: &str = "COVERAGE_TERMINATED";

/// Which sections of the member record to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum QueryType {
    Eligibility,
    Benefits,
    Coverage,
    #[default]
    FullProfile,
}

impl QueryType {
    fn as_str(&self) -> &'static str {
        match self {
            QueryType::Eligibility => "eligibility",
            QueryType::Benefits => "benefits",
            QueryType::Coverage => "coverage",
            QueryType::FullProfile => "full-profile",
        }
    }

    fn includes(&self, section: QueryType) -> bool {
        *self == QueryType::FullProfile || *self == section
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Input {
    member_id: String,
    #[serde(default)]
    query_type: QueryType,
    as_of_date: Option<NaiveDate>,
}

pub struct MemberEligibilityTool {
    data: Arc<dyn ReferenceData>,
    latency: LatencyRange,
    rng: Arc<dyn RandomSource>,
}

impl MemberEligibilityTool {
    pub fn new(
        data: Arc<dyn ReferenceData>,
        latency: LatencyRange,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self { data, latency, rng }
    }
}

#[async_trait]
impl Tool for MemberEligibilityTool {
    fn name(&self) -> &str {
        tool_names::MEMBER_ELIGIBILITY
    }

    fn description(&self) -> &str {
        "Looks up a member's eligibility, coverage dates, plan details, and benefit \
         accumulators from Member 360, flagging inactive or out-of-window coverage."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "memberId": { "type": "string" },
                "queryType": {
                    "type": "string",
                    "enum": ["eligibility", "benefits", "coverage", "full-profile"],
                    "default": "full-profile",
                },
                "asOfDate": { "type": "string", "format": "date" },
            },
            "required": ["memberId"],
        })
    }

    async fn execute(&self, params: Value) -> PreauthResult<Value> {
        let input: Input = parse_params(self.name(), params)?;
        simulate_latency(self.latency, self.rng.as_ref()).await;

        let as_of = input.as_of_date.unwrap_or_else(|| Utc::now().date_naive());
        let output = match self.data.member(&input.member_id).await? {
            Some(row) => eligibility(&row, input.query_type, as_of),
            None => {
                debug!(member_id = %input.member_id, "member not found");
                EligibilityResult {
                    found: false,
                    member_id: input.member_id.clone(),
                    query_type: input.query_type.as_str().to_string(),
                    checked_as_of: Some(as_of),
                    is_active: false,
                    issues: vec![MEMBER_NOT_FOUND.to_string()],
                    error: Some(format!(
                        "Member {} not found in Member 360 database",
                        input.member_id
                    )),
                    ..EligibilityResult::default()
                }
            }
        };
        encode_output(self.name(), &output)
    }
}

/// Coverage problems for `row` on `as_of`.
fn coverage_issues(row: &MemberRecord, as_of: NaiveDate) -> Vec<String> {
    let mut issues = Vec::new();
    if !row.is_active {
        issues.push(MEMBER_INACTIVE.to_string());
    }
    if as_of < row.effective_date {
        issues.push(COVERAGE_NOT_YET_EFFECTIVE.to_string());
    }
    if row.termination_date.is_some_and(|end| as_of > end) {
        issues.push(COVERAGE_TERMINATED.to_string());
    }
    issues
}

fn eligibility(row: &MemberRecord, query: QueryType, as_of: NaiveDate) -> EligibilityResult {
    let issues = coverage_issues(row, as_of);
    let clean = issues.is_empty();

    EligibilityResult {
        found: true,
        member_id: row.member_id.clone(),
        query_type: query.as_str().to_string(),
        checked_as_of: Some(as_of),
        is_active: row.is_active && clean,
        error: None,
        eligibility: query.includes(QueryType::Eligibility).then(|| EligibilityDetails {
            status: if clean { "Active" } else { "Issue Detected" }.to_string(),
            effective_date: Some(row.effective_date),
            termination_date: row.termination_date,
            pre_auth_required: row.pre_auth_required,
        }),
        plan: query.includes(QueryType::Coverage).then(|| PlanDetails {
            plan_type: row.plan_type.clone(),
            plan_id: row.plan_id.clone(),
            group_number: row.group_number.clone(),
            coverage_level: row.coverage_level.clone(),
        }),
        benefits: query.includes(QueryType::Benefits).then(|| Benefits {
            copay_primary: row.copay_primary,
            copay_specialist: row.copay_specialist,
            deductible_annual: row.deductible_annual,
            deductible_met: row.deductible_met,
            deductible_fully_met: row.deductible_met >= row.deductible_annual,
            max_out_of_pocket: row.max_out_of_pocket,
            oop_met: row.oop_met,
            oop_max_reached: row.oop_met >= row.max_out_of_pocket,
        }),
        member: (query == QueryType::FullProfile).then(|| MemberProfile {
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            date_of_birth: Some(row.date_of_birth),
            gender: row.gender.clone(),
            phone: row.phone.clone(),
            email: row.email.clone(),
            pcp_name: row.pcp_name.clone(),
            pcp_npi: row.pcp_npi.clone(),
        }),
        issues,
    }
}
