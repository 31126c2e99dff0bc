//! Reference data the eligibility and claims tools read.
//!
//! `ReferenceData` stands in for the member and claims systems of record.
//! The crate ships `MockReferenceData`; a deployment would back the trait
//! with its own databases.

use async_trait::async_trait;
use chrono::NaiveDate;

use preauth_contracts::error::PreauthResult;

/// A member row as held by the eligibility system.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    pub member_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub phone: String,
    pub email: String,
    pub plan_type: String,
    pub plan_id: String,
    pub group_number: String,
    pub effective_date: NaiveDate,
    pub termination_date: Option<NaiveDate>,
    pub coverage_level: String,
    pub copay_primary: f64,
    pub copay_specialist: f64,
    pub deductible_annual: f64,
    pub deductible_met: f64,
    pub max_out_of_pocket: f64,
    pub oop_met: f64,
    pub is_active: bool,
    pub pre_auth_required: bool,
    pub pcp_name: String,
    pub pcp_npi: String,
}

/// A single adjudicated claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRecord {
    pub claim_id: String,
    pub member_id: String,
    pub service_date: NaiveDate,
    pub provider_name: String,
    pub facility_name: String,
    pub cpt_code: String,
    pub cpt_description: String,
    pub icd10_codes: Vec<String>,
    pub billed_amount: f64,
    pub paid_amount: f64,
    pub patient_responsibility: f64,
    /// `paid`, `denied`, or `pending`.
    pub claim_status: String,
    pub denial_reason: Option<String>,
    pub service_type: String,
    pub auth_number: Option<String>,
}

impl ClaimRecord {
    pub fn is_paid(&self) -> bool {
        self.claim_status == "paid"
    }

    pub fn is_denied(&self) -> bool {
        self.claim_status == "denied"
    }
}

/// Read access to member and claims systems.
#[async_trait]
pub trait ReferenceData: Send + Sync {
    async fn member(&self, member_id: &str) -> PreauthResult<Option<MemberRecord>>;

    /// Claims for `member_id` with `from <= service_date <= to`, newest first.
    async fn claims_between(
        &self,
        member_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PreauthResult<Vec<ClaimRecord>>;
}
