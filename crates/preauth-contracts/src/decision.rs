//! Decision vocabulary shared by the criteria matcher and the Decision stage.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::RequestStatus;

/// Flag names raised by the criteria matcher.
pub mod flags {
    pub const AUTO_APPROVE_ELIGIBLE: &str = "AUTO_APPROVE_ELIGIBLE";
    pub const DENIAL_CONDITION_MET: &str = "DENIAL_CONDITION_MET";
    pub const REVIEW_TRIGGER_MET: &str = "REVIEW_TRIGGER_MET";
    pub const POLICY_NOT_FOUND: &str = "POLICY_NOT_FOUND";
}

/// A review outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Deny,
    #[default]
    Review,
}

impl Decision {
    /// The persisted request status this decision maps to.
    pub fn status(&self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Approved,
            Decision::Deny => RequestStatus::Denied,
            Decision::Review => RequestStatus::Review,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Deny => "deny",
            Decision::Review => "review",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much an unmet criterion counts against a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionWeight {
    Critical,
    High,
    Medium,
}

/// The evaluation of one policy criterion against the clinical evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionResult {
    pub criterion: String,
    pub met: bool,
    pub weight: CriterionWeight,
    pub detail: String,
}

/// Met/unmet tallies over a criteria evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scoring {
    pub total_criteria: usize,
    pub criteria_met: usize,
    pub criteria_unmet: usize,
    /// Rounded to one decimal place; 0 when there are no criteria.
    pub match_percentage: f64,
}

impl Scoring {
    pub fn from_results(results: &[CriterionResult]) -> Self {
        let total = results.len();
        let met = results.iter().filter(|r| r.met).count();
        let match_percentage = if total > 0 {
            (met as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            total_criteria: total,
            criteria_met: met,
            criteria_unmet: total - met,
            match_percentage,
        }
    }

    /// Fraction of criteria met in `[0, 1]`.
    pub fn met_fraction(&self) -> f64 {
        if self.total_criteria == 0 {
            0.0
        } else {
            self.criteria_met as f64 / self.total_criteria as f64
        }
    }
}
