//! Coverage policy catalog.
//!
//! A `CoverageCatalog` is deserialized from TOML and holds the national and
//! local coverage determinations the search and matching tools consult.
//! Policies keep their declaration order; lookups by procedure code return
//! them in that order.
//!
//! Example entry:
//! ```toml
//! [[policies]]
//! policy_id = "NCD-150.4"
//! policy_type = "NCD"
//! title = "Total Knee Arthroplasty (TKA)"
//! procedure_codes = ["27447", "27446"]
//! diagnosis_codes = ["M17.11"]
//! effective_date = "2024-01-01"
//! conservative_treatment_required = true
//!
//! [policies.conservative_treatment]
//! min_duration = "3 months"
//! treatments = ["Physical therapy"]
//! ```

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use preauth_contracts::error::{PreauthError, PreauthResult};

const BUNDLED_CATALOG: &str = include_str!("../../../policies/coverage.toml");

/// Conservative treatment a policy expects before the procedure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConservativeTreatment {
    /// Free text, e.g. `"3 months"` or `"Sleep study required first"`.
    pub min_duration: Option<String>,
    pub treatments: Vec<String>,
}

/// A single coverage policy loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoveragePolicy {
    pub policy_id: String,
    /// `NCD` or `LCD`.
    pub policy_type: String,
    pub title: String,
    pub procedure_codes: Vec<String>,
    #[serde(default)]
    pub diagnosis_codes: Vec<String>,
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub termination_date: Option<NaiveDate>,
    #[serde(default)]
    pub medical_necessity_criteria: Vec<String>,
    #[serde(default)]
    pub required_documentation: Vec<String>,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default)]
    pub approval_conditions: Vec<String>,
    #[serde(default)]
    pub denial_conditions: Vec<String>,
    #[serde(default)]
    pub review_triggers: Vec<String>,
    #[serde(default)]
    pub conservative_treatment_required: bool,
    #[serde(default)]
    pub conservative_treatment: Option<ConservativeTreatment>,
}

impl CoveragePolicy {
    /// True if the policy is in force on `date`.
    ///
    /// A missing effective date means "always effective"; a missing
    /// termination date means "never terminates".
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        let started = self.effective_date.map_or(true, |d| d <= date);
        let not_ended = self.termination_date.map_or(true, |d| d > date);
        started && not_ended
    }

    pub fn covers_procedure(&self, code: &str) -> bool {
        self.procedure_codes.iter().any(|c| c == code)
    }

    /// Number of `codes` that appear in this policy's diagnosis list.
    pub fn diagnosis_overlap(&self, codes: &[String]) -> usize {
        codes
            .iter()
            .filter(|code| self.diagnosis_codes.contains(code))
            .count()
    }

    pub fn conservative_min_duration(&self) -> Option<&str> {
        self.conservative_treatment
            .as_ref()
            .and_then(|t| t.min_duration.as_deref())
    }
}

/// Ordered set of coverage policies, unique by `policy_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageCatalog {
    #[serde(default)]
    policies: Vec<CoveragePolicy>,
}

impl CoverageCatalog {
    /// Parse `s` as a TOML policy catalog.
    ///
    /// Returns `PreauthError::Config` if the TOML is malformed, does not match
    /// the `CoverageCatalog` schema, or declares a `policy_id` twice.
    pub fn from_toml_str(s: &str) -> PreauthResult<Self> {
        let catalog: CoverageCatalog = toml::from_str(s).map_err(|e| PreauthError::Config {
            reason: format!("failed to parse coverage catalog TOML: {}", e),
        })?;

        let mut seen = HashSet::new();
        for policy in &catalog.policies {
            if !seen.insert(policy.policy_id.as_str()) {
                return Err(PreauthError::Config {
                    reason: format!("duplicate policy_id '{}' in catalog", policy.policy_id),
                });
            }
        }

        debug!(policies = catalog.policies.len(), "coverage catalog loaded");
        Ok(catalog)
    }

    /// Read the file at `path` and parse it as a coverage catalog.
    pub fn from_file(path: &Path) -> PreauthResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PreauthError::Config {
            reason: format!("failed to read catalog file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The catalog shipped in `policies/coverage.toml`.
    pub fn bundled() -> PreauthResult<Self> {
        Self::from_toml_str(BUNDLED_CATALOG)
    }

    pub fn from_policies(policies: Vec<CoveragePolicy>) -> Self {
        Self { policies }
    }

    pub fn policies(&self) -> &[CoveragePolicy] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn get(&self, policy_id: &str) -> Option<&CoveragePolicy> {
        self.policies.iter().find(|p| p.policy_id == policy_id)
    }

    /// Policies listing `code` among their procedure codes.
    pub fn by_procedure_code(&self, code: &str) -> Vec<&CoveragePolicy> {
        self.policies
            .iter()
            .filter(|p| p.covers_procedure(code))
            .collect()
    }

    /// Policies sharing at least one diagnosis code with `codes`.
    pub fn by_diagnosis_overlap(&self, codes: &[String]) -> Vec<&CoveragePolicy> {
        self.policies
            .iter()
            .filter(|p| p.diagnosis_overlap(codes) > 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn bundled_catalog_loads() {
        let catalog = CoverageCatalog::bundled().unwrap();
        assert_eq!(catalog.len(), 15);

        let tka = catalog.get("NCD-150.4").unwrap();
        assert_eq!(tka.policy_type, "NCD");
        assert!(tka.covers_procedure("27447"));
        assert!(!tka.auto_approve);
        assert!(tka.conservative_treatment_required);
        assert_eq!(tka.conservative_min_duration(), Some("3 months"));
        assert_eq!(tka.medical_necessity_criteria.len(), 4);
        assert_eq!(tka.required_documentation.len(), 5);
    }

    #[test]
    fn procedure_lookup_keeps_declaration_order() {
        let catalog = CoverageCatalog::bundled().unwrap();
        // 97530 is listed by both physical therapy and rehabilitation.
        let ids: Vec<&str> = catalog
            .by_procedure_code("97530")
            .iter()
            .map(|p| p.policy_id.as_str())
            .collect();
        assert_eq!(ids, vec!["LCD-032", "LCD-041"]);
        assert!(catalog.by_procedure_code("00000").is_empty());
    }

    #[test]
    fn diagnosis_overlap_counts_shared_codes() {
        let catalog = CoverageCatalog::bundled().unwrap();
        let ecg = catalog.get("NCD-220.1").unwrap();
        let codes = vec!["I50.9".to_string(), "E11.9".to_string(), "Z00.0".to_string()];
        assert_eq!(ecg.diagnosis_overlap(&codes), 2);
        assert!(catalog
            .by_diagnosis_overlap(&["M17.11".to_string()])
            .iter()
            .any(|p| p.policy_id == "NCD-150.4"));
    }

    #[test]
    fn activity_window() {
        let toml = r#"
[[policies]]
policy_id = "LCD-900"
policy_type = "LCD"
title = "Retired policy"
procedure_codes = ["99999"]
effective_date = "2020-01-01"
termination_date = "2023-01-01"
"#;
        let catalog = CoverageCatalog::from_toml_str(toml).unwrap();
        let policy = catalog.get("LCD-900").unwrap();
        assert!(!policy.is_active_on(date("2019-12-31")));
        assert!(policy.is_active_on(date("2022-06-30")));
        assert!(!policy.is_active_on(date("2023-01-01")));
        assert!(policy.medical_necessity_criteria.is_empty());
        assert!(policy.conservative_treatment.is_none());
    }

    #[test]
    fn duplicate_policy_ids_are_rejected() {
        let toml = r#"
[[policies]]
policy_id = "NCD-1"
policy_type = "NCD"
title = "First"
procedure_codes = ["1"]

[[policies]]
policy_id = "NCD-1"
policy_type = "NCD"
title = "Second"
procedure_codes = ["2"]
"#;
        let err = CoverageCatalog::from_toml_str(toml).unwrap_err();
        match err {
            PreauthError::Config { reason } => assert!(reason.contains("NCD-1")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn missing_required_field_is_a_config_error() {
        let toml = "[[policies]]\npolicy_id = \"X\"\n";
        assert!(matches!(
            CoverageCatalog::from_toml_str(toml),
            Err(PreauthError::Config { .. })
        ));
    }

    #[test]
    fn empty_catalog() {
        let catalog = CoverageCatalog::from_toml_str("").unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.get("NCD-150.4").is_none());
    }
}
