//! `ncd-guidelines-search`: rank coverage policies for a procedure.
//!
//! Candidates are the policies listing the procedure code. When none do, the
//! search falls back to policies sharing a diagnosis code. Each candidate is
//! scored and the list is sorted highest first; ties keep catalog order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use preauth_config::{CoverageCatalog, CoveragePolicy, LatencyRange};
use preauth_contracts::{
    error::PreauthResult,
    outputs::{PolicySearchResult, RankedPolicy, SearchQuery},
    request::clean_procedure_code,
    tool::tool_names,
};
use preauth_core::{traits::Tool, RandomSource};

use super::{encode_output, parse_params, simulate_latency};

const SEARCH_ENGINE: &str = "PolicySearch-v2.1";

const PROCEDURE_MATCH_SCORE: u32 = 50;
const DIAGNOSIS_MATCH_SCORE: u32 = 20;
const ACTIVE_POLICY_SCORE: u32 = 10;
const TITLE_KEYWORD_SCORE: u32 = 5;
const MAX_SCORE: u32 = 100;

fn default_policy_type() -> String {
    "all".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Input {
    procedure_code: String,
    #[serde(default)]
    diagnosis_codes: Vec<String>,
    #[serde(default)]
    query_text: Option<String>,
    #[serde(default = "default_policy_type")]
    policy_type: String,
    #[serde(default)]
    as_of_date: Option<NaiveDate>,
}

pub struct PolicySearchTool {
    catalog: Arc<CoverageCatalog>,
    latency: LatencyRange,
    rng: Arc<dyn RandomSource>,
}

impl PolicySearchTool {
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

    fn search(&self, input: &Input) -> PolicySearchResult {
        let code = clean_procedure_code(&input.procedure_code);
        let as_of = input.as_of_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut candidates = self.catalog.by_procedure_code(&code);
        if candidates.is_empty() {
            candidates = self.catalog.by_diagnosis_overlap(&input.diagnosis_codes);
        }
        if !input.policy_type.eq_ignore_ascii_case("all") {
            candidates.retain(|p| p.policy_type.eq_ignore_ascii_case(&input.policy_type));
        }

        let keywords: Vec<String> = input
            .query_text
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let mut ranked: Vec<RankedPolicy> = candidates
            .into_iter()
            .map(|p| {
                let score = relevance(p, &code, &input.diagnosis_codes, &keywords, as_of);
                ranked_policy(p, score)
            })
            .collect();
        // Stable: equal scores stay in catalog order.
        ranked.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

        let mut criteria = Vec::new();
        let mut documentation = Vec::new();
        for policy in &ranked {
            extend_unique(&mut criteria, &policy.medical_necessity_criteria);
            extend_unique(&mut documentation, &policy.required_documentation);
        }

        debug!(procedure_code = %code, matches = ranked.len(), "policy search complete");

        PolicySearchResult {
            search_query: SearchQuery {
                procedure_code: code,
                diagnosis_codes: input.diagnosis_codes.clone(),
                query_text: input.query_text.clone(),
                policy_type: input.policy_type.clone(),
            },
            total_matches: ranked.len(),
            policies: ranked,
            medical_necessity_criteria: criteria,
            required_documentation: documentation,
            search_engine: SEARCH_ENGINE.to_string(),
        }
    }
}

#[async_trait]
impl Tool for PolicySearchTool {
    fn name(&self) -> &str {
        tool_names::POLICY_SEARCH
    }

    fn description(&self) -> &str {
        "Searches National and Local Coverage Determinations for policies covering a \
         procedure, ranked by relevance to the procedure and diagnosis codes."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "procedureCode": { "type": "string" },
                "diagnosisCodes": { "type": "array", "items": { "type": "string" } },
                "queryText": { "type": "string" },
                "policyType": { "type": "string", "enum": ["NCD", "LCD", "all"], "default": "all" },
                "asOfDate": { "type": "string", "format": "date" },
            },
            "required": ["procedureCode"],
        })
    }

    async fn execute(&self, params: Value) -> PreauthResult<Value> {
        let input: Input = parse_params(self.name(), params)?;
        simulate_latency(self.latency, self.rng.as_ref()).await;
        let output = self.search(&input);
        encode_output(self.name(), &output)
    }
}

fn relevance(
    policy: &CoveragePolicy,
    code: &str,
    diagnosis_codes: &[String],
    keywords: &[String],
    as_of: NaiveDate,
) -> u32 {
    let mut score = 0;
    if policy.covers_procedure(code) {
        score += PROCEDURE_MATCH_SCORE;
    }
    score += DIAGNOSIS_MATCH_SCORE * policy.diagnosis_overlap(diagnosis_codes) as u32;
    if policy.is_active_on(as_of) {
        score += ACTIVE_POLICY_SCORE;
    }
    let title = policy.title.to_lowercase();
    score += TITLE_KEYWORD_SCORE * keywords.iter().filter(|w| title.contains(w.as_str())).count() as u32;
    score.min(MAX_SCORE)
}

fn ranked_policy(p: &CoveragePolicy, score: u32) -> RankedPolicy {
    RankedPolicy {
        policy_id: p.policy_id.clone(),
        policy_type: p.policy_type.clone(),
        title: p.title.clone(),
        relevance_score: score,
        procedure_codes: p.procedure_codes.clone(),
        diagnosis_codes: p.diagnosis_codes.clone(),
        effective_date: p.effective_date,
        medical_necessity_criteria: p.medical_necessity_criteria.clone(),
        required_documentation: p.required_documentation.clone(),
        auto_approve: p.auto_approve,
        denial_conditions: p.denial_conditions.clone(),
        review_triggers: p.review_triggers.clone(),
        conservative_treatment_required: p.conservative_treatment_required,
    }
}

fn extend_unique(into: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preauth_core::FixedRandom;

    fn tool() -> PolicySearchTool {
        PolicySearchTool::new(
            Arc::new(CoverageCatalog::bundled().unwrap()),
            LatencyRange::ZERO,
            Arc::new(FixedRandom(0.0)),
        )
    }

    async fn search(params: Value) -> PolicySearchResult {
        serde_json::from_value(tool().execute(params).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn knee_replacement_finds_tka_policy() {
        let out = search(json!({
            "procedureCode": "CPT-27447",
            "diagnosisCodes": ["M17.11"],
            "asOfDate": "2026-02-04",
        }))
        .await;
        assert_eq!(out.total_matches, 1);
        let top = out.top_policy().unwrap();
        assert_eq!(top.policy_id, "NCD-150.4");
        // procedure + one diagnosis + active
        assert_eq!(top.relevance_score, 80);
        assert_eq!(out.search_query.procedure_code, "27447");
        assert_eq!(out.medical_necessity_criteria.len(), 4);
        assert_eq!(out.required_documentation.len(), 5);
        assert_eq!(out.search_engine, SEARCH_ENGINE);
    }

    #[tokio::test]
    async fn shared_procedure_code_is_ranked_by_diagnosis() {
        let out = search(json!({
            "procedureCode": "97530",
            "diagnosisCodes": ["I63.9", "G81.90"],
            "asOfDate": "2026-02-04",
        }))
        .await;
        let ids: Vec<&str> = out.policies.iter().map(|p| p.policy_id.as_str()).collect();
        assert_eq!(ids, vec!["LCD-041", "LCD-032"]);
        assert_eq!(out.policies[0].relevance_score, 100);
        assert_eq!(out.policies[1].relevance_score, 60);
    }

    #[tokio::test]
    async fn ties_keep_catalog_order() {
        let out = search(json!({ "procedureCode": "97530", "asOfDate": "2026-02-04" })).await;
        let ids: Vec<&str> = out.policies.iter().map(|p| p.policy_id.as_str()).collect();
        assert_eq!(ids, vec!["LCD-032", "LCD-041"]);
    }

    #[tokio::test]
    async fn falls_back_to_diagnosis_overlap() {
        let out = search(json!({
            "procedureCode": "CPT-99999",
            "diagnosisCodes": ["G47.33"],
            "asOfDate": "2026-02-04",
        }))
        .await;
        let ids: Vec<&str> = out.policies.iter().map(|p| p.policy_id.as_str()).collect();
        assert_eq!(ids, vec!["LCD-067", "LCD-090"]);
        assert!(out.policies.iter().all(|p| p.relevance_score == 30));
    }

    #[tokio::test]
    async fn policy_type_filter_and_keywords() {
        let out = search(json!({
            "procedureCode": "CPT-99999",
            "diagnosisCodes": ["I25.10"],
            "policyType": "NCD",
            "queryText": "coronary  stent",
            "asOfDate": "2026-02-04",
        }))
        .await;
        let ids: Vec<&str> = out.policies.iter().map(|p| p.policy_id.as_str()).collect();
        // LCD-078 is filtered out; the stent title earns the keyword bonus.
        assert_eq!(ids, vec!["NCD-020.7", "NCD-220.1"]);
        assert_eq!(out.policies[0].relevance_score, 40);
        assert_eq!(out.policies[1].relevance_score, 30);
    }

    #[tokio::test]
    async fn no_match_is_empty() {
        let out = search(json!({ "procedureCode": "CPT-00000" })).await;
        assert_eq!(out.total_matches, 0);
        assert!(out.top_policy().is_none());
        assert!(out.medical_necessity_criteria.is_empty());
    }

    #[tokio::test]
    async fn procedure_code_is_required() {
        assert!(tool().execute(json!({ "diagnosisCodes": [] })).await.is_err());
    }
}
