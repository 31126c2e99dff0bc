//! Sensing: classify an incoming request.
//!
//! Assigns a review priority, detects the document kind from the document
//! reference, and scores complexity from the diagnosis count and procedure.

use std::collections::BTreeSet;
use std::time::Instant;

use serde_json::json;

use preauth_contracts::{
    error::PreauthResult,
    progress::{StepDescriptor, TraceLevel},
    request::{clean_procedure_code, Priority, Request},
    stage::{Complexity, DocumentKind, SensingOutput},
};

use crate::progress::ProgressCallbacks;
use crate::stages::with_failure_trace;

const CATEGORY: &str = "Sensing Agent";
const AGENT: &str = "PriorAuthSensingAgent-v2";

const DEFAULT_CODES: [&str; 5] = ["93458", "92928", "96413", "27447", "22612"];

/// Procedure code sets that drive priority and complexity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensingRules {
    /// Cleaned codes that are always reviewed at high priority.
    pub urgent_codes: BTreeSet<String>,
    /// Cleaned codes that add 3 to the complexity score.
    pub complex_codes: BTreeSet<String>,
}

impl Default for SensingRules {
    fn default() -> Self {
        let codes: BTreeSet<String> = DEFAULT_CODES.iter().map(|c| c.to_string()).collect();
        Self {
            urgent_codes: codes.clone(),
            complex_codes: codes,
        }
    }
}

pub async fn run(
    request: &Request,
    rules: &SensingRules,
    progress: &ProgressCallbacks,
) -> PreauthResult<SensingOutput> {
    with_failure_trace(progress, CATEGORY, sense(request, rules, progress)).await
}

async fn sense(
    request: &Request,
    rules: &SensingRules,
    progress: &ProgressCallbacks,
) -> PreauthResult<SensingOutput> {
    let started = Instant::now();

    progress
        .on_trace(
            TraceLevel::Info,
            CATEGORY,
            "Prior Auth Sensing Agent activated",
            json!({
                "agent": AGENT,
                "trigger": "Document upload event",
                "source": "API request",
            }),
        )
        .await?;

    let priority = classify_priority(request, rules);
    let document_type = detect_document_type(request.document_url.as_deref());
    let complexity = assess_complexity(request, rules);

    progress
        .on_trace(
            TraceLevel::Success,
            CATEGORY,
            "New prior authorization request detected",
            json!({
                "requestId": request.request_id,
                "provider": request.provider,
                "priority": priority,
                "complexity": complexity,
                "documentType": document_type,
                "nextStep": "Invoke Planning Agent",
            }),
        )
        .await?;

    progress
        .on_step(
            StepDescriptor::completed(
                "Prior Auth Sensing Agent",
                "Sensing agent detects and classifies incoming request",
            )
            .with_details([
                "New request detected and classified".to_string(),
                format!("Document type: {}", document_type.as_str()),
                format!("Priority assessed: {priority}"),
                format!("Complexity: {}", complexity.as_str()),
            ]),
        )
        .await?;

    Ok(SensingOutput {
        request_id: request.request_id.clone(),
        priority,
        document_type,
        complexity,
        document_url: request.document_url.clone(),
        processing_time_ms: started.elapsed().as_millis() as u64,
    })
}

/// High for urgent procedures or requests already marked high, else medium.
pub fn classify_priority(request: &Request, rules: &SensingRules) -> Priority {
    let code = clean_procedure_code(&request.procedure_code);
    if rules.urgent_codes.contains(&code) || request.priority == Priority::High {
        Priority::High
    } else {
        Priority::Medium
    }
}

pub fn detect_document_type(document_url: Option<&str>) -> DocumentKind {
    match document_url {
        None => DocumentKind::Unknown,
        Some(url) if url.ends_with(".pdf") => DocumentKind::ClinicalPdf,
        Some(url) if url.ends_with(".jpg") || url.ends_with(".png") => DocumentKind::ScannedImage,
        Some(_) => DocumentKind::ElectronicSubmission,
    }
}

pub fn assess_complexity(request: &Request, rules: &SensingRules) -> Complexity {
    let mut score = 0;
    let diagnoses = request.diagnosis_codes.len();
    if diagnoses > 2 {
        score += 2;
    }
    if diagnoses > 0 {
        score += 1;
    }
    if rules
        .complex_codes
        .contains(&clean_procedure_code(&request.procedure_code))
    {
        score += 3;
    }

    match score {
        s if s >= 4 => Complexity::High,
        s if s >= 2 => Complexity::Medium,
        _ => Complexity::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_request, MemoryStores};
    use crate::{FixedRandom, NoopUpdates};
    use std::sync::Arc;

    fn request(code: &str, diagnoses: &[&str]) -> Request {
        let mut req = sample_request("PA-1");
        req.procedure_code = code.to_string();
        req.diagnosis_codes = diagnoses.iter().map(|d| d.to_string()).collect();
        req
    }

    #[test]
    fn urgent_code_is_high_priority() {
        let rules = SensingRules::default();
        assert_eq!(classify_priority(&request("CPT-27447", &[]), &rules), Priority::High);
        assert_eq!(classify_priority(&request("70553", &[]), &rules), Priority::Medium);
    }

    #[test]
    fn submitted_high_priority_is_kept() {
        let mut req = request("70553", &[]);
        req.priority = Priority::High;
        assert_eq!(classify_priority(&req, &SensingRules::default()), Priority::High);
    }

    #[test]
    fn low_priority_submission_is_raised_to_medium() {
        let mut req = request("70553", &[]);
        req.priority = Priority::Low;
        assert_eq!(classify_priority(&req, &SensingRules::default()), Priority::Medium);
    }

    #[test]
    fn document_type_from_extension() {
        assert_eq!(detect_document_type(None), DocumentKind::Unknown);
        assert_eq!(detect_document_type(Some("/d/a.pdf")), DocumentKind::ClinicalPdf);
        assert_eq!(detect_document_type(Some("/d/a.jpg")), DocumentKind::ScannedImage);
        assert_eq!(detect_document_type(Some("/d/a.png")), DocumentKind::ScannedImage);
        assert_eq!(
            detect_document_type(Some("hl7://feed/123")),
            DocumentKind::ElectronicSubmission
        );
    }

    #[test]
    fn complexity_scoring() {
        let rules = SensingRules::default();
        // 3 (complex) + 1 (any diagnosis) = 4
        assert_eq!(assess_complexity(&request("27447", &["M17.11"]), &rules), Complexity::High);
        // 2 (>2 diagnoses) + 1 = 3
        assert_eq!(
            assess_complexity(&request("70553", &["A", "B", "C"]), &rules),
            Complexity::Medium
        );
        assert_eq!(assess_complexity(&request("70553", &["A"]), &rules), Complexity::Low);
        assert_eq!(assess_complexity(&request("70553", &[]), &rules), Complexity::Low);
        // 3 alone is medium
        assert_eq!(assess_complexity(&request("HCPCS-22612", &[]), &rules), Complexity::Medium);
    }

    #[test]
    fn custom_rules_replace_defaults() {
        let rules = SensingRules {
            urgent_codes: BTreeSet::from(["E0601".to_string()]),
            complex_codes: BTreeSet::new(),
        };
        assert_eq!(classify_priority(&request("HCPCS-E0601", &[]), &rules), Priority::High);
        assert_eq!(classify_priority(&request("27447", &[]), &rules), Priority::Medium);
        assert_eq!(assess_complexity(&request("27447", &["M17.11"]), &rules), Complexity::Low);
    }

    #[tokio::test]
    async fn run_traces_and_records_one_step() {
        let stores = Arc::new(MemoryStores::default());
        let progress = ProgressCallbacks::new(
            "PA-1",
            stores.clone(),
            stores.clone(),
            Arc::new(NoopUpdates),
            Arc::new(FixedRandom(0.5)),
        );

        let out = run(&request("CPT-27447", &["M17.11"]), &SensingRules::default(), &progress)
            .await
            .unwrap();

        assert_eq!(out.priority, Priority::High);
        assert_eq!(out.document_type, DocumentKind::ClinicalPdf);
        let traces = stores.traces_for("PA-1");
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].level, TraceLevel::Info);
        assert_eq!(traces[1].level, TraceLevel::Success);
        assert_eq!(stores.steps_for("PA-1").len(), 1);
    }
}
