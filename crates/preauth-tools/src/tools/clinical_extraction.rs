//! `clinical-data-extraction`: coded clinical facts from processed documents.
//!
//! Demographics and codes come from the request context first and fall back
//! to the document's form fields. The procedure code is validated against
//! the coverage catalog.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use preauth_config::{CoverageCatalog, LatencyRange};
use preauth_contracts::{
    error::PreauthResult,
    outputs::{
        ClinicalExtraction, ClinicalFindings, CodeValidation, CodedDiagnosis, CodedProcedure,
        ConservativeTreatment, PatientDemographics,
    },
    request::clean_procedure_code,
    tool::tool_names,
};
use preauth_core::{traits::Tool, RandomSource};

use super::{encode_output, jittered_confidence, parse_params, simulate_latency};

const NLP_ENGINE: &str = "ClinicalNER-v4.1";
/// Entities counted for a populated clinical findings block.
const FINDINGS_ENTITY_COUNT: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Input {
    document_data: Value,
    #[serde(default = "default_extraction_type")]
    extraction_type: String,
    #[serde(default)]
    request_context: RequestContext,
}

fn default_extraction_type() -> String {
    "all".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RequestContext {
    procedure_code: Option<String>,
    procedure_name: Option<String>,
    diagnosis_codes: Vec<String>,
    member_id: Option<String>,
    patient_name: Option<String>,
    patient_dob: Option<String>,
    provider: Option<String>,
    provider_npi: Option<String>,
}

pub struct ClinicalExtractionTool {
    catalog: Arc<CoverageCatalog>,
    latency: LatencyRange,
    rng: Arc<dyn RandomSource>,
}

impl ClinicalExtractionTool {
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

    fn extract(&self, input: &Input) -> ClinicalExtraction {
        let wants = |section: &str| input.extraction_type == "all" || input.extraction_type == section;
        let ctx = &input.request_context;

        let mut out = ClinicalExtraction {
            extraction_type: input.extraction_type.clone(),
            timestamp: Some(Utc::now()),
            nlp_engine: NLP_ENGINE.to_string(),
            ..ClinicalExtraction::default()
        };

        if wants("patient-demographics") {
            out.patient = Some(demographics(&input.document_data, ctx));
        }

        let raw_code = ctx.procedure_code.clone().unwrap_or_default();
        let clean_code = clean_procedure_code(&raw_code);
        let matched_policy = self.catalog.by_procedure_code(&clean_code).into_iter().next();

        if wants("medical-codes") {
            out.procedure_codes = vec![CodedProcedure {
                system: coding_system(&raw_code).to_string(),
                code: raw_code,
                description: ctx.procedure_name.clone().unwrap_or_default(),
                confidence: 0.97,
                validated: true,
            }];
            out.diagnosis_codes = ctx
                .diagnosis_codes
                .iter()
                .enumerate()
                .map(|(i, code)| CodedDiagnosis {
                    code: code.clone(),
                    system: "ICD-10-CM".to_string(),
                    description: String::new(),
                    is_primary: i == 0,
                    confidence: super::round_to(0.95 - i as f64 * 0.02, 3),
                    validated: true,
                })
                .collect();
            out.code_validation = Some(CodeValidation {
                procedure_code_found: matched_policy.is_some(),
                matching_policy: matched_policy.map(|p| p.policy_id.clone()),
                matching_policy_title: matched_policy.map(|p| p.title.clone()),
            });
        }

        if wants("clinical-findings") {
            let treatments = matched_policy
                .and_then(|p| p.conservative_treatment.as_ref())
                .map(|t| t.treatments.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| vec!["Extracted from treatment history section".to_string()]);
            out.clinical_findings = Some(ClinicalFindings {
                chief_complaint: "Extracted from clinical notes section".to_string(),
                history_of_present_illness: "Progressive symptoms documented".to_string(),
                assessment: "Clinical assessment extracted from SOAP note".to_string(),
                plan: "Treatment plan documented".to_string(),
                conservative_treatment: ConservativeTreatment {
                    documented: true,
                    treatments,
                },
                documented_criteria: matched_policy
                    .map(|p| p.medical_necessity_criteria.clone())
                    .unwrap_or_default(),
                confidence: 0.88,
            });
        }

        out.extraction_confidence = jittered_confidence(self.rng.as_ref(), 0.92, 0.06);
        out.entities_extracted = count_entities(&out);
        out
    }
}

#[async_trait]
impl Tool for ClinicalExtractionTool {
    fn name(&self) -> &str {
        tool_names::CLINICAL_EXTRACTION
    }

    fn description(&self) -> &str {
        "Extracts patient demographics, CPT/HCPCS and ICD-10 codes, and clinical findings \
         from processed documents, validating the procedure code against coverage policy."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "documentData": { "type": "object", "description": "Output of intelligent-document-processing" },
                "extractionType": {
                    "type": "string",
                    "enum": ["all", "patient-demographics", "medical-codes", "clinical-findings"],
                    "default": "all",
                },
                "requestContext": { "type": "object", "description": "Fields from the originating request" },
            },
            "required": ["documentData"],
        })
    }

    async fn execute(&self, params: Value) -> PreauthResult<Value> {
        let input: Input = parse_params(self.name(), params)?;
        simulate_latency(self.latency, self.rng.as_ref()).await;
        let output = self.extract(&input);
        encode_output(self.name(), &output)
    }
}

fn demographics(document: &Value, ctx: &RequestContext) -> PatientDemographics {
    let field = |name: &str| {
        document
            .pointer(&format!("/formFields/{name}/value"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let pick = |ctx_value: &Option<String>, form_field: &str| {
        ctx_value
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| field(form_field))
    };

    PatientDemographics {
        name: pick(&ctx.patient_name, "patientName"),
        date_of_birth: pick(&ctx.patient_dob, "dateOfBirth"),
        member_id: pick(&ctx.member_id, "memberId"),
        provider: pick(&ctx.provider, "providerName"),
        provider_npi: pick(&ctx.provider_npi, "providerNPI"),
        confidence: 0.96,
    }
}

/// HCPCS Level II codes start with a letter; everything else is CPT.
fn coding_system(raw_code: &str) -> &'static str {
    let clean = clean_procedure_code(raw_code);
    let alphabetic = clean.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if raw_code.starts_with("HCPCS") || alphabetic {
        "HCPCS"
    } else {
        "CPT"
    }
}

fn count_entities(out: &ClinicalExtraction) -> usize {
    let patient_fields = if out.patient.is_some() { 6 } else { 0 };
    let findings = if out.clinical_findings.is_some() {
        FINDINGS_ENTITY_COUNT
    } else {
        0
    };
    patient_fields + out.procedure_codes.len() + out.diagnosis_codes.len() + findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use preauth_core::FixedRandom;

    fn tool() -> ClinicalExtractionTool {
        ClinicalExtractionTool::new(
            Arc::new(CoverageCatalog::bundled().unwrap()),
            LatencyRange::ZERO,
            Arc::new(FixedRandom(0.0)),
        )
    }

    fn tka_params() -> Value {
        json!({
            "documentData": { "documentId": "PA-2026-0409", "formFields": {} },
            "extractionType": "all",
            "requestContext": {
                "procedureCode": "CPT-27447",
                "procedureName": "Total Knee Arthroplasty - Right",
                "diagnosisCodes": ["M17.11", "M17.12"],
                "memberId": "MEM-100004",
                "patientName": "Maria Garcia",
                "patientDob": "1968-04-10",
                "provider": "Springfield Orthopedic Center",
                "providerNpi": "1234567104",
            },
        })
    }

    #[tokio::test]
    async fn full_extraction_for_knee_replacement() {
        let out: ClinicalExtraction =
            serde_json::from_value(tool().execute(tka_params()).await.unwrap()).unwrap();

        let patient = out.patient.as_ref().unwrap();
        assert_eq!(patient.name, "Maria Garcia");
        assert_eq!(patient.member_id, "MEM-100004");

        assert_eq!(out.procedure_codes[0].system, "CPT");
        assert_eq!(out.procedure_codes[0].code, "CPT-27447");
        assert_eq!(out.diagnosis_codes.len(), 2);
        assert!(out.diagnosis_codes[0].is_primary);
        assert!(!out.diagnosis_codes[1].is_primary);
        assert!((out.diagnosis_codes[1].confidence - 0.93).abs() < 1e-9);

        let validation = out.code_validation.as_ref().unwrap();
        assert!(validation.procedure_code_found);
        assert_eq!(validation.matching_policy.as_deref(), Some("NCD-150.4"));

        let findings = out.clinical_findings.as_ref().unwrap();
        assert!(findings.conservative_treatment.documented);
        assert!(findings
            .conservative_treatment
            .treatments
            .contains(&"Physical therapy".to_string()));
        assert_eq!(findings.documented_criteria.len(), 4);

        assert!((out.extraction_confidence - 0.92).abs() < 1e-9);
        // 6 demographic fields + 1 procedure + 2 diagnoses + 5 findings
        assert_eq!(out.entities_extracted, 14);
    }

    #[tokio::test]
    async fn demographics_fall_back_to_form_fields() {
        let params = json!({
            "documentData": {
                "formFields": {
                    "patientName": { "value": "From Form" },
                    "memberId": { "value": "MEM-FORM" },
                },
            },
            "extractionType": "patient-demographics",
        });
        let out: ClinicalExtraction =
            serde_json::from_value(tool().execute(params).await.unwrap()).unwrap();
        let patient = out.patient.unwrap();
        assert_eq!(patient.name, "From Form");
        assert_eq!(patient.member_id, "MEM-FORM");
        assert!(out.procedure_codes.is_empty());
        assert!(out.clinical_findings.is_none());
        assert_eq!(out.entities_extracted, 6);
    }

    #[tokio::test]
    async fn unknown_procedure_is_not_validated() {
        let params = json!({
            "documentData": {},
            "extractionType": "medical-codes",
            "requestContext": { "procedureCode": "HCPCS-Z9999", "diagnosisCodes": [] },
        });
        let out: ClinicalExtraction =
            serde_json::from_value(tool().execute(params).await.unwrap()).unwrap();
        assert_eq!(out.procedure_codes[0].system, "HCPCS");
        let validation = out.code_validation.unwrap();
        assert!(!validation.procedure_code_found);
        assert!(validation.matching_policy.is_none());
    }

    #[test]
    fn coding_systems() {
        assert_eq!(coding_system("CPT-27447"), "CPT");
        assert_eq!(coding_system("27447"), "CPT");
        assert_eq!(coding_system("HCPCS-E0601"), "HCPCS");
        assert_eq!(coding_system("E0601"), "HCPCS");
    }
}
