//! # preauth-tools
//!
//! The six prior authorization review tools and the simulated systems of
//! record they read from.
//!
//! | Tool | Reads |
//! |------|-------|
//! | `intelligent-document-processing` | the document path |
//! | `clinical-data-extraction` | the coverage catalog |
//! | `member-eligibility-lookup` | [`ReferenceData`] |
//! | `claims-history-retrieval` | [`ReferenceData`] |
//! | `ncd-guidelines-search` | the coverage catalog |
//! | `policy-criteria-matching` | the coverage catalog |
//!
//! All member, claims, and request data in [`mock_data`] is hardcoded and
//! fictional. No external calls are made.

pub mod mock_data;
pub mod reference;
pub mod tools;

use std::sync::Arc;

use preauth_config::{CoverageCatalog, LatencySettings, PipelineConfig};
use preauth_contracts::{error::PreauthResult, tool::tool_names};
use preauth_core::{traits::Tool, RandomSource};
use preauth_registry::ToolRegistry;
use tracing::info;

pub use mock_data::{sample_requests, MockReferenceData};
pub use reference::{ClaimRecord, MemberRecord, ReferenceData};
pub use tools::{
    ClaimsHistoryTool, ClinicalExtractionTool, CriteriaMatchingTool, DocumentProcessingTool,
    MemberEligibilityTool, PolicySearchTool,
};

/// Shared dependencies for building the tool set.
#[derive(Clone)]
pub struct ToolContext {
    pub catalog: Arc<CoverageCatalog>,
    pub data: Arc<dyn ReferenceData>,
    pub latency: LatencySettings,
    pub rng: Arc<dyn RandomSource>,
}

impl ToolContext {
    /// A context with the default simulated latencies.
    pub fn new(
        catalog: Arc<CoverageCatalog>,
        data: Arc<dyn ReferenceData>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            catalog,
            data,
            latency: LatencySettings::default(),
            rng,
        }
    }

    /// Latency and randomness taken from `config`.
    pub fn from_config(
        config: &PipelineConfig,
        catalog: Arc<CoverageCatalog>,
        data: Arc<dyn ReferenceData>,
    ) -> Self {
        Self {
            catalog,
            data,
            latency: config.latency.clone(),
            rng: config.random_source(),
        }
    }

    pub fn with_latency(mut self, latency: LatencySettings) -> Self {
        self.latency = latency;
        self
    }
}

/// One instance of each tool, in pipeline order.
pub fn default_tools(ctx: &ToolContext) -> Vec<Arc<dyn Tool>> {
    let latency = |name: &str| ctx.latency.for_tool(name);
    vec![
        Arc::new(DocumentProcessingTool::new(
            latency(tool_names::DOCUMENT_PROCESSING),
            ctx.rng.clone(),
        )),
        Arc::new(ClinicalExtractionTool::new(
            ctx.catalog.clone(),
            latency(tool_names::CLINICAL_EXTRACTION),
            ctx.rng.clone(),
        )),
        Arc::new(MemberEligibilityTool::new(
            ctx.data.clone(),
            latency(tool_names::MEMBER_ELIGIBILITY),
            ctx.rng.clone(),
        )),
        Arc::new(ClaimsHistoryTool::new(
            ctx.data.clone(),
            latency(tool_names::CLAIMS_HISTORY),
            ctx.rng.clone(),
        )),
        Arc::new(PolicySearchTool::new(
            ctx.catalog.clone(),
            latency(tool_names::POLICY_SEARCH),
            ctx.rng.clone(),
        )),
        Arc::new(CriteriaMatchingTool::new(
            ctx.catalog.clone(),
            latency(tool_names::CRITERIA_MATCHING),
            ctx.rng.clone(),
        )),
    ]
}

/// Register every tool from [`default_tools`] with `registry`.
///
/// Stops at the first registration failure.
pub fn register_default_tools(registry: &ToolRegistry, ctx: &ToolContext) -> PreauthResult<()> {
    let tools = default_tools(ctx);
    let count = tools.len();
    for tool in tools {
        registry.register_tool(tool)?;
    }
    info!(tools = count, policies = ctx.catalog.len(), "default tools registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use preauth_core::FixedRandom;

    fn context() -> ToolContext {
        ToolContext::new(
            Arc::new(CoverageCatalog::bundled().unwrap()),
            Arc::new(MockReferenceData::default()),
            Arc::new(FixedRandom(0.5)),
        )
        .with_latency(LatencySettings::zero())
    }

    #[test]
    fn default_tools_cover_every_pipeline_tool() {
        let names: Vec<String> = default_tools(&context())
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, tool_names::ALL.map(String::from).to_vec());
    }

    #[test]
    fn all_tools_register() {
        let registry = ToolRegistry::new();
        register_default_tools(&registry, &context()).unwrap();
        assert_eq!(registry.list_tools().len(), 6);
        for name in tool_names::ALL {
            assert!(registry.has_tool(name), "{name} missing");
        }
    }

    #[test]
    fn registering_twice_fails() {
        let registry = ToolRegistry::new();
        let ctx = context();
        register_default_tools(&registry, &ctx).unwrap();
        assert!(register_default_tools(&registry, &ctx).is_err());
    }

    #[test]
    fn context_from_config_uses_configured_latency() {
        let config = PipelineConfig::default().without_latency().with_seed(7);
        let ctx = ToolContext::from_config(
            &config,
            Arc::new(CoverageCatalog::bundled().unwrap()),
            Arc::new(MockReferenceData::default()),
        );
        assert_eq!(ctx.latency, LatencySettings::zero());
    }
}
