//! Pipeline settings loaded from TOML.
//!
//! Every section and field is optional. A missing field takes its built-in
//! value, so `PipelineConfig::from_toml_str("")` equals
//! `PipelineConfig::default()`.
//!
//! ```toml
//! [registry]
//! call_log_cap = 500
//!
//! [latency.criteria_matching]
//! min_ms = 0
//! max_ms = 0
//!
//! [random]
//! seed = 42
//!
//! [sensing]
//! urgent_codes = ["93458", "92928"]
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use preauth_contracts::{
    error::{PreauthError, PreauthResult},
    tool::tool_names,
};
use preauth_core::{RandomSource, SeededRandom, SensingRules};
use preauth_registry::RegistryConfig;

/// Codes treated as both urgent and complex when `[sensing]` is absent.
const DEFAULT_SENSING_CODES: [&str; 5] = ["93458", "92928", "96413", "27447", "22612"];

/// Simulated tool latency, drawn uniformly from `min_ms..=max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LatencyRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyRange {
    pub const ZERO: LatencyRange = LatencyRange { min_ms: 0, max_ms: 0 };

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    /// Draw one delay from the range.
    pub fn sample(&self, rng: &dyn RandomSource) -> Duration {
        Duration::from_millis(rng.range_u64(self.min_ms, self.max_ms))
    }
}

/// Per-tool latency ranges, keyed by tool in snake_case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencySettings {
    pub document_processing: LatencyRange,
    pub clinical_extraction: LatencyRange,
    pub member_eligibility: LatencyRange,
    pub claims_history: LatencyRange,
    pub policy_search: LatencyRange,
    pub criteria_matching: LatencyRange,
}

impl Default for LatencySettings {
    fn default() -> Self {
        Self {
            document_processing: LatencyRange::new(800, 1200),
            clinical_extraction: LatencyRange::new(600, 900),
            member_eligibility: LatencyRange::new(500, 800),
            claims_history: LatencyRange::new(700, 1100),
            policy_search: LatencyRange::new(600, 900),
            criteria_matching: LatencyRange::new(800, 1200),
        }
    }
}

impl LatencySettings {
    /// All six ranges set to zero. Used by tests and the demo's `--fast`.
    pub fn zero() -> Self {
        Self {
            document_processing: LatencyRange::ZERO,
            clinical_extraction: LatencyRange::ZERO,
            member_eligibility: LatencyRange::ZERO,
            claims_history: LatencyRange::ZERO,
            policy_search: LatencyRange::ZERO,
            criteria_matching: LatencyRange::ZERO,
        }
    }

    /// The range configured for a registered tool name.
    ///
    /// Unknown names get `LatencyRange::ZERO`.
    pub fn for_tool(&self, name: &str) -> LatencyRange {
        match name {
            tool_names::DOCUMENT_PROCESSING => self.document_processing,
            tool_names::CLINICAL_EXTRACTION => self.clinical_extraction,
            tool_names::MEMBER_ELIGIBILITY => self.member_eligibility,
            tool_names::CLAIMS_HISTORY => self.claims_history,
            tool_names::POLICY_SEARCH => self.policy_search,
            tool_names::CRITERIA_MATCHING => self.criteria_matching,
            _ => LatencyRange::ZERO,
        }
    }

    fn entries(&self) -> [(&'static str, LatencyRange); 6] {
        [
            ("document_processing", self.document_processing),
            ("clinical_extraction", self.clinical_extraction),
            ("member_eligibility", self.member_eligibility),
            ("claims_history", self.claims_history),
            ("policy_search", self.policy_search),
            ("criteria_matching", self.criteria_matching),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub call_log_cap: usize,
    pub param_truncate_len: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        let built_in = RegistryConfig::default();
        Self {
            call_log_cap: built_in.call_log_cap,
            param_truncate_len: built_in.param_truncate_len,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomSettings {
    /// Fixed seed for reproducible runs. `None` seeds from the OS.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensingSettings {
    pub urgent_codes: Vec<String>,
    pub complex_codes: Vec<String>,
}

impl Default for SensingSettings {
    fn default() -> Self {
        let codes: Vec<String> = DEFAULT_SENSING_CODES.iter().map(|c| c.to_string()).collect();
        Self {
            urgent_codes: codes.clone(),
            complex_codes: codes,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub registry: RegistrySettings,
    pub latency: LatencySettings,
    pub random: RandomSettings,
    pub sensing: SensingSettings,
}

impl PipelineConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `PreauthError::Config` if the TOML is malformed, does not
    /// match the `PipelineConfig` schema, or fails `validate`.
    pub fn from_toml_str(s: &str) -> PreauthResult<Self> {
        let config: PipelineConfig = toml::from_str(s).map_err(|e| PreauthError::Config {
            reason: format!("failed to parse pipeline TOML: {}", e),
        })?;
        config.validate()?;
        debug!(
            call_log_cap = config.registry.call_log_cap,
            seeded = config.random.seed.is_some(),
            "pipeline configuration loaded"
        );
        Ok(config)
    }

    /// Read the file at `path` and parse it as pipeline configuration.
    pub fn from_file(path: &Path) -> PreauthResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PreauthError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> PreauthResult<()> {
        if self.registry.call_log_cap < 2 {
            return Err(PreauthError::Config {
                reason: format!(
                    "registry.call_log_cap must be at least 2, got {}",
                    self.registry.call_log_cap
                ),
            });
        }
        for (tool, range) in self.latency.entries() {
            if range.min_ms > range.max_ms {
                return Err(PreauthError::Config {
                    reason: format!(
                        "latency.{tool}: min_ms ({}) is greater than max_ms ({})",
                        range.min_ms, range.max_ms
                    ),
                });
            }
        }
        Ok(())
    }

    /// Drop all simulated latency.
    pub fn without_latency(mut self) -> Self {
        self.latency = LatencySettings::zero();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random.seed = Some(seed);
        self
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            call_log_cap: self.registry.call_log_cap,
            param_truncate_len: self.registry.param_truncate_len,
        }
    }

    pub fn sensing_rules(&self) -> SensingRules {
        SensingRules {
            urgent_codes: self.sensing.urgent_codes.iter().cloned().collect(),
            complex_codes: self.sensing.complex_codes.iter().cloned().collect(),
        }
    }

    /// A seeded source when `random.seed` is set, OS entropy otherwise.
    pub fn random_source(&self) -> Arc<dyn RandomSource> {
        match self.random.seed {
            Some(seed) => Arc::new(SeededRandom::new(seed)),
            None => Arc::new(SeededRandom::from_entropy()),
        }
    }
}
