//! preauth-config: TOML configuration for the PREAUTH pipeline.
//!
//! Two documents are loaded here:
//!
//! - `PipelineConfig`: registry sizing, simulated tool latency, the random
//!   seed, and the Sensing stage's procedure code sets.
//! - `CoverageCatalog`: the coverage policies the guidelines search and
//!   criteria matching tools evaluate requests against. A default catalog is
//!   bundled from `policies/coverage.toml`.
//!
//! Both follow the same loading contract: `from_toml_str` / `from_file`,
//! with every parse or validation failure surfacing as
//! `PreauthError::Config`.

pub mod catalog;
pub mod settings;

pub use catalog::{ConservativeTreatment, CoverageCatalog, CoveragePolicy};
pub use settings::{
    LatencyRange, LatencySettings, PipelineConfig, RandomSettings, RegistrySettings,
    SensingSettings,
};
