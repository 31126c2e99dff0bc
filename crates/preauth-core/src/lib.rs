//! # preauth-core
//!
//! The prior authorization pipeline runtime.
//!
//! This crate provides:
//! - The trait seams the pipeline runs against (`Tool`, `ToolInvoker`, the
//!   three stores, `UpdateSink`, `RandomSource`)
//! - `ProgressCallbacks`, the only channel stages use to report progress
//! - The four stage agents: Sensing → Planning → Orchestration → Decision
//! - The `PipelineProcessor`, which runs the stages with single-flight
//!   protection per request
//!
//! ## Usage
//!
//! ```rust,ignore
//! use preauth_core::{PipelineProcessor, random::SeededRandom};
//!
//! let processor = PipelineProcessor::new(registry, store.clone(), store.clone(), store, rng);
//! let decision = processor.process("PA-2026-0409").await?;
//! ```

pub mod processor;
pub mod progress;
pub mod random;
pub mod stages;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use processor::{InFlightRun, PipelineProcessor};
pub use progress::{ChannelUpdates, NoopUpdates, ProgressCallbacks};
pub use random::{FixedRandom, RandomSource, SeededRandom};
pub use stages::sensing::SensingRules;
