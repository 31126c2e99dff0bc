//! # preauth-store
//!
//! In-memory persistence for the PREAUTH pipeline.
//!
//! [`memory::InMemoryStore`] implements all three store traits from
//! `preauth-core` (`RequestStore`, `WorkflowStepStore`, `TraceLogStore`)
//! over one shared state, and can be told to fail specific operations so
//! the processor's recovery paths can be exercised.

pub mod memory;

pub use memory::{Fault, InMemoryStore};
