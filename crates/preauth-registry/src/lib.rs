//! # preauth-registry
//!
//! The tool registry for the PREAUTH pipeline.
//!
//! This crate provides [`registry::ToolRegistry`], which implements the
//! [`preauth_core::traits::ToolInvoker`] trait. It:
//!
//! 1. **Registers** tools after checking their definitions, including that
//!    the input schema compiles as JSON Schema (`jsonschema` crate).
//! 2. **Gates** every call on the presence of the schema's `required`
//!    parameters; a tool never runs with a required parameter missing.
//! 3. **Logs** every executed call, success or failure, to a bounded call
//!    log that backs `stats()`.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use preauth_registry::ToolRegistry;
//!
//! let registry = Arc::new(ToolRegistry::new());
//! registry.register_tool(Arc::new(MemberEligibilityTool::new(data)))?;
//! let result = registry.call_tool("member-eligibility-lookup", json!({ "memberId": "MEM-100004" })).await?;
//! ```

pub mod call_log;
pub mod registry;

pub use registry::{RegistryConfig, ToolRegistry};
