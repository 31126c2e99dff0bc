//! Error types for the PREAUTH pipeline.
//!
//! Every fallible operation in the workspace returns `PreauthResult<T>`.
//! All variants are fatal to the current pipeline run: there is no partial
//! success state and nothing in the core retries.

use thiserror::Error;

/// The unified error type for the PREAUTH pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreauthError {
    /// A tool definition was malformed or its name is already taken.
    ///
    /// Raised at startup; not retryable.
    #[error("tool registration failed: {reason}")]
    Registration { reason: String },

    /// A caller referenced a tool that is not registered.
    #[error("tool '{name}' not found in registry. Available: {}", available.join(", "))]
    ToolNotFound { name: String, available: Vec<String> },

    /// A field listed in the tool's `inputSchema.required` was absent or null.
    ///
    /// The tool's handler is never invoked when this is returned.
    #[error("tool '{tool}' missing required parameter: {field}")]
    Validation { tool: String, field: String },

    /// The tool's own logic failed. Propagated unchanged by the registry.
    #[error("tool '{tool}' failed: {reason}")]
    ToolExecution { tool: String, reason: String },

    /// A second run was requested while one is already in flight.
    #[error("request {request_id} is already being processed")]
    AlreadyProcessing { request_id: String },

    /// The request identifier does not resolve to a stored request.
    #[error("request {request_id} not found")]
    RequestNotFound { request_id: String },

    /// The backing store rejected a read or write.
    #[error("storage error: {reason}")]
    Storage { reason: String },

    /// A configuration document is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used throughout the PREAUTH crates.
pub type PreauthResult<T> = Result<T, PreauthError>;
