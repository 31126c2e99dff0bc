//! Trait seams for the PREAUTH pipeline.
//!
//! - `Tool`:              one registered capability (document processing,
//!   eligibility lookup, ...)
//! - `ToolInvoker`:       dispatches a named call; implemented by the registry
//! - `RequestStore`:      the request record and its one patch operation
//! - `WorkflowStepStore`: coarse progress persistence
//! - `TraceLogStore`:     fine-grained progress persistence
//! - `UpdateSink`:        best-effort live event push
//!
//! The processor only ever sees these traits. Concrete stores, tools, and
//! the registry live in their own crates.

use async_trait::async_trait;
use serde_json::{json, Value};

use preauth_contracts::{
    error::PreauthResult,
    progress::{PipelineEvent, TraceLogEntry, WorkflowStep},
    request::{Request, RequestUpdate},
};

/// A named tool the orchestration stage can call through a `ToolInvoker`.
///
/// Tools are stateless between calls and never call other tools. Because the
/// handler is a trait method, a tool without a handler cannot be built.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique registry name, e.g. `member-eligibility-lookup`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the parameters.
    ///
    /// Only the top-level `required` list is enforced, and only for presence.
    fn input_schema(&self) -> Value;

    /// Descriptive schema for the result. Never enforced.
    fn output_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    /// Run the tool. Errors are propagated to the caller unchanged.
    async fn execute(&self, params: Value) -> PreauthResult<Value>;
}

/// Dispatches a call to a tool by name.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn call_tool(&self, name: &str, params: Value) -> PreauthResult<Value>;
}

/// Read and patch stored requests.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get(&self, request_id: &str) -> PreauthResult<Option<Request>>;

    /// Apply a partial update. Fails with `RequestNotFound` for unknown ids.
    async fn update(&self, request_id: &str, update: RequestUpdate) -> PreauthResult<()>;
}

/// Append-only workflow step persistence.
#[async_trait]
pub trait WorkflowStepStore: Send + Sync {
    async fn append(&self, step: WorkflowStep) -> PreauthResult<()>;

    /// Remove every step for `request_id`. Called before a reprocess.
    async fn delete_all(&self, request_id: &str) -> PreauthResult<()>;

    /// Steps for `request_id` in insertion order.
    async fn list(&self, request_id: &str) -> PreauthResult<Vec<WorkflowStep>>;
}

/// Append-only trace log persistence.
#[async_trait]
pub trait TraceLogStore: Send + Sync {
    async fn append(&self, entry: TraceLogEntry) -> PreauthResult<()>;

    async fn delete_all(&self, request_id: &str) -> PreauthResult<()>;

    async fn list(&self, request_id: &str) -> PreauthResult<Vec<TraceLogEntry>>;
}

/// Receives lifecycle events for live display.
///
/// Delivery is best-effort: implementations must not block and must not
/// fail the run.
pub trait UpdateSink: Send + Sync {
    fn notify(&self, event: PipelineEvent);
}
