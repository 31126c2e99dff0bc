//! The four stage agents.
//!
//! Stages run strictly in order: Sensing → Planning → Orchestration →
//! Decision. Each takes the previous stage's output (or the raw request),
//! reports through `ProgressCallbacks`, and returns its own typed output.
//! A stage traces on entry and on completion; on failure it records an
//! error trace and returns the original error.

use std::future::Future;

use serde_json::json;
use tracing::warn;

use preauth_contracts::{
    error::{PreauthError, PreauthResult},
    progress::TraceLevel,
};

use crate::progress::ProgressCallbacks;

pub mod decision;
pub mod orchestration;
pub mod planning;
pub mod sensing;

/// Await `body`; on error, record an error trace under `category` first.
///
/// A failure to write the error trace is logged and otherwise ignored so
/// the stage's own error always reaches the caller.
pub(crate) async fn with_failure_trace<T, F>(
    progress: &ProgressCallbacks,
    category: &str,
    body: F,
) -> PreauthResult<T>
where
    F: Future<Output = PreauthResult<T>>,
{
    let result = body.await;
    if let Err(err) = &result {
        trace_failure(progress, category, err).await;
    }
    result
}

async fn trace_failure(progress: &ProgressCallbacks, category: &str, err: &PreauthError) {
    let traced = progress
        .on_trace(
            TraceLevel::Error,
            category,
            format!("{category} failed: {err}"),
            json!({ "error": err.to_string() }),
        )
        .await;
    if let Err(trace_err) = traced {
        warn!(
            request_id = %progress.request_id(),
            category,
            error = %trace_err,
            "could not record failure trace"
        );
    }
}
