//! Progress reporting for a single pipeline run.
//!
//! Stages never touch the step or trace stores directly. They hand
//! descriptors to `ProgressCallbacks`, which numbers them, persists them,
//! and forwards them to the run's `UpdateSink`, in that order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Local;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use preauth_contracts::{
    error::PreauthResult,
    progress::{PipelineEvent, StepDescriptor, TraceLevel, TraceLogEntry, WorkflowStep},
};

use crate::random::RandomSource;
use crate::traits::{TraceLogStore, UpdateSink, WorkflowStepStore};

/// Filler duration bounds for steps that report no duration of their own.
const FILLER_DURATION_MS: (u64, u64) = (800, 1399);

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUpdates;

impl UpdateSink for NoopUpdates {
    fn notify(&self, _event: PipelineEvent) {}
}

/// Forwards events over an unbounded tokio channel.
///
/// A dropped receiver is not an error; events are silently discarded.
#[derive(Debug, Clone)]
pub struct ChannelUpdates {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelUpdates {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UpdateSink for ChannelUpdates {
    fn notify(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            debug!("update receiver dropped, event discarded");
        }
    }
}

/// The callback bundle handed to every stage of one run.
///
/// Step numbers start at 1 and increase by one per `on_step` call. A new
/// bundle is built for every run, so a reprocess starts again at 1.
pub struct ProgressCallbacks {
    request_id: String,
    next_step: AtomicU32,
    steps: Arc<dyn WorkflowStepStore>,
    traces: Arc<dyn TraceLogStore>,
    updates: Arc<dyn UpdateSink>,
    rng: Arc<dyn RandomSource>,
}

impl ProgressCallbacks {
    pub fn new(
        request_id: impl Into<String>,
        steps: Arc<dyn WorkflowStepStore>,
        traces: Arc<dyn TraceLogStore>,
        updates: Arc<dyn UpdateSink>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            next_step: AtomicU32::new(1),
            steps,
            traces,
            updates,
            rng,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Number of steps recorded so far in this run.
    pub fn steps_recorded(&self) -> u32 {
        self.next_step.load(Ordering::SeqCst) - 1
    }

    /// Number, persist, then publish a workflow step.
    pub async fn on_step(&self, step: StepDescriptor) -> PreauthResult<WorkflowStep> {
        let step_number = self.next_step.fetch_add(1, Ordering::SeqCst);
        let duration_ms = step
            .duration_ms
            .unwrap_or_else(|| self.rng.range_u64(FILLER_DURATION_MS.0, FILLER_DURATION_MS.1));

        let record = WorkflowStep {
            request_id: self.request_id.clone(),
            step_number,
            name: step.name,
            description: step.description,
            status: step.status,
            timestamp: Local::now().format("%I:%M:%S %p").to_string(),
            details: step.details,
            tool_name: step.tool_name,
            duration_ms,
        };

        self.steps.append(record.clone()).await?;
        self.updates.notify(PipelineEvent::Step(record.clone()));
        Ok(record)
    }

    /// Persist then publish a trace entry.
    pub async fn on_trace(
        &self,
        level: TraceLevel,
        category: &str,
        message: impl Into<String>,
        details: Value,
    ) -> PreauthResult<()> {
        let entry = TraceLogEntry {
            request_id: self.request_id.clone(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
            level,
            category: category.to_string(),
            message: message.into(),
            details,
        };

        self.traces.append(entry.clone()).await?;
        self.updates.notify(PipelineEvent::Trace(entry));
        Ok(())
    }
}
