//! Pipeline lifecycle events.
//!
//! The orchestrator emits through an [`EventCollector`] when one is attached;
//! hosts consume the receiver to render progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::workflow::StageName;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageStarted {
        event_id: String,
        timestamp: DateTime<Utc>,
        task_id: String,
        stage: StageName,
    },
    StageFinished {
        event_id: String,
        timestamp: DateTime<Utc>,
        task_id: String,
        stage: StageName,
        status: StageStatus,
        elapsed_ms: u64,
    },
    WorkflowFinished {
        event_id: String,
        timestamp: DateTime<Utc>,
        task_id: String,
        success: bool,
        total_secs: f64,
    },
}

impl PipelineEvent {
    pub fn event_id(&self) -> &str {
        match self {
            PipelineEvent::StageStarted { event_id, .. }
            | PipelineEvent::StageFinished { event_id, .. }
            | PipelineEvent::WorkflowFinished { event_id, .. } => event_id,
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            PipelineEvent::StageStarted { task_id, .. }
            | PipelineEvent::StageFinished { task_id, .. }
            | PipelineEvent::WorkflowFinished { task_id, .. } => task_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    /// Completed with sentinel text because the backend is unconfigured.
    Degraded,
    Failure { reason: String },
}

#[derive(Clone)]
pub struct EventCollector {
    sender: mpsc::UnboundedSender<PipelineEvent>,
}

impl EventCollector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn emit_stage_started(&self, task_id: &str, stage: StageName) {
        self.send(PipelineEvent::StageStarted {
            event_id: new_event_id(),
            timestamp: Utc::now(),
            task_id: task_id.to_string(),
            stage,
        });
    }

    pub fn emit_stage_finished(&self, task_id: &str, stage: StageName, status: StageStatus, elapsed_ms: u64) {
        self.send(PipelineEvent::StageFinished {
            event_id: new_event_id(),
            timestamp: Utc::now(),
            task_id: task_id.to_string(),
            stage,
            status,
            elapsed_ms,
        });
    }

    pub fn emit_workflow_finished(&self, task_id: &str, success: bool, total_secs: f64) {
        self.send(PipelineEvent::WorkflowFinished {
            event_id: new_event_id(),
            timestamp: Utc::now(),
            task_id: task_id.to_string(),
            success,
            total_secs,
        });
    }

    fn send(&self, event: PipelineEvent) {
        if let Err(err) = self.sender.send(event) {
            tracing::warn!(error = %err, "failed to emit pipeline event");
        }
    }
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new().0
    }
}

fn new_event_id() -> String {
    format!("evt_{}", uuid::Uuid::new_v4().simple())
}
