//! Progress events for UIs driving the orchestrator.
//!
//! Streaming is a side channel with no correctness dependency: a missing or
//! disconnected receiver never affects the loop.

use std::sync::mpsc::Sender;

use crate::graph::Status;

/// Coarse phase of the current task, for spinner-style displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Executing,
    Reviewing,
}

/// One progress notification from the scheduling loop.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    StageChanged { task_id: String, stage: Stage },
    TaskFinished { task_id: String, status: Status },
}

/// Optional sender wrapper; send failures are deliberately swallowed.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<Sender<OrchestratorEvent>>,
}

impl EventSink {
    pub fn new(sender: Sender<OrchestratorEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: OrchestratorEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
