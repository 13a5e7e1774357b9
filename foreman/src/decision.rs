//! Decision checkpoint resolution.
//!
//! A successful run under a decision policy parks its task in a Pending
//! checkpoint; resolution is addressed by the exact `(task_id, run_id)` pair
//! so a stale checkpoint can never be resolved by accident.

use anyhow::{Result, bail};
use tracing::info;

use crate::events::OrchestratorEvent;
use crate::execute::Orchestrator;
use crate::graph::Status;
use crate::io::agent::AgentRuntime;
use crate::io::plan_store::load_plan;
use crate::io::run_store::{DecisionState, load_run, save_run};

/// A human's verdict on a pending checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Mark the task done and keep the loop going.
    ApprovedContinue,
    /// Mark the task done but stop after it.
    ApprovedQuit,
    /// Keep the task open; the next resume re-dispatches it with feedback.
    ChangesRequested,
    /// Mark the task failed; no automatic retry.
    Rejected,
}

impl Decision {
    fn state(self) -> DecisionState {
        match self {
            Decision::ApprovedContinue => DecisionState::ApprovedContinue,
            Decision::ApprovedQuit => DecisionState::ApprovedQuit,
            Decision::ChangesRequested => DecisionState::ChangesRequested,
            Decision::Rejected => DecisionState::Rejected,
        }
    }
}

/// What a resolution did, and whether the caller should keep executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub task_id: String,
    pub run_id: String,
    pub decision: Decision,
    /// False for ApprovedQuit, ChangesRequested, and Rejected.
    pub continue_loop: bool,
}

impl<'a, R: AgentRuntime> Orchestrator<'a, R> {
    /// Resolve a pending decision checkpoint.
    ///
    /// `run_id` must name the exact pending record; "latest run for the task"
    /// is deliberately not accepted. ChangesRequested requires nonempty
    /// feedback, stored on the record for the next resume to inject.
    pub fn resolve_decision(
        &self,
        task_id: &str,
        run_id: &str,
        decision: Decision,
        feedback: Option<String>,
    ) -> Result<DecisionOutcome> {
        let mut run = load_run(&self.paths.runs_dir, task_id, run_id)?;
        if run.decision_state != Some(DecisionState::Pending) {
            bail!(
                "run '{run_id}' of task '{task_id}' has no pending decision (state: {:?})",
                run.decision_state
            );
        }

        let feedback = feedback
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        if decision == Decision::ChangesRequested && feedback.is_none() {
            bail!("changes_requested requires nonempty feedback");
        }

        run.decision_state = Some(decision.state());
        run.decision_feedback = feedback;
        save_run(&self.paths.runs_dir, &run)?;

        let new_status = match decision {
            Decision::ApprovedContinue | Decision::ApprovedQuit => Some(Status::Done),
            Decision::Rejected => Some(Status::Failed),
            // Stays non-terminal; the next resume re-dispatches it.
            Decision::ChangesRequested => None,
        };
        if let Some(status) = new_status {
            let mut graph = load_plan(&self.paths.plan_path)?;
            if graph.get(task_id).is_some() {
                self.set_status(&mut graph, task_id, status)?;
                self.events.emit(OrchestratorEvent::TaskFinished {
                    task_id: task_id.to_string(),
                    status,
                });
            }
        }

        info!(task_id, run_id, ?decision, "decision resolved");
        Ok(DecisionOutcome {
            task_id: task_id.to_string(),
            run_id: run_id.to_string(),
            decision,
            continue_loop: decision == Decision::ApprovedContinue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_approved_continue_keeps_the_loop_going() {
        assert_eq!(Decision::ApprovedContinue.state(), DecisionState::ApprovedContinue);
        assert_eq!(Decision::ApprovedQuit.state(), DecisionState::ApprovedQuit);
        assert_eq!(
            Decision::ChangesRequested.state(),
            DecisionState::ChangesRequested
        );
        assert_eq!(Decision::Rejected.state(), DecisionState::Rejected);
    }
}
