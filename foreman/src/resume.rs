//! Re-entering exactly one task: answers for a waiting_user session, pending
//! parent-review feedback, or stored changes-requested feedback.

use anyhow::{Result, anyhow, bail};
use thiserror::Error;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::execute::{ExecuteResult, LoopControl, Orchestrator};
use crate::io::agent::AgentRuntime;
use crate::io::plan_store::load_plan;
use crate::io::run_store::{
    DecisionState, RunStatus, clear_pending_feedback, latest_run, list_pending_feedback,
    load_pending_feedback,
};

/// A resume request carried both answers and pending parent-review feedback.
/// The two inject conflicting context, so the caller must pick one; silently
/// preferring either would hide the other.
#[derive(Debug, Error)]
#[error(
    "resume of task '{task_id}': answers cannot be combined with pending parent-review feedback"
)]
pub struct ResumeConflictError {
    pub task_id: String,
}

/// One entry of a batch resume; each child is reported independently.
#[derive(Debug)]
pub struct BatchResumeOutcome {
    pub task_id: String,
    pub result: Result<ExecuteResult>,
}

impl<'a, R: AgentRuntime> Orchestrator<'a, R> {
    /// Re-enter one task.
    ///
    /// With `answers`, continues a waiting_user session. Without answers, the
    /// task's pending parent-review feedback or stored changes-requested
    /// feedback is consumed and injected. Supplying answers while pending
    /// parent-review feedback exists is an error and performs no mutation.
    pub fn resume(
        &self,
        cancel: &CancelToken,
        task_id: &str,
        answers: Vec<String>,
    ) -> Result<ExecuteResult> {
        let mut graph = load_plan(&self.paths.plan_path)?;
        if graph.get(task_id).is_none() {
            bail!("task '{task_id}' does not exist");
        }

        let pending = load_pending_feedback(&self.paths.feedback_dir, task_id)?;
        if !answers.is_empty() && pending.is_some() {
            return Err(ResumeConflictError {
                task_id: task_id.to_string(),
            }
            .into());
        }

        let feedback = if let Some(pending) = pending {
            // Consume exactly once: read, then clear, then dispatch.
            clear_pending_feedback(&self.paths.feedback_dir, task_id)?;
            info!(
                task_id,
                review_run_id = %pending.review_run_id,
                "resuming with parent-review feedback"
            );
            Some(pending.feedback)
        } else if answers.is_empty() {
            self.changes_requested_feedback(task_id)?
        } else {
            self.ensure_waiting_user(task_id)?;
            debug!(task_id, count = answers.len(), "resuming with answers");
            None
        };

        let outcome = self.dispatch(cancel, &mut graph, task_id, answers, feedback)?;
        match self.conclude(cancel, graph, task_id, outcome, true)? {
            LoopControl::Stop(result) => Ok(result),
            LoopControl::Continue => unreachable!("single-task conclude always stops"),
        }
    }

    /// Resume every task with pending parent-review feedback, one at a time.
    /// Duplicate targets collapse to one execution by construction (the store
    /// keys on task id); each task is reported independently.
    pub fn resume_pending(&self, cancel: &CancelToken) -> Result<Vec<BatchResumeOutcome>> {
        let task_ids = list_pending_feedback(&self.paths.feedback_dir)?;
        let mut outcomes = Vec::new();
        for task_id in task_ids {
            if cancel.is_canceled() {
                break;
            }
            let result = self.resume(cancel, &task_id, Vec::new());
            outcomes.push(BatchResumeOutcome { task_id, result });
        }
        Ok(outcomes)
    }

    /// Feedback stored by a changes-requested decision on the latest run.
    fn changes_requested_feedback(&self, task_id: &str) -> Result<Option<String>> {
        let latest = latest_run(&self.paths.runs_dir, task_id)?;
        match latest {
            Some(run) if run.decision_state == Some(DecisionState::ChangesRequested) => {
                info!(task_id, run_id = %run.id, "resuming with changes-requested feedback");
                Ok(run.decision_feedback.clone())
            }
            _ => Err(anyhow!(
                "task '{task_id}' has nothing to resume (no answers, no pending feedback)"
            )),
        }
    }

    fn ensure_waiting_user(&self, task_id: &str) -> Result<()> {
        let latest = latest_run(&self.paths.runs_dir, task_id)?;
        match latest {
            Some(run) if run.status == RunStatus::WaitingUser => Ok(()),
            _ => Err(anyhow!(
                "task '{task_id}' is not waiting for answers (no waiting_user run)"
            )),
        }
    }
}
