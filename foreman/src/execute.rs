//! The scheduling loop: drives one ready task at a time to completion or a
//! pause point.
//!
//! Each iteration reloads and re-validates the plan file (the single source
//! of truth), dispatches the first ready task, and persists every transition
//! before the next blocking step. Two orchestrator instances against the same
//! plan directory are unsafe; re-reading is the hazard-avoidance mechanism
//! for external edits and restarts, not for concurrent loops.

use anyhow::{Result, anyhow};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::core::patch::apply_patch;
use crate::core::ready::ready_tasks;
use crate::events::{EventSink, OrchestratorEvent, Stage};
use crate::graph::{Status, WorkGraph, summarize_graph};
use crate::io::agent::{AgentCanceled, AgentRequest, AgentRuntime};
use crate::io::config::OrchestratorConfig;
use crate::io::init::ProjectPaths;
use crate::io::plan_store::{load_plan, save_plan};
use crate::io::prompt::{PromptBuilder, TaskPromptInputs};
use crate::io::run_store::{
    DecisionState, RunRecord, RunStatus, RunType, latest_run, next_run_id, save_run,
};
use crate::review::ReviewOutcome;

/// Why the loop returned to the caller. Exhaustive: this enum drives the
/// caller's next action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteReason {
    /// No ready tasks remain, or the per-task stop policy paused the loop.
    Completed,
    /// The agent asked clarifying questions; a human must resume with answers.
    WaitingUser,
    /// The cancel token fired.
    Canceled,
    /// An agent invocation or patch failed; the task is marked failed.
    Error,
    /// A parent review ran; its verdict needs human attention.
    ParentReviewRequired,
    /// A successful run awaits a human decision before terminal status.
    DecisionRequired,
}

impl ExecuteReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecuteReason::Completed => "completed",
            ExecuteReason::WaitingUser => "waiting_user",
            ExecuteReason::Canceled => "canceled",
            ExecuteReason::Error => "error",
            ExecuteReason::ParentReviewRequired => "parent_review_required",
            ExecuteReason::DecisionRequired => "decision_required",
        }
    }
}

/// Outcome of one `execute`/`resume` call.
#[derive(Debug)]
pub struct ExecuteResult {
    pub reason: ExecuteReason,
    pub task_id: Option<String>,
    pub run: Option<RunRecord>,
    pub error: Option<String>,
}

impl ExecuteResult {
    fn new(reason: ExecuteReason, task_id: Option<String>, run: Option<RunRecord>) -> Self {
        Self {
            reason,
            task_id,
            run,
            error: None,
        }
    }
}

/// What a single dispatch did, before loop policy is applied.
#[derive(Debug)]
pub(crate) enum DispatchOutcome {
    Success(RunRecord),
    WaitingUser(RunRecord),
    DecisionRequired(RunRecord),
    Failed { run: RunRecord, message: String },
    Canceled,
}

pub(crate) enum LoopControl {
    Continue,
    Stop(ExecuteResult),
}

/// Drives the plan: scheduling, dispatch, checkpoints, parent reviews.
pub struct Orchestrator<'a, R: AgentRuntime> {
    pub(crate) paths: ProjectPaths,
    pub(crate) config: OrchestratorConfig,
    pub(crate) runtime: &'a R,
    pub(crate) events: EventSink,
}

impl<'a, R: AgentRuntime> Orchestrator<'a, R> {
    pub fn new(paths: ProjectPaths, config: OrchestratorConfig, runtime: &'a R) -> Self {
        Self {
            paths,
            config,
            runtime,
            events: EventSink::none(),
        }
    }

    /// Attach a progress event sink (UIs run the loop on a background thread
    /// and listen on the paired receiver).
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Run ready tasks one at a time until the plan completes or a pause
    /// point (question, checkpoint, review, error, cancel) is reached.
    pub fn execute(&self, cancel: &CancelToken) -> Result<ExecuteResult> {
        loop {
            match self.execute_next(cancel)? {
                LoopControl::Continue => {}
                LoopControl::Stop(result) => return Ok(result),
            }
        }
    }

    fn execute_next(&self, cancel: &CancelToken) -> Result<LoopControl> {
        if cancel.is_canceled() {
            return Ok(LoopControl::Stop(ExecuteResult::new(
                ExecuteReason::Canceled,
                None,
                None,
            )));
        }

        // Reload from disk every iteration: external edits between tasks are
        // picked up, and a restart resumes exactly where the file says.
        let mut graph = load_plan(&self.paths.plan_path)?;
        let Some(task_id) = ready_tasks(&graph).first().map(|item| item.id.clone()) else {
            info!("no ready tasks, plan complete");
            return Ok(LoopControl::Stop(ExecuteResult::new(
                ExecuteReason::Completed,
                None,
                None,
            )));
        };

        let outcome = self.dispatch(cancel, &mut graph, &task_id, Vec::new(), None)?;
        self.conclude(cancel, graph, &task_id, outcome, false)
    }

    /// Execute one task end to end: persist in_progress, invoke the agent,
    /// persist the run record and the resulting status.
    pub(crate) fn dispatch(
        &self,
        cancel: &CancelToken,
        graph: &mut WorkGraph,
        task_id: &str,
        answers: Vec<String>,
        feedback: Option<String>,
    ) -> Result<DispatchOutcome> {
        let now = Utc::now();
        {
            let item = graph
                .get_mut(task_id)
                .ok_or_else(|| anyhow!("task '{task_id}' does not exist"))?;
            item.status = Status::InProgress;
            item.updated_at = now;
        }
        save_plan(&self.paths.plan_path, graph)?;
        self.events.emit(OrchestratorEvent::StageChanged {
            task_id: task_id.to_string(),
            stage: Stage::Executing,
        });

        let item = graph.get(task_id).expect("present above").clone();
        let prior_context = latest_run(&self.paths.runs_dir, task_id)?
            .and_then(|run| run.review_summary);

        let run_id = next_run_id(&self.paths.runs_dir, task_id)?;
        let mut run = RunRecord::started(&run_id, task_id, RunType::Task, now);
        run.context = snapshot_context(prior_context.as_deref(), feedback.as_deref());
        save_run(&self.paths.runs_dir, &run)?;
        info!(task_id, run_id = %run.id, "dispatching task");

        let prompt = PromptBuilder::new(self.config.prompt_budget_bytes).build_task(
            &TaskPromptInputs {
                item: &item,
                context: prior_context.clone(),
                answers: answers.clone(),
                feedback: feedback.clone(),
                graph_summary: summarize_graph(graph, self.config.summary_max_items),
            },
        );
        let request = AgentRequest {
            task_id: task_id.to_string(),
            kind: RunType::Task,
            prompt,
            acceptance_criteria: item.acceptance_criteria.clone(),
            context: prior_context,
            answers,
            feedback,
        };

        // The only blocking step. A cancel here leaves the item in_progress
        // and the record running; both are recoverable, never reverted.
        let invocation = match self.runtime.run(cancel, &request) {
            Ok(invocation) => invocation,
            Err(err) if err.downcast_ref::<AgentCanceled>().is_some() => {
                info!(task_id, "agent invocation canceled");
                return Ok(DispatchOutcome::Canceled);
            }
            Err(err) => {
                let message = format!("{err:#}");
                return self.fail_run(task_id, run, message);
            }
        };

        run.stdout = invocation.diagnostics.stdout;
        run.stderr = invocation.diagnostics.stderr;
        run.exit_code = invocation.diagnostics.exit_code;
        let response = invocation.response;

        if !response.questions.is_empty() {
            debug!(task_id, count = response.questions.len(), "agent asked questions");
            run.status = RunStatus::WaitingUser;
            run.questions = response.questions.clone();
            save_run(&self.paths.runs_dir, &run)?;
            self.set_status(graph, task_id, Status::WaitingUser)?;
            return Ok(DispatchOutcome::WaitingUser(run));
        }

        if response.plan.is_some() {
            return self.fail_run(
                task_id,
                run,
                "agent returned a full plan during task execution".to_string(),
            );
        }

        if let Some(patch) = &response.patch {
            if let Err(err) = apply_patch(graph, patch, Utc::now()) {
                return self.fail_run(task_id, run, format!("agent patch rejected: {err:#}"));
            }
            if graph.get(task_id).is_none() {
                // The patch was legal but deleted the running task; refuse to
                // persist it and fail the run instead.
                return self.fail_run(
                    task_id,
                    run,
                    "agent patch removed the task being executed".to_string(),
                );
            }
            debug!(task_id, ops = patch.len(), "agent patch applied");
        }

        let completed = Utc::now();
        run.status = RunStatus::Success;
        run.review_summary = response.summary.clone();
        run.completed_at = Some(completed);

        if self.config.require_decision {
            run.decision_required = true;
            run.decision_state = Some(DecisionState::Pending);
            run.decision_requested_at = Some(completed);
            save_run(&self.paths.runs_dir, &run)?;
            // Terminal status is committed only when the checkpoint resolves;
            // the item deliberately stays in_progress.
            save_plan(&self.paths.plan_path, graph)?;
            info!(task_id, run_id = %run.id, "decision checkpoint pending");
            return Ok(DispatchOutcome::DecisionRequired(run));
        }

        save_run(&self.paths.runs_dir, &run)?;
        self.set_status(graph, task_id, Status::Done)?;
        self.events.emit(OrchestratorEvent::TaskFinished {
            task_id: task_id.to_string(),
            status: Status::Done,
        });
        info!(task_id, run_id = %run.id, "task done");
        Ok(DispatchOutcome::Success(run))
    }

    /// Apply loop policy to a dispatch outcome. With `single` set (resume
    /// flows) a success stops the loop instead of continuing.
    pub(crate) fn conclude(
        &self,
        cancel: &CancelToken,
        mut graph: WorkGraph,
        task_id: &str,
        outcome: DispatchOutcome,
        single: bool,
    ) -> Result<LoopControl> {
        let stop = |result| Ok(LoopControl::Stop(result));
        match outcome {
            DispatchOutcome::Canceled => stop(ExecuteResult::new(
                ExecuteReason::Canceled,
                Some(task_id.to_string()),
                None,
            )),
            DispatchOutcome::WaitingUser(run) => stop(ExecuteResult::new(
                ExecuteReason::WaitingUser,
                Some(task_id.to_string()),
                Some(run),
            )),
            DispatchOutcome::DecisionRequired(run) => stop(ExecuteResult::new(
                ExecuteReason::DecisionRequired,
                Some(task_id.to_string()),
                Some(run),
            )),
            DispatchOutcome::Failed { run, message } => {
                let mut result = ExecuteResult::new(
                    ExecuteReason::Error,
                    Some(task_id.to_string()),
                    Some(run),
                );
                result.error = Some(message);
                stop(result)
            }
            DispatchOutcome::Success(run) => {
                // Parent review takes precedence over the per-task stop
                // policy at a shared boundary.
                match self.maybe_parent_review(cancel, &mut graph, task_id)? {
                    ReviewOutcome::Reviewed(review_run) => stop(ExecuteResult::new(
                        ExecuteReason::ParentReviewRequired,
                        Some(review_run.task_id.clone()),
                        Some(review_run),
                    )),
                    ReviewOutcome::Canceled => stop(ExecuteResult::new(
                        ExecuteReason::Canceled,
                        Some(task_id.to_string()),
                        None,
                    )),
                    ReviewOutcome::Failed { run: review_run, message } => {
                        let mut result = ExecuteResult::new(
                            ExecuteReason::Error,
                            Some(review_run.task_id.clone()),
                            Some(review_run),
                        );
                        result.error = Some(message);
                        stop(result)
                    }
                    ReviewOutcome::NotTriggered => {
                        if single || self.config.stop_after_each_task {
                            stop(ExecuteResult::new(
                                ExecuteReason::Completed,
                                Some(task_id.to_string()),
                                Some(run),
                            ))
                        } else {
                            Ok(LoopControl::Continue)
                        }
                    }
                }
            }
        }
    }

    /// Finalize a failed run and mark the task failed, re-reading the plan so
    /// a rejected in-memory patch is never persisted.
    fn fail_run(
        &self,
        task_id: &str,
        mut run: RunRecord,
        message: String,
    ) -> Result<DispatchOutcome> {
        warn!(task_id, run_id = %run.id, %message, "task run failed");
        run.status = RunStatus::Failed;
        run.completed_at = Some(Utc::now());
        if run.stderr.is_empty() {
            run.stderr = message.clone();
        }
        save_run(&self.paths.runs_dir, &run)?;

        let mut graph = load_plan(&self.paths.plan_path)?;
        if graph.get(task_id).is_some() {
            let now = Utc::now();
            let item = graph.get_mut(task_id).expect("checked above");
            item.status = Status::Failed;
            item.updated_at = now;
            save_plan(&self.paths.plan_path, &graph)?;
            self.events.emit(OrchestratorEvent::TaskFinished {
                task_id: task_id.to_string(),
                status: Status::Failed,
            });
        }
        Ok(DispatchOutcome::Failed { run, message })
    }

    pub(crate) fn set_status(
        &self,
        graph: &mut WorkGraph,
        task_id: &str,
        status: Status,
    ) -> Result<()> {
        let now = Utc::now();
        let item = graph
            .get_mut(task_id)
            .ok_or_else(|| anyhow!("task '{task_id}' does not exist"))?;
        item.status = status;
        item.updated_at = now;
        save_plan(&self.paths.plan_path, graph)
    }
}

fn snapshot_context(prior: Option<&str>, feedback: Option<&str>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(prior) = prior.map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(prior.to_string());
    }
    if let Some(feedback) = feedback.map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(format!("feedback: {feedback}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}
