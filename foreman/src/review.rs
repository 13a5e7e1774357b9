//! Parent review: an aggregate check of a parent task once all of its
//! children have reached a terminal status.
//!
//! A failed review reopens specific children by writing durable pending
//! feedback, consumed read-then-clear on each child's next resume.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::Result;
use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::events::{OrchestratorEvent, Stage};
use crate::execute::Orchestrator;
use crate::graph::{Status, WorkGraph, summarize_graph};
use crate::io::agent::{AgentCanceled, AgentRequest, AgentRuntime};
use crate::io::prompt::{PromptBuilder, ReviewPromptInputs};
use crate::io::run_store::{
    ParentReviewTaskResult, RunRecord, RunStatus, RunType, latest_run, list_pending_feedback,
    next_run_id, save_run, upsert_pending_feedback,
};

/// Result of the parent-review sub-flow.
#[derive(Debug)]
pub(crate) enum ReviewOutcome {
    /// No parent, review disabled, or children still open.
    NotTriggered,
    /// The review ran; the record carries the verdict.
    Reviewed(RunRecord),
    /// The cancel token fired during the review invocation.
    Canceled,
    /// The review invocation itself failed.
    Failed { run: RunRecord, message: String },
}

/// Trim, drop empties, dedupe, and sort review resume targets.
pub fn normalize_resume_targets(raw: &[String]) -> Vec<String> {
    let set: BTreeSet<String> = raw
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    set.into_iter().collect()
}

/// Collapse internal whitespace runs within lines and runs of blank lines,
/// trimming the ends.
pub fn normalize_feedback(raw: &str) -> String {
    static WS_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

    let mut out: Vec<String> = Vec::new();
    let mut prev_blank = true; // drops leading blanks
    for line in raw.lines() {
        let line = WS_RUN.replace_all(line.trim(), " ").into_owned();
        let blank = line.is_empty();
        if blank && prev_blank {
            continue;
        }
        out.push(line);
        prev_blank = blank;
    }
    while out.last().is_some_and(String::is_empty) {
        out.pop();
    }
    out.join("\n")
}

impl<'a, R: AgentRuntime> Orchestrator<'a, R> {
    /// Run the parent review for `completed_task_id`'s parent if this task
    /// was the last child to reach a terminal status.
    pub(crate) fn maybe_parent_review(
        &self,
        cancel: &CancelToken,
        graph: &mut WorkGraph,
        completed_task_id: &str,
    ) -> Result<ReviewOutcome> {
        if !self.config.parent_review {
            return Ok(ReviewOutcome::NotTriggered);
        }
        let Some(parent_id) = graph
            .get(completed_task_id)
            .and_then(|item| item.parent_id.clone())
        else {
            return Ok(ReviewOutcome::NotTriggered);
        };
        let Some(parent) = graph.get(&parent_id) else {
            return Ok(ReviewOutcome::NotTriggered);
        };
        if parent.child_ids.is_empty() {
            return Ok(ReviewOutcome::NotTriggered);
        }
        let all_terminal = parent.child_ids.iter().all(|child_id| {
            graph
                .get(child_id)
                .map(|child| child.status.is_terminal())
                .unwrap_or(false)
        });
        if !all_terminal {
            debug!(parent_id = %parent_id, "children still open, no review");
            return Ok(ReviewOutcome::NotTriggered);
        }
        // Children an earlier failed review queued for re-run are not settled
        // yet; the next review waits until that backlog drains.
        let pending = list_pending_feedback(&self.paths.feedback_dir)?;
        if parent
            .child_ids
            .iter()
            .any(|child_id| pending.iter().any(|p| p == child_id))
        {
            debug!(parent_id = %parent_id, "children awaiting resume, no review");
            return Ok(ReviewOutcome::NotTriggered);
        }

        let parent = parent.clone();
        info!(parent_id = %parent.id, "all children terminal, running parent review");
        self.events.emit(OrchestratorEvent::StageChanged {
            task_id: parent.id.clone(),
            stage: Stage::Reviewing,
        });

        let mut results = Vec::new();
        for child_id in &parent.child_ids {
            let Some(child) = graph.get(child_id) else {
                continue;
            };
            let feedback = latest_run(&self.paths.runs_dir, child_id)?
                .and_then(|run| run.review_summary)
                .unwrap_or_default();
            results.push(ParentReviewTaskResult {
                task_id: child_id.clone(),
                passed: child.status == Status::Done,
                feedback,
            });
        }

        let now = Utc::now();
        let run_id = next_run_id(&self.paths.runs_dir, &parent.id)?;
        let mut run = RunRecord::started(&run_id, &parent.id, RunType::Review, now);
        run.parent_review_results = results.clone();
        save_run(&self.paths.runs_dir, &run)?;

        let prompt = PromptBuilder::new(self.config.prompt_budget_bytes).build_review(
            &ReviewPromptInputs {
                parent: &parent,
                results: &results,
                graph_summary: summarize_graph(graph, self.config.summary_max_items),
            },
        );
        let request = AgentRequest {
            task_id: parent.id.clone(),
            kind: RunType::Review,
            prompt,
            acceptance_criteria: parent.acceptance_criteria.clone(),
            context: None,
            answers: Vec::new(),
            feedback: None,
        };

        let invocation = match self.runtime.run(cancel, &request) {
            Ok(invocation) => invocation,
            Err(err) if err.downcast_ref::<AgentCanceled>().is_some() => {
                return Ok(ReviewOutcome::Canceled);
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(parent_id = %parent.id, %message, "parent review invocation failed");
                run.status = RunStatus::Failed;
                run.completed_at = Some(Utc::now());
                run.stderr = message.clone();
                save_run(&self.paths.runs_dir, &run)?;
                return Ok(ReviewOutcome::Failed { run, message });
            }
        };

        run.stdout = invocation.diagnostics.stdout;
        run.stderr = invocation.diagnostics.stderr;
        run.exit_code = invocation.diagnostics.exit_code;

        let Some(verdict) = invocation.response.review else {
            let message = "review response carried no verdict".to_string();
            run.status = RunStatus::Failed;
            run.completed_at = Some(Utc::now());
            save_run(&self.paths.runs_dir, &run)?;
            return Ok(ReviewOutcome::Failed { run, message });
        };

        let mut targets = normalize_resume_targets(&verdict.resume_task_ids);
        targets.retain(|target| {
            let known = parent.child_ids.iter().any(|c| c == target);
            if !known {
                warn!(parent_id = %parent.id, target = %target, "dropping unknown review resume target");
            }
            known
        });
        if verdict.passed {
            // A passing review never produces resume targets.
            targets.clear();
        }
        let feedback = normalize_feedback(&verdict.feedback);

        run.status = RunStatus::Success;
        run.completed_at = Some(Utc::now());
        run.review_summary = invocation.response.summary;
        run.parent_review_passed = Some(verdict.passed);
        run.parent_review_resume_task_ids = targets.clone();
        run.parent_review_feedback = (!feedback.is_empty()).then(|| feedback.clone());
        save_run(&self.paths.runs_dir, &run)?;

        if !verdict.passed {
            let now = Utc::now();
            for target in &targets {
                upsert_pending_feedback(
                    &self.paths.feedback_dir,
                    target,
                    &parent.id,
                    &run.id,
                    &feedback,
                    now,
                )?;
            }
            info!(
                parent_id = %parent.id,
                reopened = targets.len(),
                "parent review failed, children queued for resume"
            );
        } else {
            info!(parent_id = %parent.id, "parent review passed");
        }

        Ok(ReviewOutcome::Reviewed(run))
    }
}
