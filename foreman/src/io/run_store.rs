//! Append-oriented run log plus the pending parent-review feedback store.
//!
//! One JSON file per attempt under `runs/<task-id>/`, so the latest-run query
//! scans a single task's directory, not the whole project's history. Pending
//! feedback is one keyed file per task under `feedback/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of attempt a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Task,
    Review,
}

/// Lifecycle of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    WaitingUser,
}

/// Human checkpoint state attached to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    Pending,
    ApprovedContinue,
    ApprovedQuit,
    ChangesRequested,
    Rejected,
}

/// Per-child outcome packaged into a parent review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentReviewTaskResult {
    pub task_id: String,
    pub passed: bool,
    #[serde(default)]
    pub feedback: String,
}

/// One persisted attempt. Created at dispatch, finalized at completion,
/// immutable thereafter (decision resolution is the one sanctioned update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub task_id: String,
    pub kind: RunType,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    /// Context snapshot injected into the request (prior summary, feedback).
    #[serde(default)]
    pub context: Option<String>,
    /// Raw clarifying-question payload for waiting_user runs.
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub decision_required: bool,
    #[serde(default)]
    pub decision_state: Option<DecisionState>,
    #[serde(default)]
    pub decision_requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decision_feedback: Option<String>,
    #[serde(default)]
    pub review_summary: Option<String>,
    #[serde(default)]
    pub parent_review_passed: Option<bool>,
    /// Normalized (trimmed, deduped, sorted) at record time.
    #[serde(default)]
    pub parent_review_resume_task_ids: Vec<String>,
    #[serde(default)]
    pub parent_review_feedback: Option<String>,
    #[serde(default)]
    pub parent_review_results: Vec<ParentReviewTaskResult>,
}

impl RunRecord {
    /// Fresh running record for a dispatch.
    pub fn started(id: &str, task_id: &str, kind: RunType, started_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            task_id: task_id.to_string(),
            kind,
            status: RunStatus::Running,
            started_at,
            completed_at: None,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            context: None,
            questions: Vec::new(),
            decision_required: false,
            decision_state: None,
            decision_requested_at: None,
            decision_feedback: None,
            review_summary: None,
            parent_review_passed: None,
            parent_review_resume_task_ids: Vec::new(),
            parent_review_feedback: None,
            parent_review_results: Vec::new(),
        }
    }

    /// Children a failed parent review asked to reopen.
    pub fn resume_targets(&self) -> &[String] {
        &self.parent_review_resume_task_ids
    }
}

/// Durable note asking a child task to be re-run with review guidance.
/// Keyed by child task id; upsert overwrites (no history kept).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingParentReviewFeedback {
    pub parent_task_id: String,
    pub review_run_id: String,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn task_runs_dir(runs_dir: &Path, task_id: &str) -> PathBuf {
    runs_dir.join(task_id)
}

fn run_path(runs_dir: &Path, task_id: &str, run_id: &str) -> PathBuf {
    task_runs_dir(runs_dir, task_id).join(format!("{run_id}.json"))
}

/// Next sequential run id for a task (`run-0001`, `run-0002`, ...), derived
/// from the files already present.
pub fn next_run_id(runs_dir: &Path, task_id: &str) -> Result<String> {
    let dir = task_runs_dir(runs_dir, task_id);
    let mut max_seq = 0u32;
    if dir.exists() {
        for entry in fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))? {
            let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(seq) = name
                .strip_prefix("run-")
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|digits| digits.parse::<u32>().ok())
            {
                max_seq = max_seq.max(seq);
            }
        }
    }
    Ok(format!("run-{:04}", max_seq + 1))
}

/// Persist one run record atomically (temp file + rename).
pub fn save_run(runs_dir: &Path, record: &RunRecord) -> Result<()> {
    let path = run_path(runs_dir, &record.task_id, &record.id);
    debug!(task_id = %record.task_id, run_id = %record.id, status = ?record.status, "saving run");
    let mut buf = serde_json::to_string_pretty(record)?;
    buf.push('\n');
    write_atomic(&path, &buf)
}

/// Load one run record by exact id.
pub fn load_run(runs_dir: &Path, task_id: &str, run_id: &str) -> Result<RunRecord> {
    let path = run_path(runs_dir, task_id, run_id);
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read run {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse run {}", path.display()))
}

/// All runs for a task, ordered by `(started_at, id)` ascending.
pub fn list_runs(runs_dir: &Path, task_id: &str) -> Result<Vec<RunRecord>> {
    let dir = task_runs_dir(runs_dir, task_id);
    let mut runs = Vec::new();
    if !dir.exists() {
        return Ok(runs);
    }
    for entry in fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read run {}", path.display()))?;
        let record: RunRecord = serde_json::from_str(&contents)
            .with_context(|| format!("parse run {}", path.display()))?;
        runs.push(record);
    }
    runs.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(runs)
}

/// The record with the greatest `started_at` for a task, if any. Cost is
/// proportional to that task's own run count.
pub fn latest_run(runs_dir: &Path, task_id: &str) -> Result<Option<RunRecord>> {
    Ok(list_runs(runs_dir, task_id)?.pop())
}

fn feedback_path(feedback_dir: &Path, task_id: &str) -> PathBuf {
    feedback_dir.join(format!("{task_id}.json"))
}

/// Upsert pending feedback for a child task (last write wins; `created_at`
/// of an existing entry is preserved).
pub fn upsert_pending_feedback(
    feedback_dir: &Path,
    task_id: &str,
    parent_task_id: &str,
    review_run_id: &str,
    feedback: &str,
    now: DateTime<Utc>,
) -> Result<PendingParentReviewFeedback> {
    let created_at = load_pending_feedback(feedback_dir, task_id)?
        .map(|existing| existing.created_at)
        .unwrap_or(now);
    let entry = PendingParentReviewFeedback {
        parent_task_id: parent_task_id.to_string(),
        review_run_id: review_run_id.to_string(),
        feedback: feedback.to_string(),
        created_at,
        updated_at: now,
    };
    let path = feedback_path(feedback_dir, task_id);
    debug!(task_id, review_run_id, "upserting pending feedback");
    let mut buf = serde_json::to_string_pretty(&entry)?;
    buf.push('\n');
    write_atomic(&path, &buf)?;
    Ok(entry)
}

/// Load pending feedback for a child task, if present.
pub fn load_pending_feedback(
    feedback_dir: &Path,
    task_id: &str,
) -> Result<Option<PendingParentReviewFeedback>> {
    let path = feedback_path(feedback_dir, task_id);
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read feedback {}", path.display()))?;
    let entry = serde_json::from_str(&contents)
        .with_context(|| format!("parse feedback {}", path.display()))?;
    Ok(Some(entry))
}

/// Remove pending feedback for a child task (no-op when absent).
pub fn clear_pending_feedback(feedback_dir: &Path, task_id: &str) -> Result<()> {
    let path = feedback_path(feedback_dir, task_id);
    if path.exists() {
        fs::remove_file(&path).with_context(|| format!("remove feedback {}", path.display()))?;
    }
    Ok(())
}

/// Task ids with pending feedback, in id order.
pub fn list_pending_feedback(feedback_dir: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    if !feedback_dir.exists() {
        return Ok(ids);
    }
    for entry in
        fs::read_dir(feedback_dir).with_context(|| format!("read {}", feedback_dir.display()))?
    {
        let entry = entry.with_context(|| format!("read entry in {}", feedback_dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(task_id) = name.strip_suffix(".json") {
            ids.push(task_id.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
