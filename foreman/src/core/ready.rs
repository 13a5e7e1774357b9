//! Scheduling eligibility derived from status and dependency completion.

use crate::graph::{Status, WorkGraph, WorkItem};

/// Display/scheduling label for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessLabel {
    Ready,
    Blocked,
    Queued,
    InProgress,
    WaitingUser,
    Done,
    Failed,
    Skipped,
}

impl ReadinessLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadinessLabel::Ready => "READY",
            ReadinessLabel::Blocked => "BLOCKED",
            ReadinessLabel::Queued => "QUEUED",
            ReadinessLabel::InProgress => "IN_PROGRESS",
            ReadinessLabel::WaitingUser => "WAITING_USER",
            ReadinessLabel::Done => "DONE",
            ReadinessLabel::Failed => "FAILED",
            ReadinessLabel::Skipped => "SKIPPED",
        }
    }
}

/// Dependencies whose target is not `done`, in id order.
///
/// A `skipped` dependency does NOT count as satisfied: skipping a task means
/// its output never materialized, so downstream work stays blocked until a
/// human re-plans it.
pub fn unmet_deps<'a>(graph: &WorkGraph, item: &'a WorkItem) -> Vec<&'a str> {
    item.deps
        .iter()
        .filter(|dep| {
            graph
                .get(dep)
                .map(|target| target.status != Status::Done)
                .unwrap_or(true)
        })
        .map(String::as_str)
        .collect()
}

/// Pure mapping from (status, deps satisfied, manual block) to a label.
pub fn readiness_label(status: Status, deps_ok: bool, manually_blocked: bool) -> ReadinessLabel {
    match status {
        Status::Todo if deps_ok && !manually_blocked => ReadinessLabel::Ready,
        Status::Todo => ReadinessLabel::Blocked,
        Status::Queued => ReadinessLabel::Queued,
        Status::InProgress => ReadinessLabel::InProgress,
        Status::WaitingUser => ReadinessLabel::WaitingUser,
        Status::Blocked => ReadinessLabel::Blocked,
        Status::Done => ReadinessLabel::Done,
        Status::Failed => ReadinessLabel::Failed,
        Status::Skipped => ReadinessLabel::Skipped,
    }
}

/// Label for an item in context of its graph.
pub fn label_for(graph: &WorkGraph, item: &WorkItem) -> ReadinessLabel {
    let deps_ok = unmet_deps(graph, item).is_empty();
    readiness_label(item.status, deps_ok, item.status == Status::Blocked)
}

/// All READY items, in id order. This is the orchestrator's dispatch
/// candidate set and must be reproducible across runs on the same graph.
pub fn ready_tasks(graph: &WorkGraph) -> Vec<&WorkItem> {
    graph
        .items
        .values()
        .filter(|item| label_for(graph, item) == ReadinessLabel::Ready)
        .collect()
}

/// Reverse dependency index for `id`, in id order. Display only; the
/// scheduler never consults it.
pub fn dependents<'a>(graph: &'a WorkGraph, id: &str) -> Vec<&'a str> {
    graph
        .items
        .values()
        .filter(|item| item.deps.contains(id))
        .map(|item| item.id.as_str())
        .collect()
}
