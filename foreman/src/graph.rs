//! Work graph data model: a containment tree plus a dependency DAG over one
//! arena of items.
//!
//! The two relations are deliberately separate: `parent_id`/`child_ids` form a
//! forest, `deps` forms a DAG, and an edge in one says nothing about the other.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current plan file schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Work item lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Todo,
    Queued,
    InProgress,
    WaitingUser,
    Blocked,
    Done,
    Failed,
    Skipped,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::Queued => "queued",
            Status::InProgress => "in_progress",
            Status::WaitingUser => "waiting_user",
            Status::Blocked => "blocked",
            Status::Done => "done",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
        }
    }

    /// Terminal statuses end a task's lifecycle; parent review triggers once
    /// every child is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Failed | Status::Skipped)
    }
}

/// Sentinel for "not yet stamped" timestamps.
pub fn unset_time() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// One task in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub prompt: String,
    /// `None` means the item is a root.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Ordered; every entry must name an existing item whose `parent_id`
    /// points back here.
    #[serde(default)]
    pub child_ids: Vec<String>,
    /// Predecessor task ids. A dependency edge may cross branches freely.
    #[serde(default)]
    pub deps: BTreeSet<String>,
    /// Keys restricted to entries of `deps`.
    #[serde(default)]
    pub dep_rationale: BTreeMap<String, String>,
    pub status: Status,
    #[serde(default = "unset_time")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "unset_time")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The full plan, keyed by item id. `BTreeMap` keeps serialization and
/// iteration order deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkGraph {
    pub schema_version: u32,
    #[serde(default)]
    pub items: BTreeMap<String, WorkItem>,
}

impl WorkGraph {
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            items: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&WorkItem> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut WorkItem> {
        self.items.get_mut(id)
    }

    /// Items without a parent, in id order.
    pub fn roots(&self) -> Vec<&WorkItem> {
        self.items
            .values()
            .filter(|item| item.parent_id.is_none())
            .collect()
    }
}

impl Default for WorkGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// A fresh single-root plan, stamped at `now`.
pub fn default_graph(now: DateTime<Utc>) -> WorkGraph {
    let mut graph = WorkGraph::new();
    graph.items.insert(
        "root".to_string(),
        WorkItem {
            id: "root".to_string(),
            title: "Root".to_string(),
            description: "Top-level goal".to_string(),
            acceptance_criteria: Vec::new(),
            prompt: String::new(),
            parent_id: None,
            child_ids: Vec::new(),
            deps: BTreeSet::new(),
            dep_rationale: BTreeMap::new(),
            status: Status::Todo,
            created_at: now,
            updated_at: now,
            notes: None,
        },
    );
    graph
}

/// Bounded indented summary of the containment tree, used in prompts.
pub fn summarize_graph(graph: &WorkGraph, max_items: usize) -> String {
    let mut lines = Vec::new();
    for root in graph.roots() {
        summarize_item(graph, root, 0, max_items, &mut lines);
    }
    lines.join("\n")
}

fn summarize_item(
    graph: &WorkGraph,
    item: &WorkItem,
    depth: usize,
    max_items: usize,
    lines: &mut Vec<String>,
) {
    if lines.len() >= max_items {
        return;
    }
    let indent = "  ".repeat(depth);
    let deps = if item.deps.is_empty() {
        String::new()
    } else {
        format!(
            " (deps: {})",
            item.deps.iter().cloned().collect::<Vec<_>>().join(", ")
        )
    };
    lines.push(format!(
        "{}- {} [{}] {}{}",
        indent,
        item.id,
        item.status.as_str(),
        item.title,
        deps
    ));
    for child_id in &item.child_ids {
        if let Some(child) = graph.get(child_id) {
            summarize_item(graph, child, depth + 1, max_items, lines);
        }
    }
}
