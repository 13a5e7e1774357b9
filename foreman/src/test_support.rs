//! Test-only helpers for constructing work graphs and scripted agents.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

use crate::cancel::CancelToken;
use crate::graph::{Status, WorkGraph, WorkItem, unset_time};
use crate::io::agent::{AgentInvocation, AgentRequest, AgentResponse, AgentRuntime, Diagnostics};

/// Deterministic timestamp `secs` after the epoch.
pub fn now(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("valid timestamp")
}

/// A todo item with deterministic defaults, unset timestamps, and no
/// relations.
pub fn item(id: &str) -> WorkItem {
    WorkItem {
        id: id.to_string(),
        title: format!("{id} title"),
        description: format!("{id} description"),
        acceptance_criteria: Vec::new(),
        prompt: format!("do {id}"),
        parent_id: None,
        child_ids: Vec::new(),
        deps: BTreeSet::new(),
        dep_rationale: BTreeMap::new(),
        status: Status::Todo,
        created_at: unset_time(),
        updated_at: unset_time(),
        notes: None,
    }
}

/// An item with an explicit status.
pub fn item_with_status(id: &str, status: Status) -> WorkItem {
    let mut item = item(id);
    item.status = status;
    item
}

/// An item whose `parent_id` is set (the parent's `child_ids` is the
/// caller's responsibility; see `linked`).
pub fn item_under(id: &str, parent: &str) -> WorkItem {
    let mut item = item(id);
    item.parent_id = Some(parent.to_string());
    item
}

/// A parent and its children with both sides of the relation wired up.
pub fn linked(parent: &str, children: &[&str]) -> Vec<WorkItem> {
    let mut root = item(parent);
    root.child_ids = children.iter().map(|c| c.to_string()).collect();
    let mut items = vec![root];
    for child in children {
        items.push(item_under(child, parent));
    }
    items
}

/// Graph from a list of items, keyed by id.
pub fn graph_with(items: Vec<WorkItem>) -> WorkGraph {
    let mut graph = WorkGraph::new();
    for item in items {
        graph.items.insert(item.id.clone(), item);
    }
    graph
}

/// A response that completes the task with a summary.
pub fn completed_response(summary: &str) -> AgentResponse {
    AgentResponse {
        summary: Some(summary.to_string()),
        ..AgentResponse::default()
    }
}

/// Scripted agent runtime: pops one queued response per invocation and
/// records every request it saw.
pub struct ScriptedRuntime {
    responses: Mutex<Vec<AgentResponse>>,
    pub requests: Mutex<Vec<AgentRequest>>,
}

impl ScriptedRuntime {
    pub fn new(mut responses: Vec<AgentResponse>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl AgentRuntime for ScriptedRuntime {
    fn run(&self, _cancel: &CancelToken, request: &AgentRequest) -> Result<AgentInvocation> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let response = self
            .responses
            .lock()
            .expect("responses lock")
            .pop()
            .ok_or_else(|| anyhow!("scripted runtime exhausted"))?;
        Ok(AgentInvocation {
            response,
            diagnostics: Diagnostics {
                stdout: "scripted stdout".to_string(),
                stderr: String::new(),
                extracted_json: None,
                exit_code: Some(0),
            },
        })
    }
}

/// Runtime that always fails, for error-path tests.
pub struct FailingRuntime;

impl AgentRuntime for FailingRuntime {
    fn run(&self, _cancel: &CancelToken, _request: &AgentRequest) -> Result<AgentInvocation> {
        Err(anyhow!("agent exploded"))
    }
}
