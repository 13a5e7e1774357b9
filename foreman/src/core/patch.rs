//! Transactional batches of graph mutations.
//!
//! A patch applies against a clone of the graph; the caller's graph is
//! replaced only when every op succeeds and the final result validates.
//! This is the one surface where agent-authored edit sequences enter the
//! graph, so it must behave all-or-nothing.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::mutate::{add_dep, add_item, delete_item, move_item, remove_dep, set_deps};
use crate::core::validate::validate;
use crate::graph::{Status, WorkGraph, WorkItem};

/// One edit operation, discriminated by the `op` tag. Unknown tags are
/// rejected at deserialization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    Add {
        item: WorkItem,
        #[serde(default)]
        parent_id: Option<String>,
        #[serde(default)]
        index: Option<usize>,
    },
    Update {
        id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        acceptance_criteria: Option<Vec<String>>,
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default)]
        status: Option<Status>,
        #[serde(default)]
        notes: Option<String>,
    },
    Delete {
        id: String,
        #[serde(default)]
        force_children: bool,
        #[serde(default)]
        force_deps: bool,
    },
    Move {
        id: String,
        #[serde(default)]
        parent_id: Option<String>,
        #[serde(default)]
        index: Option<usize>,
    },
    SetDeps {
        id: String,
        deps: Vec<String>,
        #[serde(default)]
        rationale: BTreeMap<String, String>,
    },
    AddDep {
        id: String,
        dep_id: String,
        #[serde(default)]
        rationale: Option<String>,
    },
    RemoveDep {
        id: String,
        dep_id: String,
    },
}

impl PatchOp {
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::Add { .. } => "add",
            PatchOp::Update { .. } => "update",
            PatchOp::Delete { .. } => "delete",
            PatchOp::Move { .. } => "move",
            PatchOp::SetDeps { .. } => "set_deps",
            PatchOp::AddDep { .. } => "add_dep",
            PatchOp::RemoveDep { .. } => "remove_dep",
        }
    }
}

/// Apply `ops` in order against a clone; commit only if every op succeeds and
/// the final graph validates. On error the caller's graph is untouched.
pub fn apply_patch(graph: &mut WorkGraph, ops: &[PatchOp], now: DateTime<Utc>) -> Result<()> {
    let mut work = graph.clone();
    for (idx, op) in ops.iter().enumerate() {
        apply_op(&mut work, op, now)
            .with_context(|| format!("patch op {} ({})", idx + 1, op.name()))?;
    }
    let errors = validate(&work);
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("patched graph failed validation: {}", messages.join("; "));
    }
    *graph = work;
    Ok(())
}

fn apply_op(graph: &mut WorkGraph, op: &PatchOp, now: DateTime<Utc>) -> Result<()> {
    match op {
        PatchOp::Add {
            item,
            parent_id,
            index,
        } => add_item(graph, item.clone(), parent_id.as_deref(), *index, now),
        PatchOp::Update {
            id,
            title,
            description,
            acceptance_criteria,
            prompt,
            status,
            notes,
        } => apply_update(
            graph,
            id,
            title.as_deref(),
            description.as_deref(),
            acceptance_criteria.as_deref(),
            prompt.as_deref(),
            *status,
            notes.as_deref(),
            now,
        ),
        PatchOp::Delete {
            id,
            force_children,
            force_deps,
        } => delete_item(graph, id, *force_children, *force_deps, now),
        PatchOp::Move {
            id,
            parent_id,
            index,
        } => move_item(graph, id, parent_id.as_deref(), *index, now),
        PatchOp::SetDeps {
            id,
            deps,
            rationale,
        } => set_deps(graph, id, deps, rationale, now),
        PatchOp::AddDep {
            id,
            dep_id,
            rationale,
        } => add_dep(graph, id, dep_id, rationale.as_deref(), now),
        PatchOp::RemoveDep { id, dep_id } => remove_dep(graph, id, dep_id, now),
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_update(
    graph: &mut WorkGraph,
    id: &str,
    title: Option<&str>,
    description: Option<&str>,
    acceptance_criteria: Option<&[String]>,
    prompt: Option<&str>,
    status: Option<Status>,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(item) = graph.get_mut(id) else {
        bail!("item '{id}' does not exist");
    };
    if let Some(title) = title {
        item.title = title.to_string();
    }
    if let Some(description) = description {
        item.description = description.to_string();
    }
    if let Some(acceptance) = acceptance_criteria {
        item.acceptance_criteria = acceptance.to_vec();
    }
    if let Some(prompt) = prompt {
        item.prompt = prompt.to_string();
    }
    if let Some(status) = status {
        item.status = status;
    }
    if let Some(notes) = notes {
        item.notes = Some(notes.to_string());
    }
    item.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ready::ready_tasks;
    use crate::test_support::{graph_with, item, item_under, now};

    #[test]
    fn unknown_op_tag_is_rejected() {
        let err = serde_json::from_str::<PatchOp>(r#"{"op":"explode","id":"x"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }

    #[test]
    fn ops_round_trip_through_json() {
        let op = PatchOp::AddDep {
            id: "task".to_string(),
            dep_id: "root".to_string(),
            rationale: None,
        };
        let json = serde_json::to_string(&op).expect("serialize");
        assert!(json.contains(r#""op":"add_dep""#));
        let back: PatchOp = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, op);
    }

    #[test]
    fn failing_op_leaves_graph_deeply_equal_to_before() {
        let mut graph = graph_with(vec![item("a"), item("b")]);
        let before = graph.clone();

        let ops = vec![
            PatchOp::AddDep {
                id: "b".to_string(),
                dep_id: "a".to_string(),
                rationale: None,
            },
            // Fails: closes a cycle.
            PatchOp::AddDep {
                id: "a".to_string(),
                dep_id: "b".to_string(),
                rationale: None,
            },
        ];
        let err = apply_patch(&mut graph, &ops, now(5)).unwrap_err();
        assert!(format!("{err:#}").contains("patch op 2"));
        assert_eq!(graph, before);
    }

    #[test]
    fn batch_commits_only_as_a_whole() {
        let mut graph = graph_with(vec![item("root")]);
        let ops = vec![
            PatchOp::Add {
                item: item("task"),
                parent_id: Some("root".to_string()),
                index: None,
            },
            PatchOp::AddDep {
                id: "task".to_string(),
                dep_id: "root".to_string(),
                rationale: None,
            },
        ];
        apply_patch(&mut graph, &ops, now(5)).expect("patch");

        let task = graph.get("task").expect("task");
        assert!(task.deps.contains("root"));
        assert_eq!(task.parent_id.as_deref(), Some("root"));
    }

    #[test]
    fn add_dep_via_patch_gates_readiness_on_dep_completion() {
        // task depends on root, so it is excluded from the ready set until
        // root is done.
        let mut graph = graph_with(vec![item("root")]);
        apply_patch(
            &mut graph,
            &[PatchOp::Add {
                item: item_under("task", "root"),
                parent_id: Some("root".to_string()),
                index: None,
            }],
            now(1),
        )
        .expect("add child");
        apply_patch(
            &mut graph,
            &[PatchOp::AddDep {
                id: "task".to_string(),
                dep_id: "root".to_string(),
                rationale: None,
            }],
            now(2),
        )
        .expect("add dep");

        let deps: Vec<&str> = graph
            .get("task")
            .expect("task")
            .deps
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(deps, vec!["root"]);

        let ready: Vec<&str> = ready_tasks(&graph).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ready, vec!["root"]);

        apply_patch(
            &mut graph,
            &[PatchOp::Update {
                id: "root".to_string(),
                title: None,
                description: None,
                acceptance_criteria: None,
                prompt: None,
                status: Some(Status::Done),
                notes: None,
            }],
            now(3),
        )
        .expect("mark done");

        let ready: Vec<&str> = ready_tasks(&graph).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ready, vec!["task"]);
    }

    #[test]
    fn final_validation_failure_discards_clone() {
        // The update op itself succeeds, but the resulting graph violates the
        // timestamp invariant, so the whole batch must be discarded.
        let mut graph = graph_with(vec![item("a")]);
        graph.get_mut("a").expect("a").created_at = now(100);
        graph.get_mut("a").expect("a").updated_at = now(100);
        let before = graph.clone();

        let err = apply_patch(
            &mut graph,
            &[PatchOp::Update {
                id: "a".to_string(),
                title: Some("t".to_string()),
                description: None,
                acceptance_criteria: None,
                prompt: None,
                status: None,
                notes: None,
            }],
            now(50), // stamps updated_at before created_at
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed validation"));
        assert_eq!(graph, before);
    }
}
