//! Structural validation for the work graph.
//!
//! `validate` accumulates every problem in one pass so callers can present the
//! full list at once. Mutations, by contrast, fail fast; see `core::mutate`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::graph::{WorkGraph, WorkItem};

/// One structural problem, anchored at the offending item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Check every graph invariant, never failing fast.
///
/// Covered: unknown parent/child/dep references, parent/child mismatch, item
/// claimed by multiple parents, dependency cycles (3-color DFS over the whole
/// item set), parent-tree cycles (separate ancestry walk), timestamp ordering,
/// and `dep_rationale` keys outside `deps`.
pub fn validate(graph: &WorkGraph) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut claimed_by: BTreeMap<&str, &str> = BTreeMap::new();
    for item in graph.items.values() {
        validate_item(graph, item, &mut claimed_by, &mut errors);
    }

    errors.extend(dep_cycle_errors(graph));
    errors.extend(parent_cycle_errors(graph));
    errors
}

fn validate_item<'a>(
    graph: &'a WorkGraph,
    item: &'a WorkItem,
    claimed_by: &mut BTreeMap<&'a str, &'a str>,
    errors: &mut Vec<ValidationError>,
) {
    let path = item.id.as_str();

    for child_id in &item.child_ids {
        match graph.get(child_id) {
            None => errors.push(ValidationError::new(
                path,
                format!("child '{child_id}' does not exist"),
            )),
            Some(child) => {
                if child.parent_id.as_deref() != Some(item.id.as_str()) {
                    errors.push(ValidationError::new(
                        path,
                        format!(
                            "child '{}' has parent_id {:?}, expected '{}'",
                            child_id, child.parent_id, item.id
                        ),
                    ));
                }
            }
        }
        if let Some(other) = claimed_by.insert(child_id.as_str(), item.id.as_str()) {
            if other != item.id {
                errors.push(ValidationError::new(
                    child_id,
                    format!("item listed under multiple parents ('{other}' and '{}')", item.id),
                ));
            } else {
                errors.push(ValidationError::new(
                    path,
                    format!("child '{child_id}' listed more than once"),
                ));
            }
        }
    }

    if let Some(parent_id) = &item.parent_id {
        match graph.get(parent_id) {
            None => errors.push(ValidationError::new(
                path,
                format!("parent '{parent_id}' does not exist"),
            )),
            Some(parent) => {
                if !parent.child_ids.iter().any(|c| c == &item.id) {
                    errors.push(ValidationError::new(
                        path,
                        format!("parent '{parent_id}' does not list this item as a child"),
                    ));
                }
            }
        }
    }

    for dep in &item.deps {
        if dep == &item.id {
            errors.push(ValidationError::new(path, "item depends on itself"));
        } else if graph.get(dep).is_none() {
            errors.push(ValidationError::new(
                path,
                format!("dependency '{dep}' does not exist"),
            ));
        }
    }

    for key in item.dep_rationale.keys() {
        if !item.deps.contains(key) {
            errors.push(ValidationError::new(
                path,
                format!("dep_rationale key '{key}' is not a dependency"),
            ));
        }
    }

    if item.updated_at < item.created_at {
        errors.push(ValidationError::new(path, "updated_at precedes created_at"));
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// 3-color DFS over the dependency edges of the *entire* item set, so cycles
/// in disconnected components are still caught.
fn dep_cycle_errors(graph: &WorkGraph) -> Vec<ValidationError> {
    let mut color: BTreeMap<&str, Color> = graph
        .items
        .keys()
        .map(|id| (id.as_str(), Color::White))
        .collect();
    let mut errors = Vec::new();

    for id in graph.items.keys() {
        if color[id.as_str()] == Color::White {
            dep_dfs(graph, id, &mut color, &mut errors);
        }
    }
    errors
}

fn dep_dfs<'a>(
    graph: &'a WorkGraph,
    id: &'a str,
    color: &mut BTreeMap<&'a str, Color>,
    errors: &mut Vec<ValidationError>,
) {
    color.insert(id, Color::Gray);
    if let Some(item) = graph.get(id) {
        for dep in &item.deps {
            match color.get(dep.as_str()) {
                Some(Color::White) => dep_dfs(graph, dep, color, errors),
                Some(Color::Gray) => errors.push(ValidationError::new(
                    id,
                    format!("dependency cycle via '{dep}'"),
                )),
                Some(Color::Black) | None => {}
            }
        }
    }
    color.insert(id, Color::Black);
}

/// Walk `parent_id` chains; any chain that revisits a node is a cycle. This is
/// deliberately independent of the dependency-cycle check above.
fn parent_cycle_errors(graph: &WorkGraph) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut reported: BTreeSet<&str> = BTreeSet::new();

    for start in graph.items.keys() {
        if reported.contains(start.as_str()) {
            continue;
        }
        let mut chain: BTreeSet<&str> = BTreeSet::new();
        let mut current = start.as_str();
        chain.insert(current);
        while let Some(parent_id) = graph.get(current).and_then(|i| i.parent_id.as_deref()) {
            if graph.get(parent_id).is_none() {
                break;
            }
            if !chain.insert(parent_id) {
                if reported.insert(parent_id) {
                    errors.push(ValidationError::new(
                        parent_id,
                        "cycle in the parent tree",
                    ));
                }
                break;
            }
            current = parent_id;
        }
    }
    errors
}
