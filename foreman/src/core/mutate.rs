//! Fail-fast graph mutations.
//!
//! Every function validates its preconditions before touching the graph: on
//! error the graph is byte-identical to what the caller passed in. Batch
//! semantics live in `core::patch`.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use crate::graph::{WorkGraph, WorkItem, unset_time};

/// Item ids become file names under the run log, so the charset is restricted.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        bail!("item id must be non-empty");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        bail!("item id '{id}' contains characters outside [A-Za-z0-9._-]");
    }
    Ok(())
}

/// Insert `item` under `parent_id` at `index` (append when `None`).
///
/// Rejects id collisions, missing parents, and unknown dependency targets.
/// Zero timestamps are stamped with `now`.
pub fn add_item(
    graph: &mut WorkGraph,
    mut item: WorkItem,
    parent_id: Option<&str>,
    index: Option<usize>,
    now: DateTime<Utc>,
) -> Result<()> {
    validate_id(&item.id)?;
    if graph.items.contains_key(&item.id) {
        bail!("item '{}' already exists", item.id);
    }
    if let Some(parent_id) = parent_id {
        if graph.get(parent_id).is_none() {
            bail!("parent '{parent_id}' does not exist");
        }
    }
    for dep in &item.deps {
        if dep == &item.id {
            bail!("item '{}' cannot depend on itself", item.id);
        }
        if graph.get(dep).is_none() {
            bail!("dependency '{dep}' does not exist");
        }
    }
    for key in item.dep_rationale.keys() {
        if !item.deps.contains(key) {
            bail!("dep_rationale key '{key}' is not a dependency");
        }
    }

    if item.created_at == unset_time() {
        item.created_at = now;
    }
    if item.updated_at < item.created_at {
        item.updated_at = item.created_at;
    }
    item.parent_id = parent_id.map(str::to_string);
    item.child_ids = Vec::new();

    let id = item.id.clone();
    if let Some(parent_id) = parent_id {
        let parent = graph.get_mut(parent_id).expect("parent checked above");
        let at = index.unwrap_or(parent.child_ids.len()).min(parent.child_ids.len());
        parent.child_ids.insert(at, id.clone());
        parent.updated_at = now;
    }
    graph.items.insert(id, item);
    Ok(())
}

/// Reparent `id` under `new_parent_id` at `index`.
///
/// Rejects a move that would make the item an ancestor of its new parent.
pub fn move_item(
    graph: &mut WorkGraph,
    id: &str,
    new_parent_id: Option<&str>,
    index: Option<usize>,
    now: DateTime<Utc>,
) -> Result<()> {
    if graph.get(id).is_none() {
        bail!("item '{id}' does not exist");
    }
    if let Some(new_parent_id) = new_parent_id {
        if new_parent_id == id {
            bail!("cannot move '{id}' under itself");
        }
        if graph.get(new_parent_id).is_none() {
            bail!("parent '{new_parent_id}' does not exist");
        }
        if is_ancestor(graph, id, new_parent_id) {
            bail!("moving '{id}' under '{new_parent_id}' would create a cycle in the parent tree");
        }
    }

    let old_parent_id = graph.get(id).expect("checked above").parent_id.clone();
    if let Some(old_parent_id) = &old_parent_id {
        if let Some(old_parent) = graph.get_mut(old_parent_id) {
            old_parent.child_ids.retain(|c| c != id);
            old_parent.updated_at = now;
        }
    }

    if let Some(new_parent_id) = new_parent_id {
        let parent = graph.get_mut(new_parent_id).expect("parent checked above");
        let at = index.unwrap_or(parent.child_ids.len()).min(parent.child_ids.len());
        parent.child_ids.insert(at, id.to_string());
        parent.updated_at = now;
    }

    let item = graph.get_mut(id).expect("checked above");
    item.parent_id = new_parent_id.map(str::to_string);
    item.updated_at = now;
    Ok(())
}

/// Remove `id` from the graph.
///
/// With children present, requires `force_children` (the whole subtree is
/// removed). With outside items depending on the removed subtree, requires
/// `force_deps` (the dangling edges are stripped).
pub fn delete_item(
    graph: &mut WorkGraph,
    id: &str,
    force_children: bool,
    force_deps: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(item) = graph.get(id) else {
        bail!("item '{id}' does not exist");
    };
    if !item.child_ids.is_empty() && !force_children {
        bail!(
            "item '{id}' has {} children (pass force_children to delete the subtree)",
            item.child_ids.len()
        );
    }

    let mut subtree = BTreeSet::new();
    collect_subtree(graph, id, &mut subtree);

    let dangling: Vec<String> = graph
        .items
        .values()
        .filter(|other| !subtree.contains(other.id.as_str()))
        .filter(|other| other.deps.iter().any(|d| subtree.contains(d.as_str())))
        .map(|other| other.id.clone())
        .collect();
    if !dangling.is_empty() && !force_deps {
        bail!(
            "deleting '{id}' would strip dependencies of: {} (pass force_deps)",
            dangling.join(", ")
        );
    }

    let parent_id = graph.get(id).expect("checked above").parent_id.clone();
    if let Some(parent_id) = &parent_id {
        if let Some(parent) = graph.get_mut(parent_id) {
            parent.child_ids.retain(|c| c != id);
            parent.updated_at = now;
        }
    }

    for other_id in dangling {
        let other = graph.get_mut(&other_id).expect("collected above");
        other.deps.retain(|d| !subtree.contains(d.as_str()));
        other
            .dep_rationale
            .retain(|k, _| !subtree.contains(k.as_str()));
        other.updated_at = now;
    }

    let doomed: Vec<String> = subtree.iter().map(|s| s.to_string()).collect();
    for doomed_id in doomed {
        graph.items.remove(&doomed_id);
    }
    Ok(())
}

/// Replace the dependency set of `id`, re-checking acyclicity on the
/// candidate edges before committing anything.
pub fn set_deps(
    graph: &mut WorkGraph,
    id: &str,
    deps: &[String],
    rationale: &BTreeMap<String, String>,
    now: DateTime<Utc>,
) -> Result<()> {
    if graph.get(id).is_none() {
        bail!("item '{id}' does not exist");
    }
    let new_deps: BTreeSet<String> = deps.iter().cloned().collect();
    for dep in &new_deps {
        if dep == id {
            bail!("item '{id}' cannot depend on itself");
        }
        if graph.get(dep).is_none() {
            bail!("dependency '{dep}' does not exist");
        }
    }
    for key in rationale.keys() {
        if !new_deps.contains(key) {
            bail!("dep_rationale key '{key}' is not a dependency");
        }
    }
    if let Some(via) = closes_dep_cycle(graph, id, &new_deps) {
        bail!("dependency on '{via}' would close a cycle through '{id}'");
    }

    let item = graph.get_mut(id).expect("checked above");
    item.deps = new_deps;
    item.dep_rationale = rationale.clone();
    item.updated_at = now;
    Ok(())
}

/// Add a single dependency edge, rejecting cycles before committing.
pub fn add_dep(
    graph: &mut WorkGraph,
    id: &str,
    dep_id: &str,
    rationale: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(item) = graph.get(id) else {
        bail!("item '{id}' does not exist");
    };
    if dep_id == id {
        bail!("item '{id}' cannot depend on itself");
    }
    if graph.get(dep_id).is_none() {
        bail!("dependency '{dep_id}' does not exist");
    }
    let mut candidate = item.deps.clone();
    candidate.insert(dep_id.to_string());
    if let Some(via) = closes_dep_cycle(graph, id, &candidate) {
        bail!("dependency on '{via}' would close a cycle through '{id}'");
    }

    let item = graph.get_mut(id).expect("checked above");
    item.deps.insert(dep_id.to_string());
    if let Some(rationale) = rationale {
        item.dep_rationale
            .insert(dep_id.to_string(), rationale.to_string());
    }
    item.updated_at = now;
    Ok(())
}

/// Remove a single dependency edge (and its rationale entry).
pub fn remove_dep(graph: &mut WorkGraph, id: &str, dep_id: &str, now: DateTime<Utc>) -> Result<()> {
    let Some(item) = graph.get(id) else {
        bail!("item '{id}' does not exist");
    };
    if !item.deps.contains(dep_id) {
        bail!("item '{id}' has no dependency on '{dep_id}'");
    }
    let item = graph.get_mut(id).expect("checked above");
    item.deps.remove(dep_id);
    item.dep_rationale.remove(dep_id);
    item.updated_at = now;
    Ok(())
}

/// True if `candidate_ancestor` appears on the parent chain of `of`.
fn is_ancestor(graph: &WorkGraph, candidate_ancestor: &str, of: &str) -> bool {
    let mut seen = BTreeSet::new();
    let mut current = of;
    while let Some(parent_id) = graph.get(current).and_then(|i| i.parent_id.as_deref()) {
        if parent_id == candidate_ancestor {
            return true;
        }
        if !seen.insert(parent_id) {
            return false;
        }
        current = parent_id;
    }
    false
}

fn collect_subtree(graph: &WorkGraph, id: &str, out: &mut BTreeSet<String>) {
    if !out.insert(id.to_string()) {
        return;
    }
    if let Some(item) = graph.get(id) {
        for child_id in &item.child_ids {
            collect_subtree(graph, child_id, out);
        }
    }
}

/// If `id` took `new_deps` as its dependency set, would the Deps relation gain
/// a cycle? Returns the offending dep. Only `id`'s outgoing edges change, so
/// it suffices to look for a path from each new dep back to `id`.
fn closes_dep_cycle(graph: &WorkGraph, id: &str, new_deps: &BTreeSet<String>) -> Option<String> {
    for dep in new_deps {
        if reaches(graph, dep, id, &mut BTreeSet::new()) {
            return Some(dep.clone());
        }
    }
    None
}

fn reaches<'a>(
    graph: &'a WorkGraph,
    from: &'a str,
    target: &str,
    visited: &mut BTreeSet<&'a str>,
) -> bool {
    if from == target {
        return true;
    }
    if !visited.insert(from) {
        return false;
    }
    let Some(item) = graph.get(from) else {
        return false;
    };
    item.deps
        .iter()
        .any(|dep| reaches(graph, dep, target, visited))
}
