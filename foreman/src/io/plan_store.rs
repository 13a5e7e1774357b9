//! Plan file load/save with schema + invariant validation.
//!
//! The plan file is the single source of truth for the scheduling loop: it is
//! re-read before every dispatch and written atomically after every mutation,
//! which is what makes external edits and process restarts safe.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::core::validate::validate;
use crate::graph::WorkGraph;

pub const PLAN_SCHEMA: &str = include_str!("../../schemas/plan/v1.schema.json");

/// Load failures callers must tell apart: a missing plan gets "run `foreman
/// init`" remediation, a broken one gets the validation detail.
#[derive(Debug, Error)]
pub enum PlanStoreError {
    #[error("plan not found at {path}")]
    NotFound { path: PathBuf },
    #[error("plan invalid at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Load and validate the plan (JSON Schema, then graph invariants).
pub fn load_plan(path: &Path) -> Result<WorkGraph> {
    debug!(path = %path.display(), "loading plan");
    if !path.exists() {
        return Err(PlanStoreError::NotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .map_err(|err| invalid(path, format!("not valid JSON: {err}")))?;
    validate_schema(path, &value)?;
    let graph: WorkGraph =
        serde_json::from_value(value).map_err(|err| invalid(path, err.to_string()))?;

    let errors = validate(&graph);
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return Err(invalid(path, messages.join("; ")).into());
    }
    debug!(items = graph.items.len(), "plan loaded");
    Ok(graph)
}

/// Atomically write the plan (temp file + rename). Refuses to persist a graph
/// that fails invariant validation.
pub fn save_plan(path: &Path, graph: &WorkGraph) -> Result<()> {
    let errors = validate(graph);
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return Err(anyhow!(
            "refusing to save invalid plan: {}",
            messages.join("; ")
        ));
    }
    debug!(path = %path.display(), items = graph.items.len(), "saving plan");
    let mut buf = serde_json::to_string_pretty(graph)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn validate_schema(path: &Path, value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).context("parse embedded plan schema")?;
    let compiled =
        validator_for(&schema).map_err(|err| anyhow!("invalid embedded schema: {err}"))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(invalid(path, messages.join("; ")).into());
    }
    Ok(())
}

fn invalid(path: &Path, reason: String) -> PlanStoreError {
    PlanStoreError::Invalid {
        path: path.to_path_buf(),
        reason,
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("plan path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp plan {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace plan {}", path.display()))?;
    Ok(())
}
