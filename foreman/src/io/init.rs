//! Project layout and `.foreman/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;

use crate::graph::default_graph;
use crate::io::config::{OrchestratorConfig, write_config};
use crate::io::plan_store::{PLAN_SCHEMA, save_plan};

/// Canonical paths within `.foreman/` for a project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub plan_path: PathBuf,
    pub schema_path: PathBuf,
    pub config_path: PathBuf,
    pub runs_dir: PathBuf,
    pub feedback_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(".foreman");
        Self {
            root,
            plan_path: state_dir.join("plan.json"),
            schema_path: state_dir.join("plan.schema.json"),
            config_path: state_dir.join("config.toml"),
            runs_dir: state_dir.join("runs"),
            feedback_dir: state_dir.join("feedback"),
            state_dir,
        }
    }
}

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing foreman-owned files.
    pub force: bool,
}

/// Create `.foreman/` scaffolding in `root`: a single-root plan, a copy of
/// the plan schema, and a default config.
///
/// Fails if `.foreman/` already exists unless `options.force` is set.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<ProjectPaths> {
    let paths = ProjectPaths::new(root);
    if paths.state_dir.exists() && !options.force {
        return Err(anyhow!(
            "foreman init: .foreman already exists (use --force to overwrite)"
        ));
    }
    if paths.state_dir.exists() && !paths.state_dir.is_dir() {
        return Err(anyhow!("foreman init: .foreman exists but is not a directory"));
    }

    create_dir(&paths.state_dir)?;
    create_dir(&paths.runs_dir)?;
    create_dir(&paths.feedback_dir)?;

    save_plan(&paths.plan_path, &default_graph(Utc::now()))?;
    fs::write(&paths.schema_path, PLAN_SCHEMA)
        .with_context(|| format!("write schema {}", paths.schema_path.display()))?;
    write_config(&paths.config_path, &OrchestratorConfig::default())?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}
