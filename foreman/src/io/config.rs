//! Orchestrator configuration stored under `.foreman/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Orchestrator policy knobs (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values. There is no
/// environment-driven fallback: the loaded value is passed explicitly into
/// the orchestrator's constructor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Pause the loop after each completed task instead of continuing.
    pub stop_after_each_task: bool,

    /// Require a human decision checkpoint before a successful task run may
    /// reach terminal status.
    pub require_decision: bool,

    /// Run an aggregate parent review once all children of a parent reach a
    /// terminal status.
    pub parent_review: bool,

    /// Maximum bytes for a rendered prompt before droppable sections are cut.
    pub prompt_budget_bytes: usize,

    /// Bound on graph-summary lines included in prompts.
    pub summary_max_items: usize,

    pub agent: AgentConfig,
}

/// Agent subprocess settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Command to execute for agent runs (prompt on stdin, JSON response as
    /// the last line of stdout).
    pub command: Vec<String>,

    /// Wall-clock budget for one agent invocation in seconds.
    pub timeout_secs: u64,

    /// Truncate captured agent stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: vec!["codex".to_string(), "exec".to_string()],
            timeout_secs: 30 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stop_after_each_task: false,
            require_decision: false,
            parent_review: false,
            prompt_budget_bytes: 40_000,
            summary_max_items: 200,
            agent: AgentConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.summary_max_items == 0 {
            return Err(anyhow!("summary_max_items must be > 0"));
        }
        if self.agent.timeout_secs == 0 {
            return Err(anyhow!("agent.timeout_secs must be > 0"));
        }
        if self.agent.output_limit_bytes == 0 {
            return Err(anyhow!("agent.output_limit_bytes must be > 0"));
        }
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `OrchestratorConfig::default()`.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig> {
    if !path.exists() {
        let cfg = OrchestratorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: OrchestratorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &OrchestratorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
