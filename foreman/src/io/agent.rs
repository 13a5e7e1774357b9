//! Agent runtime abstraction and the process-backed implementation.
//!
//! The [`AgentRuntime`] trait decouples the scheduling loop from the actual
//! agent backend. Tests use scripted runtimes that return predetermined
//! responses without spawning processes; the real backend feeds the rendered
//! prompt to a subprocess on stdin and reads a JSON response from the last
//! line of stdout.

use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::core::patch::PatchOp;
use crate::graph::WorkGraph;
use crate::io::config::AgentConfig;
use crate::io::process::{LineSink, run_command};
use crate::io::run_store::RunType;

/// Parameters for one agent invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    pub task_id: String,
    pub kind: RunType,
    /// Fully rendered prompt text.
    pub prompt: String,
    pub acceptance_criteria: Vec<String>,
    /// Prior context snapshot (previous summary, injected feedback).
    pub context: Option<String>,
    /// Human answers continuing a waiting_user session.
    pub answers: Vec<String>,
    /// Feedback injected by a decision or parent review.
    pub feedback: Option<String>,
}

/// Review-run verdict payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub passed: bool,
    #[serde(default)]
    pub resume_task_ids: Vec<String>,
    #[serde(default)]
    pub feedback: String,
}

/// Typed agent response: exactly one of a full plan, a patch, or clarifying
/// questions (a bare summary is the normal task completion).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub plan: Option<WorkGraph>,
    #[serde(default)]
    pub patch: Option<Vec<PatchOp>>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub review: Option<ReviewVerdict>,
}

impl AgentResponse {
    /// Reject responses that carry more than one payload kind.
    pub fn validate(&self) -> Result<()> {
        let mut kinds = Vec::new();
        if self.plan.is_some() {
            kinds.push("plan");
        }
        if self.patch.is_some() {
            kinds.push("patch");
        }
        if !self.questions.is_empty() {
            kinds.push("questions");
        }
        if kinds.len() > 1 {
            bail!(
                "agent response must carry at most one of plan/patch/questions, got: {}",
                kinds.join("+")
            );
        }
        Ok(())
    }
}

/// Raw observability data from one invocation.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub stdout: String,
    pub stderr: String,
    pub extracted_json: Option<Value>,
    pub exit_code: Option<i32>,
}

/// One completed invocation: the typed response plus its raw diagnostics.
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    pub response: AgentResponse,
    pub diagnostics: Diagnostics,
}

/// Abstraction over agent execution backends.
pub trait AgentRuntime {
    /// Run the agent. Blocks until the agent finishes, times out, or the
    /// token is canceled.
    fn run(&self, cancel: &CancelToken, request: &AgentRequest) -> Result<AgentInvocation>;
}

/// Marker error for a cancellation observed inside an invocation; the loop
/// maps it to a clean `Canceled` result instead of a task failure.
#[derive(Debug, Error)]
#[error("agent invocation canceled")]
pub struct AgentCanceled;

/// Runtime that spawns the configured command as a subprocess.
pub struct ProcessAgentRuntime {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
    stdout_sink: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl ProcessAgentRuntime {
    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self {
            command: cfg.command.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            output_limit_bytes: cfg.output_limit_bytes,
            stdout_sink: None,
        }
    }

    /// Attach a live observer for agent stdout lines.
    pub fn with_stdout_sink(mut self, sink: Box<dyn Fn(&str) + Send + Sync>) -> Self {
        self.stdout_sink = Some(sink);
        self
    }
}

impl AgentRuntime for ProcessAgentRuntime {
    fn run(&self, cancel: &CancelToken, request: &AgentRequest) -> Result<AgentInvocation> {
        info!(task_id = %request.task_id, kind = ?request.kind, "starting agent subprocess");

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]);

        let sink: Option<LineSink<'_>> = self.stdout_sink.as_deref();
        let output = run_command(
            cmd,
            Some(request.prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
            &|| cancel.is_canceled(),
            sink,
        )?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.canceled {
            return Err(AgentCanceled.into());
        }
        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "agent timed out");
            bail!("agent timed out after {:?}", self.timeout);
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent exited nonzero");
            bail!(
                "agent exited with status {:?}: {}",
                output.status.code(),
                tail(&stderr, 512)
            );
        }

        let extracted = extract_last_json(&stdout)
            .ok_or_else(|| anyhow!("agent stdout carried no JSON response"))?;
        let response: AgentResponse = serde_json::from_value(extracted.clone())
            .map_err(|err| anyhow!("agent response did not match the contract: {err}"))?;
        response.validate()?;
        debug!(task_id = %request.task_id, "agent subprocess completed");

        Ok(AgentInvocation {
            response,
            diagnostics: Diagnostics {
                stdout,
                stderr,
                extracted_json: Some(extracted),
                exit_code: output.status.code(),
            },
        })
    }
}

/// Last stdout line that parses as a JSON object. Agents log freely; only the
/// trailing object is the structured response.
fn extract_last_json(stdout: &str) -> Option<Value> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(Value::is_object)
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
