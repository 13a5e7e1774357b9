//! Plan orchestrator CLI.
//!
//! Manages a work graph (`.foreman/plan.json`) of hierarchical,
//! dependency-ordered coding tasks and drives them one at a time through an
//! external AI coding agent, pausing for human checkpoints.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use foreman::cancel::CancelToken;
use foreman::core::ready::{dependents, label_for, ready_tasks, unmet_deps};
use foreman::decision::Decision;
use foreman::execute::{ExecuteReason, ExecuteResult, Orchestrator};
use foreman::exit_codes;
use foreman::graph::summarize_graph;
use foreman::io::agent::ProcessAgentRuntime;
use foreman::io::config::load_config;
use foreman::io::init::{InitOptions, ProjectPaths, init_project};
use foreman::io::plan_store::load_plan;
use foreman::io::run_store::list_runs;
use foreman::logging;

#[derive(Parser)]
#[command(
    name = "foreman",
    version,
    about = "Dependency-ordered plan orchestrator for AI coding agents"
)]
struct Cli {
    /// Project root (defaults to the current directory).
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.foreman/` with a default plan, schema, and config.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Check the plan against its schema and graph invariants.
    Validate,
    /// Print the plan with readiness labels.
    Status,
    /// Print the ids of tasks ready for dispatch.
    Ready,
    /// Execute ready tasks until the plan completes or pauses.
    Run,
    /// Re-enter one task (with answers) or all pending-feedback tasks.
    Resume {
        /// Task to resume; omit with --all to resume every pending task.
        #[arg(long)]
        task: Option<String>,
        /// Answer to a clarifying question (repeatable).
        #[arg(long = "answer")]
        answers: Vec<String>,
        /// Resume every task with pending parent-review feedback.
        #[arg(long, conflicts_with = "task")]
        all: bool,
    },
    /// Resolve a pending decision checkpoint.
    Decide {
        #[arg(long)]
        task: String,
        /// Exact run id of the pending checkpoint.
        #[arg(long)]
        run: String,
        #[arg(long, value_enum)]
        decision: CliDecision,
        /// Required for changes-requested.
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Print the run log for a task.
    Runs {
        #[arg(long)]
        task: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDecision {
    ApproveContinue,
    ApproveQuit,
    ChangesRequested,
    Reject,
}

impl From<CliDecision> for Decision {
    fn from(value: CliDecision) -> Self {
        match value {
            CliDecision::ApproveContinue => Decision::ApprovedContinue,
            CliDecision::ApproveQuit => Decision::ApprovedQuit,
            CliDecision::ChangesRequested => Decision::ChangesRequested,
            CliDecision::Reject => Decision::Rejected,
        }
    }
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::from(exit_codes::INVALID as u8)
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let paths = ProjectPaths::new(&cli.root);
    match cli.command {
        Command::Init { force } => {
            init_project(&cli.root, &InitOptions { force })?;
            println!("initialized {}", paths.state_dir.display());
            Ok(exit_codes::OK)
        }
        Command::Validate => cmd_validate(&paths),
        Command::Status => cmd_status(&paths),
        Command::Ready => cmd_ready(&paths),
        Command::Run => cmd_run(&paths),
        Command::Resume { task, answers, all } => cmd_resume(&paths, task, answers, all),
        Command::Decide {
            task,
            run,
            decision,
            feedback,
        } => cmd_decide(&paths, &task, &run, decision.into(), feedback),
        Command::Runs { task } => cmd_runs(&paths, &task),
    }
}

fn cmd_validate(paths: &ProjectPaths) -> Result<i32> {
    // load_plan accumulates every schema and invariant error into its
    // message, so one failed load reports the full list at once.
    match load_plan(&paths.plan_path) {
        Ok(graph) => {
            println!("plan ok ({} items)", graph.items.len());
            Ok(exit_codes::OK)
        }
        Err(err) => {
            println!("{err:#}");
            Ok(exit_codes::PLAN_INVALID)
        }
    }
}

fn cmd_status(paths: &ProjectPaths) -> Result<i32> {
    let graph = load_plan(&paths.plan_path)?;
    println!("{}", summarize_graph(&graph, usize::MAX));
    println!();
    for item in graph.items.values() {
        let mut line = format!("{}\t{}", item.id, label_for(&graph, item).as_str());
        let unmet = unmet_deps(&graph, item);
        if !unmet.is_empty() {
            line.push_str(&format!("\twaiting on: {}", unmet.join(", ")));
        }
        let dependents = dependents(&graph, &item.id);
        if !dependents.is_empty() {
            line.push_str(&format!("\tunblocks: {}", dependents.join(", ")));
        }
        println!("{line}");
    }
    Ok(exit_codes::OK)
}

fn cmd_ready(paths: &ProjectPaths) -> Result<i32> {
    let graph = load_plan(&paths.plan_path)?;
    for item in ready_tasks(&graph) {
        println!("{}", item.id);
    }
    Ok(exit_codes::OK)
}

fn cmd_run(paths: &ProjectPaths) -> Result<i32> {
    let config = load_config(&paths.config_path)?;
    let runtime = ProcessAgentRuntime::from_config(&config.agent);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);
    let result = orchestrator.execute(&CancelToken::new())?;
    report_result(&result);
    Ok(exit_code_for(&result))
}

fn cmd_resume(
    paths: &ProjectPaths,
    task: Option<String>,
    answers: Vec<String>,
    all: bool,
) -> Result<i32> {
    let config = load_config(&paths.config_path)?;
    let runtime = ProcessAgentRuntime::from_config(&config.agent);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);
    let cancel = CancelToken::new();

    if all {
        let outcomes = orchestrator.resume_pending(&cancel)?;
        if outcomes.is_empty() {
            println!("no pending parent-review feedback");
            return Ok(exit_codes::OK);
        }
        let mut worst = exit_codes::OK;
        for outcome in &outcomes {
            match &outcome.result {
                Ok(result) => {
                    report_result(result);
                    worst = worst.max(exit_code_for(result));
                }
                Err(err) => {
                    println!("{}: error: {err:#}", outcome.task_id);
                    worst = worst.max(exit_codes::INVALID);
                }
            }
        }
        return Ok(worst);
    }

    let task = task.context("--task is required unless --all is set")?;
    let result = orchestrator.resume(&cancel, &task, answers)?;
    report_result(&result);
    Ok(exit_code_for(&result))
}

fn cmd_decide(
    paths: &ProjectPaths,
    task: &str,
    run: &str,
    decision: Decision,
    feedback: Option<String>,
) -> Result<i32> {
    let config = load_config(&paths.config_path)?;
    let runtime = ProcessAgentRuntime::from_config(&config.agent);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);
    let outcome = orchestrator.resolve_decision(task, run, decision, feedback)?;
    println!(
        "decision recorded for {} ({}); continue: {}",
        outcome.task_id, outcome.run_id, outcome.continue_loop
    );
    Ok(exit_codes::OK)
}

fn cmd_runs(paths: &ProjectPaths, task: &str) -> Result<i32> {
    let runs = list_runs(&paths.runs_dir, task)?;
    if runs.is_empty() {
        println!("no runs for '{task}'");
        return Ok(exit_codes::OK);
    }
    for run in runs {
        println!(
            "{}\t{:?}\t{:?}\tstarted {}{}",
            run.id,
            run.kind,
            run.status,
            run.started_at.to_rfc3339(),
            run.decision_state
                .map(|s| format!("\tdecision {s:?}"))
                .unwrap_or_default()
        );
    }
    Ok(exit_codes::OK)
}

fn report_result(result: &ExecuteResult) {
    let task = result.task_id.as_deref().unwrap_or("-");
    match result.reason {
        ExecuteReason::Completed => match &result.task_id {
            Some(task) => println!("completed task '{task}', loop paused"),
            None => println!("plan complete"),
        },
        ExecuteReason::WaitingUser => {
            println!("task '{task}' is waiting on answers:");
            if let Some(run) = &result.run {
                for question in &run.questions {
                    println!("  - {question}");
                }
                println!("resume with: foreman resume --task {task} --answer \"...\"");
            }
        }
        ExecuteReason::Canceled => println!("canceled at task '{task}'"),
        ExecuteReason::Error => println!(
            "task '{task}' failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        ),
        ExecuteReason::ParentReviewRequired => {
            if let Some(run) = &result.run {
                let passed = run.parent_review_passed.unwrap_or(false);
                println!(
                    "parent review for '{task}': {}",
                    if passed { "passed" } else { "failed" }
                );
                if !passed {
                    for target in run.resume_targets() {
                        println!("  reopen: {target}");
                    }
                    println!("resume with: foreman resume --all");
                }
            }
        }
        ExecuteReason::DecisionRequired => {
            let run_id = result.run.as_ref().map(|r| r.id.as_str()).unwrap_or("-");
            println!(
                "task '{task}' awaits a decision: foreman decide --task {task} --run {run_id} --decision approve-continue"
            );
        }
    }
}

fn exit_code_for(result: &ExecuteResult) -> i32 {
    match result.reason {
        ExecuteReason::Completed | ExecuteReason::Canceled => exit_codes::OK,
        ExecuteReason::WaitingUser
        | ExecuteReason::ParentReviewRequired
        | ExecuteReason::DecisionRequired => exit_codes::NEEDS_HUMAN,
        ExecuteReason::Error => exit_codes::INVALID,
    }
}
