//! Loop-level harness tests for full orchestrator lifecycle scenarios.
//!
//! These drive `execute`/`resume`/`resolve_decision` against a real `.foreman/`
//! directory with a scripted agent runtime: dispatch order, pause points,
//! checkpoint resolution, parent reviews, and restart behavior.

use std::path::Path;

use foreman::cancel::CancelToken;
use foreman::decision::Decision;
use foreman::execute::{ExecuteReason, Orchestrator};
use foreman::graph::{Status, WorkGraph};
use foreman::io::agent::{AgentResponse, ReviewVerdict};
use foreman::io::config::OrchestratorConfig;
use foreman::io::init::ProjectPaths;
use foreman::io::plan_store::{load_plan, save_plan};
use foreman::io::run_store::{
    DecisionState, RunStatus, latest_run, list_pending_feedback, load_pending_feedback,
};
use foreman::resume::ResumeConflictError;
use foreman::test_support::{
    ScriptedRuntime, completed_response, graph_with, item, item_with_status, linked,
};

fn setup(graph: &WorkGraph, config: &OrchestratorConfig) -> (tempfile::TempDir, ProjectPaths) {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = ProjectPaths::new(temp.path());
    std::fs::create_dir_all(&paths.state_dir).expect("state dir");
    save_plan(&paths.plan_path, graph).expect("write plan");
    foreman::io::config::write_config(&paths.config_path, config).expect("write config");
    (temp, paths)
}

fn status_of(plan_path: &Path, id: &str) -> Status {
    load_plan(plan_path)
        .expect("load plan")
        .get(id)
        .unwrap_or_else(|| panic!("item {id}"))
        .status
}

fn questions_response(questions: &[&str]) -> AgentResponse {
    AgentResponse {
        questions: questions.iter().map(|q| q.to_string()).collect(),
        ..AgentResponse::default()
    }
}

fn review_response(passed: bool, resume: &[&str], feedback: &str) -> AgentResponse {
    AgentResponse {
        review: Some(ReviewVerdict {
            passed,
            resume_task_ids: resume.iter().map(|s| s.to_string()).collect(),
            feedback: feedback.to_string(),
        }),
        ..AgentResponse::default()
    }
}

/// Independent todo tasks complete in deterministic id order and the loop
/// returns Completed once nothing is ready.
#[test]
fn execute_runs_ready_tasks_in_id_order_to_completion() {
    let graph = graph_with(vec![item("b"), item("a"), item("c")]);
    let (_temp, paths) = setup(&graph, &OrchestratorConfig::default());

    let runtime = ScriptedRuntime::new(vec![
        completed_response("a done"),
        completed_response("b done"),
        completed_response("c done"),
    ]);
    let orchestrator = Orchestrator::new(paths.clone(), OrchestratorConfig::default(), &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::Completed);
    assert_eq!(result.task_id, None);

    let order: Vec<String> = runtime
        .seen_requests()
        .iter()
        .map(|r| r.task_id.clone())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    for id in ["a", "b", "c"] {
        assert_eq!(status_of(&paths.plan_path, id), Status::Done);
        let run = latest_run(&paths.runs_dir, id).expect("runs").expect("run");
        assert_eq!(run.status, RunStatus::Success);
    }
}

/// A dependency holds its dependent back until the dep is done.
#[test]
fn execute_respects_dependency_order() {
    let mut first = item("a-second");
    first.deps.insert("z-first".to_string());
    let graph = graph_with(vec![first, item("z-first")]);
    let (_temp, paths) = setup(&graph, &OrchestratorConfig::default());

    let runtime = ScriptedRuntime::new(vec![
        completed_response("z done"),
        completed_response("a done"),
    ]);
    let orchestrator = Orchestrator::new(paths.clone(), OrchestratorConfig::default(), &runtime);
    orchestrator.execute(&CancelToken::new()).expect("execute");

    let order: Vec<String> = runtime
        .seen_requests()
        .iter()
        .map(|r| r.task_id.clone())
        .collect();
    assert_eq!(order, vec!["z-first", "a-second"]);
}

/// stop_after_each_task pauses with a completed-one-task result.
#[test]
fn stop_after_each_task_pauses_the_loop() {
    let graph = graph_with(vec![item("a"), item("b")]);
    let config = OrchestratorConfig {
        stop_after_each_task: true,
        ..OrchestratorConfig::default()
    };
    let (_temp, paths) = setup(&graph, &config);

    let runtime = ScriptedRuntime::new(vec![completed_response("a done")]);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::Completed);
    assert_eq!(result.task_id.as_deref(), Some("a"));
    assert_eq!(status_of(&paths.plan_path, "a"), Status::Done);
    assert_eq!(status_of(&paths.plan_path, "b"), Status::Todo);
}

/// Clarifying questions pause the loop; resume with answers finishes the task
/// and hands the answers to the agent.
#[test]
fn waiting_user_pauses_and_resume_with_answers_continues() {
    let graph = graph_with(vec![item("t")]);
    let (_temp, paths) = setup(&graph, &OrchestratorConfig::default());

    let runtime = ScriptedRuntime::new(vec![
        questions_response(&["which database?"]),
        completed_response("t done"),
    ]);
    let orchestrator = Orchestrator::new(paths.clone(), OrchestratorConfig::default(), &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::WaitingUser);
    assert_eq!(result.task_id.as_deref(), Some("t"));
    let run = result.run.expect("run");
    assert_eq!(run.status, RunStatus::WaitingUser);
    assert_eq!(run.questions, vec!["which database?"]);
    assert_eq!(status_of(&paths.plan_path, "t"), Status::WaitingUser);

    let result = orchestrator
        .resume(&CancelToken::new(), "t", vec!["postgres".to_string()])
        .expect("resume");
    assert_eq!(result.reason, ExecuteReason::Completed);
    assert_eq!(status_of(&paths.plan_path, "t"), Status::Done);

    let requests = runtime.seen_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].answers, vec!["postgres"]);
    assert!(requests[1].prompt.contains("postgres"));
}

/// Resuming a task that is not waiting and has no feedback is an error.
#[test]
fn resume_without_anything_to_inject_fails() {
    let graph = graph_with(vec![item("t")]);
    let (_temp, paths) = setup(&graph, &OrchestratorConfig::default());
    let runtime = ScriptedRuntime::new(Vec::new());
    let orchestrator = Orchestrator::new(paths.clone(), OrchestratorConfig::default(), &runtime);

    let err = orchestrator
        .resume(&CancelToken::new(), "t", Vec::new())
        .unwrap_err();
    assert!(err.to_string().contains("nothing to resume"));
}

/// An agent failure marks the run and the task failed and surfaces Error.
#[test]
fn agent_error_fails_task_without_corrupting_plan() {
    let graph = graph_with(vec![item("t"), item("u")]);
    let (_temp, paths) = setup(&graph, &OrchestratorConfig::default());

    let runtime = foreman::test_support::FailingRuntime;
    let orchestrator = Orchestrator::new(paths.clone(), OrchestratorConfig::default(), &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::Error);
    assert_eq!(result.task_id.as_deref(), Some("t"));
    assert!(result.error.expect("error").contains("agent exploded"));

    assert_eq!(status_of(&paths.plan_path, "t"), Status::Failed);
    // The other task was never dispatched; the loop stopped at the error.
    assert_eq!(status_of(&paths.plan_path, "u"), Status::Todo);
    let run = latest_run(&paths.runs_dir, "t").expect("runs").expect("run");
    assert_eq!(run.status, RunStatus::Failed);
}

/// A pre-canceled token stops before any dispatch and mutates nothing.
#[test]
fn canceled_token_stops_cleanly() {
    let graph = graph_with(vec![item("t")]);
    let (_temp, paths) = setup(&graph, &OrchestratorConfig::default());
    let runtime = ScriptedRuntime::new(Vec::new());
    let orchestrator = Orchestrator::new(paths.clone(), OrchestratorConfig::default(), &runtime);

    let cancel = CancelToken::new();
    cancel.cancel();
    let result = orchestrator.execute(&cancel).expect("execute");
    assert_eq!(result.reason, ExecuteReason::Canceled);
    assert_eq!(status_of(&paths.plan_path, "t"), Status::Todo);
    assert!(runtime.seen_requests().is_empty());
}

/// An agent-authored patch is applied transactionally during the run.
#[test]
fn agent_patch_extends_the_plan_mid_run() {
    let graph = graph_with(vec![item("t")]);
    let (_temp, paths) = setup(&graph, &OrchestratorConfig::default());

    let patch_json = serde_json::json!([
        {"op": "add", "item": {
            "id": "follow-up", "title": "Follow up", "status": "todo",
            "prompt": "do the follow-up"
        }}
    ]);
    let patch_response = AgentResponse {
        summary: Some("t done, added follow-up".to_string()),
        patch: Some(serde_json::from_value(patch_json).expect("patch ops")),
        ..AgentResponse::default()
    };
    let runtime = ScriptedRuntime::new(vec![patch_response, completed_response("follow-up done")]);
    let orchestrator = Orchestrator::new(paths.clone(), OrchestratorConfig::default(), &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::Completed);
    assert_eq!(status_of(&paths.plan_path, "t"), Status::Done);
    assert_eq!(status_of(&paths.plan_path, "follow-up"), Status::Done);
}

/// A rejected patch fails the run and leaves the persisted plan unchanged.
#[test]
fn rejected_agent_patch_fails_the_run() {
    let graph = graph_with(vec![item("t")]);
    let (_temp, paths) = setup(&graph, &OrchestratorConfig::default());

    let bad_patch = AgentResponse {
        summary: Some("tried".to_string()),
        patch: Some(vec![foreman::core::patch::PatchOp::AddDep {
            id: "t".to_string(),
            dep_id: "ghost".to_string(),
            rationale: None,
        }]),
        ..AgentResponse::default()
    };
    let runtime = ScriptedRuntime::new(vec![bad_patch]);
    let orchestrator = Orchestrator::new(paths.clone(), OrchestratorConfig::default(), &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::Error);
    assert!(result.error.expect("error").contains("patch rejected"));
    assert_eq!(status_of(&paths.plan_path, "t"), Status::Failed);
    let after = load_plan(&paths.plan_path).expect("plan");
    assert!(after.get("t").expect("t").deps.is_empty());
}

/// Decision checkpoints: the run parks Pending, the item stays in_progress,
/// and resolution is addressed by the exact run id.
#[test]
fn decision_checkpoint_gates_terminal_status() {
    let graph = graph_with(vec![item("t")]);
    let config = OrchestratorConfig {
        require_decision: true,
        ..OrchestratorConfig::default()
    };
    let (_temp, paths) = setup(&graph, &config);

    let runtime = ScriptedRuntime::new(vec![completed_response("t done")]);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::DecisionRequired);
    let run = result.run.expect("run");
    assert_eq!(run.decision_state, Some(DecisionState::Pending));
    assert_eq!(status_of(&paths.plan_path, "t"), Status::InProgress);

    // Wrong run id: stale checkpoints cannot be resolved.
    let err = orchestrator
        .resolve_decision("t", "run-0999", Decision::ApprovedContinue, None)
        .unwrap_err();
    assert!(err.to_string().contains("run-0999"));

    // changes_requested demands feedback.
    let err = orchestrator
        .resolve_decision("t", &run.id, Decision::ChangesRequested, None)
        .unwrap_err();
    assert!(err.to_string().contains("requires nonempty feedback"));

    let outcome = orchestrator
        .resolve_decision("t", &run.id, Decision::ApprovedContinue, None)
        .expect("decide");
    assert!(outcome.continue_loop);
    assert_eq!(status_of(&paths.plan_path, "t"), Status::Done);

    // Resolving twice is rejected: the state is no longer Pending.
    let err = orchestrator
        .resolve_decision("t", &run.id, Decision::Rejected, None)
        .unwrap_err();
    assert!(err.to_string().contains("no pending decision"));
}

/// changes_requested keeps the task open and the next resume re-dispatches it
/// with the stored feedback injected.
#[test]
fn changes_requested_feedback_flows_into_resume() {
    let graph = graph_with(vec![item("t")]);
    let config = OrchestratorConfig {
        require_decision: true,
        ..OrchestratorConfig::default()
    };
    let (_temp, paths) = setup(&graph, &config);

    let runtime = ScriptedRuntime::new(vec![
        completed_response("first attempt"),
        completed_response("second attempt"),
    ]);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    let run = result.run.expect("run");

    orchestrator
        .resolve_decision(
            "t",
            &run.id,
            Decision::ChangesRequested,
            Some("split the module".to_string()),
        )
        .expect("decide");
    assert_eq!(status_of(&paths.plan_path, "t"), Status::InProgress);

    let result = orchestrator
        .resume(&CancelToken::new(), "t", Vec::new())
        .expect("resume");
    // The re-dispatch also runs under the decision policy.
    assert_eq!(result.reason, ExecuteReason::DecisionRequired);

    let requests = runtime.seen_requests();
    assert_eq!(requests[1].feedback.as_deref(), Some("split the module"));
    assert!(requests[1].prompt.contains("split the module"));
}

/// Rejected marks the task failed with no automatic retry.
#[test]
fn rejected_decision_fails_the_task() {
    let graph = graph_with(vec![item("t")]);
    let config = OrchestratorConfig {
        require_decision: true,
        ..OrchestratorConfig::default()
    };
    let (_temp, paths) = setup(&graph, &config);

    let runtime = ScriptedRuntime::new(vec![completed_response("t done")]);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);
    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    let run = result.run.expect("run");

    let outcome = orchestrator
        .resolve_decision("t", &run.id, Decision::Rejected, None)
        .expect("decide");
    assert!(!outcome.continue_loop);
    assert_eq!(status_of(&paths.plan_path, "t"), Status::Failed);
}

/// A failed parent review normalizes its targets, writes pending feedback,
/// and a batch resume consumes it exactly once.
#[test]
fn failed_parent_review_reopens_children_via_pending_feedback() {
    let graph = graph_with(linked("parent", &["child-a", "child-b"]));
    let config = OrchestratorConfig {
        parent_review: true,
        ..OrchestratorConfig::default()
    };
    let (_temp, paths) = setup(&graph, &config);

    let runtime = ScriptedRuntime::new(vec![
        completed_response("child-a done"),
        completed_response("child-b done"),
        // Duplicated and unsorted targets; normalization dedupes and sorts.
        review_response(
            false,
            &["child-b", "child-a", "child-b"],
            "criteria  unmet\n\n\nadd integration   tests",
        ),
        completed_response("child-a redone"),
        completed_response("child-b redone"),
        review_response(true, &[], ""),
    ]);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::ParentReviewRequired);
    assert_eq!(result.task_id.as_deref(), Some("parent"));
    let review = result.run.expect("review run");
    assert_eq!(review.parent_review_passed, Some(false));
    assert_eq!(review.resume_targets(), ["child-a", "child-b"]);
    assert_eq!(
        review.parent_review_feedback.as_deref(),
        Some("criteria unmet\n\nadd integration tests")
    );

    // Durable pending feedback exists for both children.
    assert_eq!(
        list_pending_feedback(&paths.feedback_dir).expect("list"),
        vec!["child-a", "child-b"]
    );
    let entry = load_pending_feedback(&paths.feedback_dir, "child-a")
        .expect("load")
        .expect("entry");
    assert_eq!(entry.parent_task_id, "parent");
    assert_eq!(entry.feedback, "criteria unmet\n\nadd integration tests");

    // Batch resume: each child re-dispatched once, feedback consumed.
    let outcomes = orchestrator
        .resume_pending(&CancelToken::new())
        .expect("resume pending");
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    assert!(
        list_pending_feedback(&paths.feedback_dir)
            .expect("list")
            .is_empty()
    );

    let requests = runtime.seen_requests();
    let child_a_redo = &requests[3];
    assert_eq!(child_a_redo.task_id, "child-a");
    assert_eq!(
        child_a_redo.feedback.as_deref(),
        Some("criteria unmet\n\nadd integration tests")
    );

    // The second batch entry completed the last child, which triggered the
    // follow-up (passing) review.
    let second_review = outcomes
        .iter()
        .flat_map(|o| o.result.as_ref().ok())
        .find(|r| r.reason == ExecuteReason::ParentReviewRequired)
        .expect("follow-up review");
    assert_eq!(
        second_review
            .run
            .as_ref()
            .expect("run")
            .parent_review_passed,
        Some(true)
    );
}

/// A passing review records no resume targets and leaves no pending feedback.
#[test]
fn passing_parent_review_produces_no_resume_targets() {
    let graph = graph_with(linked("parent", &["child"]));
    let config = OrchestratorConfig {
        parent_review: true,
        ..OrchestratorConfig::default()
    };
    let (_temp, paths) = setup(&graph, &config);

    let runtime = ScriptedRuntime::new(vec![
        completed_response("child done"),
        // Even a passing verdict with stray targets must not reopen anything.
        review_response(true, &["child"], "looks good"),
    ]);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::ParentReviewRequired);
    let review = result.run.expect("review run");
    assert_eq!(review.parent_review_passed, Some(true));
    assert!(review.resume_targets().is_empty());
    assert!(
        list_pending_feedback(&paths.feedback_dir)
            .expect("list")
            .is_empty()
    );
}

/// Parent review runs before the stop-after-each-task policy at a shared
/// boundary.
#[test]
fn parent_review_takes_precedence_over_stop_policy() {
    let graph = graph_with(linked("parent", &["child"]));
    let config = OrchestratorConfig {
        parent_review: true,
        stop_after_each_task: true,
        ..OrchestratorConfig::default()
    };
    let (_temp, paths) = setup(&graph, &config);

    let runtime = ScriptedRuntime::new(vec![
        completed_response("child done"),
        review_response(true, &[], ""),
    ]);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::ParentReviewRequired);
}

/// Answers and pending parent-review feedback cannot be combined; the request
/// errors and performs no mutation.
#[test]
fn resume_conflict_is_rejected_without_mutation() {
    let graph = graph_with(linked("parent", &["child"]));
    let config = OrchestratorConfig {
        parent_review: true,
        ..OrchestratorConfig::default()
    };
    let (_temp, paths) = setup(&graph, &config);

    let runtime = ScriptedRuntime::new(vec![
        completed_response("child done"),
        review_response(false, &["child"], "needs work"),
    ]);
    let orchestrator = Orchestrator::new(paths.clone(), config, &runtime);
    orchestrator.execute(&CancelToken::new()).expect("execute");
    assert!(
        load_pending_feedback(&paths.feedback_dir, "child")
            .expect("load")
            .is_some()
    );
    let plan_before = load_plan(&paths.plan_path).expect("plan");

    let err = orchestrator
        .resume(&CancelToken::new(), "child", vec!["an answer".to_string()])
        .unwrap_err();
    assert!(err.downcast_ref::<ResumeConflictError>().is_some());
    assert!(
        err.to_string()
            .contains("cannot be combined with pending parent-review feedback")
    );

    // No mutation: feedback still pending, plan untouched, no new dispatch.
    assert!(
        load_pending_feedback(&paths.feedback_dir, "child")
            .expect("load")
            .is_some()
    );
    assert_eq!(load_plan(&paths.plan_path).expect("plan"), plan_before);
    assert_eq!(runtime.seen_requests().len(), 2);
}

/// The plan file is the source of truth: a fresh orchestrator (fresh process)
/// picks up exactly where the file says, and external edits between tasks are
/// honored.
#[test]
fn restart_and_external_edit_are_picked_up_between_tasks() {
    let graph = graph_with(vec![item("a"), item("b")]);
    let config = OrchestratorConfig {
        stop_after_each_task: true,
        ..OrchestratorConfig::default()
    };
    let (_temp, paths) = setup(&graph, &config);

    let runtime = ScriptedRuntime::new(vec![completed_response("a done")]);
    let orchestrator = Orchestrator::new(paths.clone(), config.clone(), &runtime);
    orchestrator.execute(&CancelToken::new()).expect("execute");

    // External edit between tasks: mark b skipped by hand.
    let mut graph = load_plan(&paths.plan_path).expect("plan");
    graph.get_mut("b").expect("b").status = Status::Skipped;
    save_plan(&paths.plan_path, &graph).expect("save");

    // "Restart": a brand-new orchestrator over the same directory.
    let runtime2 = ScriptedRuntime::new(Vec::new());
    let orchestrator2 = Orchestrator::new(paths.clone(), config, &runtime2);
    let result = orchestrator2.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::Completed);
    assert!(runtime2.seen_requests().is_empty());
}

/// Stage and lifecycle events reach a listening channel; the loop does not
/// depend on anyone receiving them.
#[test]
fn events_stream_stage_transitions_and_outcomes() {
    use foreman::events::{EventSink, OrchestratorEvent, Stage};

    let graph = graph_with(linked("parent", &["child"]));
    let config = OrchestratorConfig {
        parent_review: true,
        ..OrchestratorConfig::default()
    };
    let (_temp, paths) = setup(&graph, &config);

    let runtime = ScriptedRuntime::new(vec![
        completed_response("child done"),
        review_response(true, &[], ""),
    ]);
    let (tx, rx) = std::sync::mpsc::channel();
    let orchestrator =
        Orchestrator::new(paths.clone(), config, &runtime).with_events(EventSink::new(tx));

    orchestrator.execute(&CancelToken::new()).expect("execute");

    let events: Vec<OrchestratorEvent> = rx.try_iter().collect();
    assert!(events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::StageChanged { task_id, stage: Stage::Executing } if task_id == "child"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::StageChanged { task_id, stage: Stage::Reviewing } if task_id == "parent"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::TaskFinished { task_id, status: Status::Done } if task_id == "child"
    )));
}

/// Items whose deps were skipped stay blocked: only done satisfies a dep.
#[test]
fn skipped_dependency_keeps_dependent_blocked() {
    let mut dependent = item("dependent");
    dependent.deps.insert("skipped-dep".to_string());
    let graph = graph_with(vec![
        dependent,
        item_with_status("skipped-dep", Status::Skipped),
    ]);
    let (_temp, paths) = setup(&graph, &OrchestratorConfig::default());

    let runtime = ScriptedRuntime::new(Vec::new());
    let orchestrator = Orchestrator::new(paths.clone(), OrchestratorConfig::default(), &runtime);

    let result = orchestrator.execute(&CancelToken::new()).expect("execute");
    assert_eq!(result.reason, ExecuteReason::Completed);
    assert!(runtime.seen_requests().is_empty());
    assert_eq!(status_of(&paths.plan_path, "dependent"), Status::Todo);
}
