use std::sync::Arc;

use serde_json::json;

use nlq_core::{Collaborators, EventKind, GoalStatus, GoalType, Orchestrator, OrchestratorConfig,
               OrchestratorError, SchedulerConfig, SqlExecutor, StepKind, StepSpec, StepStatus};
use nlq_adapters::{default_pipeline, sql::FAIL_MARKER, sql::TRANSIENT_MARKER, AutoApproveGate,
                   CannedSqlExecutor, ChannelGate, EchoCodeExecutor, FlakySqlExecutor,
                   ScriptedPlanner, StaticSubagents};

fn collab(planner: ScriptedPlanner, sql: Arc<dyn SqlExecutor>) -> Collaborators {
    Collaborators { planner: Arc::new(planner),
                    sql,
                    code: Arc::new(EchoCodeExecutor::default()),
                    subagent: Arc::new(StaticSubagents::default()),
                    human: Arc::new(AutoApproveGate::default()),
                    stages: default_pipeline("dataset") }
}

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig { scheduler: SchedulerConfig { retry_backoff_ms: 1, ..SchedulerConfig::default() },
                         ..OrchestratorConfig::default() }
}

fn sql_step(id: &str, query: &str) -> StepSpec {
    StepSpec::new(id, StepKind::Sql, json!({ "query": query }))
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<nlq_core::OrchestratorEvent>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(ev.kind);
    }
    kinds
}

#[tokio::test]
async fn failed_dependency_skips_downstream_steps() {
    let planner = ScriptedPlanner::new(vec![
        sql_step("a", &format!("select {FAIL_MARKER}")),
        sql_step("b", "select 2"),
        sql_step("c", "select 3").depends_on(&["a", "b"]),
    ]);
    let orch = Orchestrator::new(collab(planner, Arc::new(CannedSqlExecutor::new())), fast_config());
    let mut rx = orch.subscribe_events();

    let goal = orch.submit_goal(GoalType::Query, json!({})).await.unwrap();
    assert_eq!(goal.status, GoalStatus::Failed);
    assert!(matches!(goal.error, Some(OrchestratorError::Query(_))));

    let plan = goal.plan.expect("plan attached");
    assert_eq!(plan.step("a").unwrap().status, StepStatus::Failed);
    assert_eq!(plan.step("b").unwrap().status, StepStatus::Succeeded);
    assert_eq!(plan.step("c").unwrap().status, StepStatus::Skipped);

    let kinds = drain(&mut rx);
    assert!(kinds.iter().any(|k| matches!(k, EventKind::StepSkipped { step_id, .. } if step_id == "c")));
    assert!(!kinds.iter().any(|k| matches!(k, EventKind::StepStarted { step_id, .. } if step_id == "c")),
            "skipped step must never be dispatched");
}

#[tokio::test]
async fn tolerant_step_runs_despite_failed_dependency() {
    let planner = ScriptedPlanner::new(vec![
        sql_step("a", &format!("select {FAIL_MARKER}")),
        sql_step("b", "select 2").depends_on(&["a"]).tolerant(),
    ]);
    let orch = Orchestrator::new(collab(planner, Arc::new(CannedSqlExecutor::new())), fast_config());

    let goal = orch.submit_goal(GoalType::Query, json!({})).await.unwrap();
    // the plan still fails because of "a", but "b" did run with a null
    // predecessor result
    assert_eq!(goal.status, GoalStatus::Failed);
    let plan = goal.plan.expect("plan attached");
    assert_eq!(plan.step("b").unwrap().status, StepStatus::Succeeded);
    assert!(plan.step("b").unwrap().artifact.is_some());
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let planner = ScriptedPlanner::new(vec![sql_step("q", "select 1")]);
    let flaky = Arc::new(FlakySqlExecutor::new(json!({ "columns": ["n"], "rows": [[1]] }), 2));
    let orch = Orchestrator::new(collab(planner, flaky), fast_config());
    let mut rx = orch.subscribe_events();

    let goal = orch.submit_goal(GoalType::Query, json!({})).await.unwrap();
    assert_eq!(goal.status, GoalStatus::Complete);

    let kinds = drain(&mut rx);
    let retries = kinds.iter()
                       .filter(|k| matches!(k, EventKind::StepRetryScheduled { step_id, .. } if step_id == "q"))
                       .count();
    assert_eq!(retries, 2);
    assert!(kinds.iter().any(|k| matches!(k, EventKind::StepFinished { step_id, .. } if step_id == "q")));
}

#[tokio::test]
async fn exhausted_retries_become_the_step_kind_terminal_error() {
    let planner = ScriptedPlanner::new(vec![
        sql_step("q", &format!("select {TRANSIENT_MARKER}")).with_max_retries(1),
    ]);
    let orch = Orchestrator::new(collab(planner, Arc::new(CannedSqlExecutor::new())), fast_config());

    let goal = orch.submit_goal(GoalType::Query, json!({})).await.unwrap();
    assert_eq!(goal.status, GoalStatus::Failed);
    match goal.error {
        Some(OrchestratorError::Query(reason)) => assert!(reason.contains("retries exhausted")),
        other => panic!("expected Query error, got {other:?}"),
    }
}

#[tokio::test]
async fn serial_scheduling_follows_plan_insertion_order() {
    let planner = ScriptedPlanner::new(vec![
        sql_step("b", "select 1"),
        sql_step("a", "select 2"),
        sql_step("c", "select 3"),
    ]);
    let config = OrchestratorConfig { scheduler: SchedulerConfig { max_concurrency: 1,
                                                                   ..SchedulerConfig::default() },
                                      ..OrchestratorConfig::default() };
    let orch = Orchestrator::new(collab(planner, Arc::new(CannedSqlExecutor::new())), config);
    let mut rx = orch.subscribe_events();

    let goal = orch.submit_goal(GoalType::Query, json!({})).await.unwrap();
    assert_eq!(goal.status, GoalStatus::Complete);

    let started: Vec<String> = drain(&mut rx).into_iter()
                                             .filter_map(|k| match k {
                                                 EventKind::StepStarted { step_id, .. } => Some(step_id),
                                                 _ => None,
                                             })
                                             .collect();
    assert_eq!(started, vec!["b", "a", "c"]);
}

#[tokio::test]
async fn every_step_starts_before_it_finishes() {
    let planner = ScriptedPlanner::new(vec![
        sql_step("x", "select 1"),
        sql_step("y", "select 2"),
        sql_step("z", "select 3"),
    ]);
    let orch = Orchestrator::new(collab(planner, Arc::new(CannedSqlExecutor::new())), fast_config());
    let mut rx = orch.subscribe_events();

    let goal = orch.submit_goal(GoalType::Query, json!({})).await.unwrap();
    assert_eq!(goal.status, GoalStatus::Complete);

    let kinds = drain(&mut rx);
    for id in ["x", "y", "z"] {
        let started = kinds.iter()
                           .position(|k| matches!(k, EventKind::StepStarted { step_id, .. } if step_id == id))
                           .expect("started");
        let finished = kinds.iter()
                            .position(|k| matches!(k, EventKind::StepFinished { step_id, .. } if step_id == id))
                            .expect("finished");
        assert!(started < finished, "step '{id}' finished before starting");
    }
}

#[tokio::test]
async fn attempt_timeout_counts_as_retryable_failure() {
    let planner = ScriptedPlanner::new(vec![
        StepSpec::new("gate", StepKind::HumanGate, json!({ "hint": "approve?" }))
            .with_timeout_ms(10)
            .with_max_retries(0),
    ]);
    // keep the sender alive so the gate blocks instead of erroring
    let (_tx, gate) = ChannelGate::pair(1);
    let collab = Collaborators { planner: Arc::new(planner),
                                 sql: Arc::new(CannedSqlExecutor::new()),
                                 code: Arc::new(EchoCodeExecutor::default()),
                                 subagent: Arc::new(StaticSubagents::default()),
                                 human: Arc::new(gate),
                                 stages: default_pipeline("dataset") };
    let orch = Orchestrator::new(collab, fast_config());

    let goal = orch.submit_goal(GoalType::Query, json!({})).await.unwrap();
    assert_eq!(goal.status, GoalStatus::Failed);
    match goal.error {
        Some(OrchestratorError::Execution(reason)) => assert!(reason.contains("timed out")),
        other => panic!("expected Execution error, got {other:?}"),
    }
}
