use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use nlq_core::{Collaborators, EventKind, GoalStatus, GoalType, Orchestrator, OrchestratorConfig,
               OrchestratorError, StepKind, StepSpec, StepStatus};
use nlq_adapters::{default_pipeline, CannedSqlExecutor, ChannelGate, EchoCodeExecutor,
                   ScriptedPlanner, StaticSubagents};
use uuid::Uuid;

/// Orchestrator whose gate step blocks forever (sender kept alive, never
/// used), so the plan stays in flight until cancelled.
fn blocking_orchestrator() -> (Arc<Orchestrator>, tokio::sync::mpsc::Sender<serde_json::Value>) {
    let planner = ScriptedPlanner::new(vec![
        StepSpec::new("gate", StepKind::HumanGate, json!({ "hint": "waiting" })),
        StepSpec::new("after", StepKind::Sql, json!({ "query": "select 1" })).depends_on(&["gate"]),
    ]);
    let (tx, gate) = ChannelGate::pair(1);
    let collab = Collaborators { planner: Arc::new(planner),
                                 sql: Arc::new(CannedSqlExecutor::new()),
                                 code: Arc::new(EchoCodeExecutor::default()),
                                 subagent: Arc::new(StaticSubagents::default()),
                                 human: Arc::new(gate),
                                 stages: default_pipeline("dataset") };
    (Arc::new(Orchestrator::new(collab, OrchestratorConfig::default())), tx)
}

async fn wait_for_gate(rx: &mut tokio::sync::broadcast::Receiver<nlq_core::OrchestratorEvent>) -> Uuid {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let ev = rx.recv().await.expect("bus closed");
            if let EventKind::HumanInputRequested { goal_id, .. } = ev.kind {
                return goal_id;
            }
        }
    }).await
      .expect("gate never reached")
}

#[tokio::test]
async fn cancelling_a_goal_aborts_running_and_skips_pending_steps() {
    let (orch, _tx) = blocking_orchestrator();
    let mut rx = orch.subscribe_events();

    let runner = orch.clone();
    let handle = tokio::spawn(async move {
        runner.submit_goal(GoalType::Query, json!({})).await
    });

    let goal_id = wait_for_gate(&mut rx).await;
    orch.cancel_goal(goal_id).unwrap();

    let goal = handle.await.unwrap().unwrap();
    assert_eq!(goal.status, GoalStatus::Cancelled);

    let plan = goal.plan.expect("plan attached");
    assert_eq!(plan.step("gate").unwrap().status, StepStatus::Skipped);
    assert_eq!(plan.step("after").unwrap().status, StepStatus::Skipped);

    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(ev.kind);
    }
    assert!(kinds.iter().any(|k| matches!(k, EventKind::GoalCancelled { .. })));
    assert!(kinds.iter().any(|k| matches!(k, EventKind::StepSkipped { step_id, .. } if step_id == "after")));
    assert!(!kinds.iter().any(|k| matches!(k, EventKind::StepFinished { .. })),
            "no step may finish after cancellation");
    assert!(!kinds.iter().any(|k| matches!(k, EventKind::StepStarted { step_id, .. } if step_id == "after")),
            "pending steps must not be dispatched after cancellation");
}

#[tokio::test]
async fn cancelled_goal_log_records_the_outcome() {
    let (orch, _tx) = blocking_orchestrator();
    let mut rx = orch.subscribe_events();

    let runner = orch.clone();
    let handle = tokio::spawn(async move {
        runner.submit_goal(GoalType::Query, json!({})).await
    });

    let goal_id = wait_for_gate(&mut rx).await;
    orch.cancel_goal(goal_id).unwrap();

    let goal = handle.await.unwrap().unwrap();
    assert!(goal.log.iter().any(|d| d.action_taken.contains("cancelled")));
    assert!(goal.completed_at.is_some());
}

#[tokio::test]
async fn cancelling_an_unknown_goal_is_not_found() {
    let (orch, _tx) = blocking_orchestrator();
    assert!(matches!(orch.cancel_goal(Uuid::new_v4()), Err(OrchestratorError::NotFound(_))));
}
