//! Binario demo: ingesta un CSV embebido y resuelve una consulta de usuario
//! contra colaboradores in-memory, observando todo por el bus de eventos.

mod config;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use nlq_core::{GoalType, Orchestrator, StepKind, StepSpec};
use nlq_adapters::{default_collaborators, CannedSqlExecutor, ScriptedPlanner};

const DEMO_CSV: &[u8] = b"id,name,score\n1,ana,3.5\n2,luis,4.0\n3,sofia,4.8\n";
const DEMO_QUERY: &str = "select avg(score) from dataset";

#[tokio::main]
async fn main() {
    // Cargar variables de entorno desde .env si existe
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let planner = ScriptedPlanner::new(vec![
        StepSpec::new("q_avg", StepKind::Sql, json!({ "query": DEMO_QUERY })),
        StepSpec::new("chart", StepKind::Code, json!({ "code": "plot(rows)" })).depends_on(&["q_avg"]),
        StepSpec::new("approve", StepKind::HumanGate, json!({ "hint": "publish the chart?" }))
            .depends_on(&["chart"]),
    ]);
    let sql = CannedSqlExecutor::new().with_response(DEMO_QUERY,
                                                     json!({ "columns": ["avg_score"], "rows": [[4.1]] }));
    let orch = Orchestrator::new(default_collaborators(planner, sql), config::orchestrator_config());

    // Observador: el bus es la única superficie de progreso
    let mut events = orch.subscribe_events();
    let observer = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            tracing::info!(seq = ev.seq, kind = ?ev.kind, "event");
        }
    });

    // 1) Ingesta: subir el CSV y conducirlo hasta Done
    let instance = orch.upload_dataset(DEMO_CSV);
    match orch.run_ingestion(instance.id).await {
        Ok(done) => tracing::info!(instance_id = %done.id, state = %done.state, "ingestion finished"),
        Err(e) => {
            tracing::error!(error = %e, "ingestion failed");
            return;
        }
    }

    // 2) Consulta: goal de usuario resuelto por el plan del planner
    match orch.submit_goal(GoalType::Query, json!({ "question": "average score?" })).await {
        Ok(goal) => {
            tracing::info!(goal_id = %goal.id, status = ?goal.status, summary = ?goal.summary,
                           "query goal settled");
            for record in &goal.log {
                tracing::info!(at = %record.at, action = %record.action_taken, "goal log");
            }
            if let Some(summary) = &goal.summary {
                if let Ok(artifact) = orch.registry().get(summary) {
                    println!("summary: {}", serde_json::to_string_pretty(&artifact.payload)
                                                .unwrap_or_default());
                }
            }
        }
        Err(e) => tracing::error!(error = %e, "query goal failed to run"),
    }

    drop(orch);
    let _ = observer.await;
}
