//! Fachada del orquestador: la interfaz que el core expone a su host.
//!
//! - `upload_dataset` crea una instancia de workflow en `FileDropped`.
//! - `run_ingestion` conduce la instancia por el pipeline de etapas
//!   preguntando a los colaboradores y validando cada estado propuesto vía
//!   `advance` (ninguna etapa puede afirmar un estado no alcanzado).
//! - `submit_goal` crea un goal; para consultas pide el plan al Planner,
//!   lo valida estructuralmente, lo registra como artifact y lo entrega al
//!   scheduler.
//! - `subscribe_events` es la única superficie de observación.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::collab::Collaborators;
use crate::constants::DEFAULT_EVENT_CAPACITY;
use crate::errors::OrchestratorError;
use crate::event::{EventBus, EventKind, OrchestratorEvent};
use crate::executor::StepDispatcher;
use crate::goal::{Goal, GoalTracker, GoalType};
use crate::model::ArtifactKind;
use crate::plan::PlanStatus;
use crate::registry::ArtifactRegistry;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::workflow::{Evidence, IngestState, WorkflowInstance, WorkflowStore};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub scheduler: SchedulerConfig,
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { scheduler: SchedulerConfig::default(),
               event_capacity: DEFAULT_EVENT_CAPACITY }
    }
}

pub struct Orchestrator {
    registry: Arc<ArtifactRegistry>,
    bus: Arc<EventBus>,
    workflows: WorkflowStore,
    goals: GoalTracker,
    collab: Collaborators,
    scheduler: Scheduler,
    dispatcher: Arc<StepDispatcher>,
}

impl Orchestrator {
    pub fn new(collab: Collaborators, config: OrchestratorConfig) -> Self {
        let bus = Arc::new(EventBus::new(config.event_capacity));
        let registry = Arc::new(ArtifactRegistry::new());
        let dispatcher = Arc::new(StepDispatcher::new(collab.clone(), registry.clone(), bus.clone()));
        Self { workflows: WorkflowStore::new(bus.clone()),
               goals: GoalTracker::new(bus.clone()),
               scheduler: Scheduler::new(config.scheduler, bus.clone()),
               dispatcher,
               collab,
               registry,
               bus }
    }

    /// Suscripción best-effort al flujo de eventos; reiniciable por
    /// suscriptor, pierde lo publicado durante desconexiones.
    pub fn subscribe_events(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.bus.subscribe()
    }

    pub fn registry(&self) -> &Arc<ArtifactRegistry> {
        &self.registry
    }

    pub fn goal(&self, id: Uuid) -> Result<Goal, OrchestratorError> {
        self.goals.get(id)
    }

    pub fn workflow(&self, id: Uuid) -> Result<WorkflowInstance, OrchestratorError> {
        self.workflows.get(id)
    }

    /// Crea una instancia de workflow para un dataset subido; los bytes
    /// crudos quedan registrados como artifact de la etapa inicial.
    pub fn upload_dataset(&self, bytes: &[u8]) -> WorkflowInstance {
        let content = String::from_utf8_lossy(bytes).to_string();
        let hash = self.registry.put_with_metadata(ArtifactKind::RawFile,
                                                   json!({ "content": content }),
                                                   Some(json!({ "size_bytes": bytes.len() })),
                                                   "upload");
        self.workflows.create(hash)
    }

    /// Avance manual de un workflow; el host provee la evidencia.
    pub fn advance_workflow(&self,
                            id: Uuid,
                            target: IngestState,
                            evidence: Evidence)
                            -> Result<WorkflowInstance, OrchestratorError> {
        self.workflows.advance(id, target, evidence)
    }

    /// Destruye una instancia (cache-clear explícito).
    pub fn clear_instance(&self, id: Uuid) -> Result<WorkflowInstance, OrchestratorError> {
        self.workflows.remove(id)
    }

    /// Conduce la ingesta etapa por etapa hasta `Done`, hasta que no haya
    /// colaborador para el estado actual, o hasta el primer error (que
    /// mueve la instancia a `Failed` y se devuelve al caller).
    pub async fn run_ingestion(&self, id: Uuid) -> Result<WorkflowInstance, OrchestratorError> {
        loop {
            let instance = self.workflows.get(id)?;
            if instance.state.is_terminal() {
                return Ok(instance);
            }
            let Some(stage) = self.collab.stage_for(instance.state) else {
                return Ok(instance);
            };
            // Una referencia colgante en la evidencia es un fallo de la
            // ingesta, no del caller: misma salida que un error de etapa.
            let latest = match instance.latest_artifact() {
                Some(hash) => match self.registry.get(hash) {
                    Ok(artifact) => Some(artifact),
                    Err(e) => {
                        let _ = self.workflows.advance(id,
                                                       IngestState::Failed,
                                                       Evidence::new(e.to_string(), None));
                        return Err(e);
                    }
                },
                None => None,
            };
            match stage.execute(&instance, latest.as_ref()).await {
                Ok(outcome) => {
                    let hash = self.registry.put(outcome.kind, outcome.payload, stage.name());
                    self.workflows.advance(id,
                                           outcome.target,
                                           Evidence::new(format!("stage '{}' completed", stage.name()),
                                                         Some(hash)))?;
                }
                Err(e) => {
                    let _ = self.workflows.advance(id,
                                                   IngestState::Failed,
                                                   Evidence::new(e.to_string(), None));
                    return Err(e);
                }
            }
        }
    }

    /// Crea y ejecuta un goal. Devuelve el goal en su estado final.
    pub async fn submit_goal(&self, goal_type: GoalType, input: Value) -> Result<Goal, OrchestratorError> {
        let goal = self.goals.create(goal_type, input.clone());
        tracing::info!(goal_id = %goal.id, ?goal_type, "goal submitted");
        match goal_type {
            GoalType::Query => self.run_query_goal(goal.id, input).await,
            GoalType::IngestFile => self.run_ingest_goal(goal.id, input).await,
        }
    }

    /// Solicita la cancelación de un goal en ejecución.
    pub fn cancel_goal(&self, id: Uuid) -> Result<(), OrchestratorError> {
        self.goals.request_cancel(id)
    }

    async fn run_query_goal(&self, goal_id: Uuid, input: Value) -> Result<Goal, OrchestratorError> {
        self.goals.set_in_progress(goal_id)?;

        let plan = match self.collab.planner.plan_steps(&input, &self.registry).await {
            Ok(plan) => plan,
            Err(e) => {
                self.goals.record_decision(goal_id,
                                           "request plan from planner",
                                           e.to_string(),
                                           "goal failed: planning error")?;
                return self.goals.fail(goal_id, e);
            }
        };

        if let Err(e) = plan.validate() {
            self.bus.publish(EventKind::PlanRejected { goal_id, error: e.clone() });
            self.goals.record_decision(goal_id,
                                       "validate plan graph",
                                       e.to_string(),
                                       "plan rejected: no steps run")?;
            return self.goals.fail(goal_id, e);
        }

        let plan_hash = self.registry.put(ArtifactKind::PlanSpec, plan.to_value(), "planner");
        self.bus.publish(EventKind::PlanAccepted { goal_id,
                                                   step_count: plan.len(),
                                                   plan_hash: plan_hash.clone() });
        self.goals.record_decision(goal_id,
                                   "request plan from planner",
                                   format!("{} steps, plan artifact {plan_hash}", plan.len()),
                                   "plan accepted")?;

        let cancel = self.goals.cancel_receiver(goal_id)?;
        let mut plan = plan;
        let status = self.scheduler.run(goal_id, &mut plan, self.dispatcher.clone(), cancel).await;

        let results: Vec<Value> = plan.iter()
                                      .map(|(id, s)| {
                                          json!({ "step": id, "status": s.status, "artifact": s.artifact })
                                      })
                                      .collect();
        let first_error = plan.first_error();
        self.goals.attach_plan(goal_id, plan)?;

        match status {
            PlanStatus::Succeeded => {
                let summary = self.registry.put(ArtifactKind::GenericJson,
                                                json!({ "goal_id": goal_id.to_string(), "steps": results }),
                                                "orchestrator");
                self.goals.record_decision(goal_id,
                                           "finalize plan",
                                           format!("summary artifact {summary}"),
                                           "goal complete")?;
                self.goals.complete(goal_id, Some(summary))
            }
            PlanStatus::Cancelled => {
                self.goals.record_decision(goal_id,
                                           "finalize plan",
                                           "cancelled by caller",
                                           "goal cancelled")?;
                self.goals.mark_cancelled(goal_id)
            }
            _ => {
                let error = first_error.unwrap_or_else(|| {
                                           OrchestratorError::Internal("plan failed without step error".into())
                                       });
                self.goals.record_decision(goal_id,
                                           "finalize plan",
                                           error.to_string(),
                                           "goal failed")?;
                self.goals.fail(goal_id, error)
            }
        }
    }

    async fn run_ingest_goal(&self, goal_id: Uuid, input: Value) -> Result<Goal, OrchestratorError> {
        self.goals.set_in_progress(goal_id)?;
        let instance_id = input.get("instance_id")
                               .and_then(Value::as_str)
                               .and_then(|s| Uuid::parse_str(s).ok());
        let Some(instance_id) = instance_id else {
            let e = OrchestratorError::Internal("ingest goal requires 'instance_id' input".into());
            self.goals.record_decision(goal_id, "resolve workflow instance", e.to_string(), "goal failed")?;
            return self.goals.fail(goal_id, e);
        };
        match self.run_ingestion(instance_id).await {
            Ok(instance) => {
                let summary = instance.latest_artifact().cloned();
                self.goals.record_decision(goal_id,
                                           "run ingestion pipeline",
                                           format!("reached state '{}'", instance.state),
                                           "goal complete")?;
                self.goals.complete(goal_id, summary)
            }
            Err(e) => {
                self.goals.record_decision(goal_id,
                                           "run ingestion pipeline",
                                           e.to_string(),
                                           "goal failed")?;
                self.goals.fail(goal_id, e)
            }
        }
    }
}
