//! Tracker de goals: registro top-level por unidad de trabajo iniciada por
//! el usuario (ingesta de archivo o consulta).
//!
//! Cada goal es dueño exclusivo de su Plan y de su log de razonamiento
//! (append-only, nunca editado): toda rama tomada por el orquestador y toda
//! aclaración humana es una entrada atada a un único goal, sin interleaving
//! entre goals. El log cita artifacts por hash en lugar de copiar payloads.
//! Sin estado global mutable: el ciclo de vida es crear-con-goal,
//! descartar-con-goal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::event::{EventBus, EventKind};
use crate::plan::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalType {
    IngestFile,
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
    Cancelled,
}

/// Entrada del log de razonamiento: tripla prompt/respuesta/acción.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub at: DateTime<Utc>,
    pub prompt_summary: String,
    pub response_summary: String,
    pub action_taken: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub goal_type: GoalType,
    pub status: GoalStatus,
    pub input: Value,
    /// Plan del goal (solo consultas); propiedad exclusiva del goal.
    pub plan: Option<Plan>,
    /// Superficie de explicabilidad, append-only.
    pub log: Vec<DecisionRecord>,
    /// Hash del artifact resumen (goals completos).
    pub summary: Option<String>,
    /// Error disparador (goals fallidos).
    pub error: Option<OrchestratorError>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Almacén in-memory de goals más sus canales de cancelación.
pub struct GoalTracker {
    goals: DashMap<Uuid, Goal>,
    cancels: DashMap<Uuid, watch::Sender<bool>>,
    bus: Arc<EventBus>,
}

impl GoalTracker {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { goals: DashMap::new(), cancels: DashMap::new(), bus }
    }

    pub fn create(&self, goal_type: GoalType, input: Value) -> Goal {
        let goal = Goal { id: Uuid::new_v4(),
                          goal_type,
                          status: GoalStatus::Pending,
                          input,
                          plan: None,
                          log: Vec::new(),
                          summary: None,
                          error: None,
                          created_at: Utc::now(),
                          completed_at: None };
        let (tx, _) = watch::channel(false);
        self.cancels.insert(goal.id, tx);
        self.goals.insert(goal.id, goal.clone());
        self.bus.publish(EventKind::GoalCreated { goal_id: goal.id, goal_type });
        goal
    }

    pub fn get(&self, id: Uuid) -> Result<Goal, OrchestratorError> {
        self.goals
            .get(&id)
            .map(|g| g.clone())
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    /// Receiver de cancelación del goal, consumido por el scheduler.
    pub fn cancel_receiver(&self, id: Uuid) -> Result<watch::Receiver<bool>, OrchestratorError> {
        self.cancels
            .get(&id)
            .map(|tx| tx.subscribe())
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    /// Solicita la cancelación: los steps en vuelo del goal serán abortados
    /// y los pendientes saltados por el scheduler.
    pub fn request_cancel(&self, id: Uuid) -> Result<(), OrchestratorError> {
        let tx = self.cancels
                     .get(&id)
                     .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;
        let _ = tx.send(true);
        tracing::info!(goal_id = %id, "goal cancellation requested");
        Ok(())
    }

    /// Agrega una entrada al log del goal. Append-only.
    pub fn record_decision(&self,
                           id: Uuid,
                           prompt_summary: impl Into<String>,
                           response_summary: impl Into<String>,
                           action_taken: impl Into<String>)
                           -> Result<(), OrchestratorError> {
        let mut goal = self.goals
                           .get_mut(&id)
                           .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;
        let action = action_taken.into();
        goal.log.push(DecisionRecord { at: Utc::now(),
                                       prompt_summary: prompt_summary.into(),
                                       response_summary: response_summary.into(),
                                       action_taken: action.clone() });
        self.bus.publish(EventKind::DecisionRecorded { goal_id: id, action });
        Ok(())
    }

    pub fn set_in_progress(&self, id: Uuid) -> Result<(), OrchestratorError> {
        self.update(id, |g| g.status = GoalStatus::InProgress)
    }

    /// Guarda el plan final (con estados terminales) dentro del goal.
    pub fn attach_plan(&self, id: Uuid, plan: Plan) -> Result<(), OrchestratorError> {
        self.update(id, |g| g.plan = Some(plan))
    }

    pub fn complete(&self, id: Uuid, summary: Option<String>) -> Result<Goal, OrchestratorError> {
        self.update(id, |g| {
                g.status = GoalStatus::Complete;
                g.summary = summary.clone();
                g.completed_at = Some(Utc::now());
            })?;
        self.bus.publish(EventKind::GoalCompleted { goal_id: id, summary });
        self.get(id)
    }

    pub fn fail(&self, id: Uuid, error: OrchestratorError) -> Result<Goal, OrchestratorError> {
        self.update(id, |g| {
                g.status = GoalStatus::Failed;
                g.error = Some(error.clone());
                g.completed_at = Some(Utc::now());
            })?;
        self.bus.publish(EventKind::GoalFailed { goal_id: id, error });
        self.get(id)
    }

    pub fn mark_cancelled(&self, id: Uuid) -> Result<Goal, OrchestratorError> {
        self.update(id, |g| {
                g.status = GoalStatus::Cancelled;
                g.completed_at = Some(Utc::now());
            })?;
        self.bus.publish(EventKind::GoalCancelled { goal_id: id });
        self.get(id)
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut Goal)) -> Result<(), OrchestratorError> {
        let mut goal = self.goals
                           .get_mut(&id)
                           .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;
        f(&mut goal);
        Ok(())
    }
}
