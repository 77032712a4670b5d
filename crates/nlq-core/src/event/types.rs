//! Tipos de evento del orquestador y estructura `OrchestratorEvent`.
//!
//! Rol en el flujo:
//! - Cada decisión observable (transición de workflow, dispatch de step,
//!   cierre de goal) publica exactamente un evento en el `EventBus`.
//! - El enum `EventKind` define el contrato observable y estable del motor:
//!   es el único mecanismo por el que observadores externos (UI, logs)
//!   conocen el progreso; ningún componente escribe a un display.
//! - Para un step dado, los eventos respetan el orden
//!   Started → (RetryScheduled)* → Finished|Failed. Entre steps o goals
//!   distintos no hay garantía de orden.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::goal::GoalType;
use crate::plan::StepKind;
use crate::workflow::IngestState;

/// Tipos de eventos soportados.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
    /// Una instancia de workflow avanzó un estado (transición legal).
    WorkflowAdvanced {
        instance_id: Uuid,
        from: IngestState,
        to: IngestState,
        reason: String,
    },
    /// Una instancia de workflow pasó a `Failed` desde un estado no terminal.
    WorkflowFailed {
        instance_id: Uuid,
        from: IngestState,
        reason: String,
    },
    /// Se creó un goal de usuario.
    GoalCreated { goal_id: Uuid, goal_type: GoalType },
    /// El orquestador validó y aceptó el plan del Planner.
    PlanAccepted {
        goal_id: Uuid,
        step_count: usize,
        plan_hash: String,
    },
    /// El plan fue rechazado (ciclo, referencia inválida) sin ejecutar steps.
    PlanRejected { goal_id: Uuid, error: OrchestratorError },
    /// Un step fue despachado al pool de workers. No implica éxito.
    StepStarted {
        goal_id: Uuid,
        step_id: String,
        kind: StepKind,
    },
    /// Un step terminó correctamente; `artifact` referencia su resultado.
    StepFinished {
        goal_id: Uuid,
        step_id: String,
        kind: StepKind,
        artifact: Option<String>,
    },
    /// Un step terminó con error terminal (reintentos ya agotados).
    StepFailed {
        goal_id: Uuid,
        step_id: String,
        kind: StepKind,
        error: OrchestratorError,
    },
    /// Un step fue saltado: dependencia fallida (propagación) o cancelación.
    StepSkipped { goal_id: Uuid, step_id: String, tolerant: bool },
    /// Un intento falló con error retryable; el scheduler reintentará.
    StepRetryScheduled {
        goal_id: Uuid,
        step_id: String,
        attempt: u32,
        delay_ms: u64,
    },
    /// Un step `HumanGate` espera decisión externa.
    HumanInputRequested {
        goal_id: Uuid,
        step_id: String,
        hint: Option<String>,
    },
    /// Entrada al log de razonamiento de un goal.
    DecisionRecorded { goal_id: Uuid, action: String },
    /// Cierre exitoso de un goal; `summary` referencia el artifact resumen.
    GoalCompleted { goal_id: Uuid, summary: Option<String> },
    /// Cierre fallido de un goal con el error disparador adjunto.
    GoalFailed { goal_id: Uuid, error: OrchestratorError },
    /// El goal fue cancelado por el caller; sus steps en vuelo también.
    GoalCancelled { goal_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorEvent {
    pub seq: u64, // asignado por el EventBus (orden de publicación global)
    pub kind: EventKind,
    pub ts: DateTime<Utc>, // metadato (no entra en hashes)
}
