//! Taxonomía de errores del core.
//!
//! Los errores viajan dentro de eventos (`StepFailed`, `GoalFailed`), por lo
//! que son `Serialize`/`Deserialize` además de `thiserror::Error`. La
//! distinción clave es retryable (`Transient`) vs terminal: el scheduler
//! reintenta los primeros con backoff y convierte al tipo terminal del step
//! al agotar los reintentos.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestratorError {
    /// Transición de workflow no adyacente o desde estado terminal. Fatal
    /// para la acción solicitada, nunca para el proceso.
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    /// Grafo malformado devuelto por el Planner: ciclo, id duplicado o
    /// referencia a step inexistente. El goal falla sin ejecutar steps.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    /// El colaborador Planner falló al producir un plan.
    #[error("planning failed: {0}")]
    Planning(String),
    /// Fallo SQL no retryable (sintaxis inválida, schema mismatch).
    #[error("query error: {0}")]
    Query(String),
    /// Fallo de ejecución de código/subagente no retryable.
    #[error("execution error: {0}")]
    Execution(String),
    /// Fallo retryable (timeout, colaborador momentáneamente caído).
    #[error("transient error: {0}")]
    Transient(String),
    /// Referencia a un artifact o registro inexistente. Fatal para el step
    /// que lo solicita.
    #[error("not found: {0}")]
    NotFound(String),
    /// El goal fue cancelado por el caller.
    #[error("goal cancelled")]
    Cancelled,
    #[error("internal: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Un error retryable será reintentado por el scheduler hasta agotar
    /// la política de reintentos del step.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
