//! Especificación y estado runtime de un Step.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::OrchestratorError;

/// Clase de ejecución de un step; determina el colaborador invocado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Consulta SQL contra el ejecutor externo.
    Sql,
    /// Código en sandbox externo; stdout y outputs se capturan como artifacts.
    Code,
    /// Invocación de un agente externo nombrado.
    Subagent,
    /// Pausa human-in-the-loop: el dispatch bloquea hasta recibir una
    /// decisión externa. Timeout y cancelación aplican igual que al resto.
    HumanGate,
}

impl StepKind {
    /// Error terminal correspondiente al agotar reintentos de un
    /// `Transient` en este kind de step.
    pub fn terminal_error(self, reason: String) -> OrchestratorError {
        match self {
            StepKind::Sql => OrchestratorError::Query(reason),
            _ => OrchestratorError::Execution(reason),
        }
    }
}

/// Estado runtime de un step.
///
/// Transiciones válidas:
/// - `Pending` -> `Running` -> `Succeeded` | `Failed`
/// - `Pending` -> `Skipped` (dependencia fallida con propagación, o
///   cancelación del goal)
/// - `Running` -> `Skipped` (solo cancelación: el worker se aborta antes de
///   registrar resultado, así que el step no terminó ni falló por sí mismo)
///
/// No se permiten reversiones ni saltos arbitrarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Failed | StepStatus::Skipped)
    }
}

/// Especificación declarativa de un step dentro de un Plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Identificador estable y único dentro del Plan.
    pub id: String,
    pub kind: StepKind,
    /// Ids de steps que deben alcanzar estado terminal antes del dispatch.
    pub depends_on: Vec<String>,
    /// Parámetros literales y referencias a artifacts (por hash).
    pub input: Value,
    /// Un step tolerante entra al frontier aunque una dependencia haya
    /// fallado (recibe resultado nulo del predecesor) y su skip no hace
    /// fallar el plan.
    pub tolerant: bool,
    /// Override del límite de reintentos del scheduler.
    pub max_retries: Option<u32>,
    /// Override del timeout por intento (ms).
    pub timeout_ms: Option<u64>,
}

impl StepSpec {
    pub fn new(id: impl Into<String>, kind: StepKind, input: Value) -> Self {
        Self { id: id.into(),
               kind,
               depends_on: Vec::new(),
               input,
               tolerant: false,
               max_retries: None,
               timeout_ms: None }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn tolerant(mut self) -> Self {
        self.tolerant = true;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }
}
